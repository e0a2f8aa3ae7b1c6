use serde_json::Value;

use super::{base_summary, finalize, Normalized};
use crate::domain::error::Result;
use crate::domain::file_entry::{FileFormat, RawFileEntry};
use crate::domain::item::NormalizedItem;
use crate::domain::summary::{EncodingDiagnosis, IssueSeverity};
use crate::infrastructure::config::PipelineConfig;
use crate::infrastructure::tabular::{parse_table, sniff_dialect};
use crate::shared::log::PipelineLog;

/// Normalize delimiter-separated text into items keyed by header names.
pub fn normalize_tabular(
    entry: &RawFileEntry,
    text: &str,
    diagnosis: EncodingDiagnosis,
    mime: Option<String>,
    config: &PipelineConfig,
    log: &PipelineLog,
) -> Result<Normalized> {
    let mut summary = base_summary(entry, FileFormat::TabularText, mime);
    summary.encoding = Some(diagnosis);

    let dialect = sniff_dialect(text, config.sniff_preview_lines);
    summary.delimiter = Some(dialect.delimiter as char);
    summary.quote_char = Some(dialect.quote as char);
    summary.log(format!(
        "Delimitador detectado: {:?} (aspas {:?})",
        dialect.delimiter as char, dialect.quote as char
    ));

    let table = parse_table(text, dialect)?;
    summary.headers_present = Some(!table.headers.is_empty());

    if table.parse_errors > 0 {
        log.add(
            "WARN",
            "tabular",
            &format!("{}: {} linhas ilegíveis", entry.name, table.parse_errors),
        );
        summary.push_issue(
            "TABULAR_PARSE_ERRORS",
            IssueSeverity::Warn,
            format!("{} linha(s) não puderam ser interpretadas.", table.parse_errors),
        );
    }
    if table.headers.is_empty() {
        summary.push_issue(
            "TABULAR_NO_COLUMNS",
            IssueSeverity::Error,
            "Nenhuma coluna detectada no arquivo tabular.",
        );
    }

    let mut items: Vec<NormalizedItem> = table
        .rows
        .iter()
        .map(|row| {
            let mut item = NormalizedItem::new();
            for (index, header) in table.headers.iter().enumerate() {
                let cell = row.get(index).map(|c| c.trim()).unwrap_or("");
                if !cell.is_empty() {
                    item.set(header.clone(), Value::String(cell.to_string()));
                }
            }
            item
        })
        .collect();

    summary.log(format!(
        "{} linha(s) de dados, {} coluna(s)",
        items.len(),
        table.headers.len()
    ));

    finalize(&mut summary, &mut items, table.headers, config);
    Ok(Normalized {
        summary,
        items,
        text: Some(text.to_string()),
    })
}
