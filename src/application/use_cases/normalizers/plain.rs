use serde_json::Value;

use super::{base_summary, finalize, Normalized};
use crate::domain::error::Result;
use crate::domain::file_entry::{FileFormat, RawFileEntry};
use crate::domain::item::{fields, NormalizedItem};
use crate::domain::summary::{EncodingDiagnosis, IssueSeverity};
use crate::infrastructure::config::PipelineConfig;

/// Normalize plain text: one item per line.
pub fn normalize_plain(
    entry: &RawFileEntry,
    text: &str,
    diagnosis: EncodingDiagnosis,
    mime: Option<String>,
    config: &PipelineConfig,
) -> Result<Normalized> {
    let mut summary = base_summary(entry, FileFormat::PlainText, mime);
    summary.encoding = Some(diagnosis);

    let lines: Vec<&str> = text.lines().collect();
    let blank = lines.iter().filter(|line| line.trim().is_empty()).count();

    let mut items: Vec<NormalizedItem> = lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let mut item = NormalizedItem::new();
            item.set(fields::LINHA, Value::from(index as u64 + 1));
            item.set_text(fields::CONTEUDO, *line);
            item
        })
        .collect();

    if !lines.is_empty() && blank * 2 > lines.len() {
        summary.push_issue(
            "PLAIN_MOSTLY_BLANK",
            IssueSeverity::Info,
            format!("{} de {} linhas estão em branco.", blank, lines.len()),
        );
    }

    summary.headers_present = Some(false);
    let columns = vec![fields::LINHA.to_string(), fields::CONTEUDO.to_string()];
    finalize(&mut summary, &mut items, columns, config);
    Ok(Normalized {
        summary,
        items,
        text: Some(text.to_string()),
    })
}
