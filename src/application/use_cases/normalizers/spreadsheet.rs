use std::io::Cursor;

use calamine::{Data, DataType, Reader, Xlsx};
use serde_json::Value;

use super::{base_summary, finalize, union_columns, Normalized};
use crate::domain::error::{AppError, Result};
use crate::domain::file_entry::{FileFormat, RawFileEntry};
use crate::domain::item::{fields, NormalizedItem};
use crate::domain::summary::IssueSeverity;
use crate::infrastructure::config::PipelineConfig;
use crate::shared::log::PipelineLog;
use crate::shared::numeric::parse_flexible_number;

/// Normalize a binary workbook: every sheet is converted to rows tagged
/// with the sheet name and concatenated into one item set.
pub fn normalize_spreadsheet(
    entry: &RawFileEntry,
    mime: Option<String>,
    config: &PipelineConfig,
    log: &PipelineLog,
) -> Result<Normalized> {
    let mut summary = base_summary(entry, FileFormat::SpreadsheetBinary, mime);

    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(entry.bytes.as_slice()))
        .map_err(|e| AppError::ParseError(format!("Cannot open workbook {}: {}", entry.name, e)))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut items: Vec<NormalizedItem> = Vec::new();

    for (index, sheet_name) in sheet_names.iter().enumerate() {
        let range = match workbook.worksheet_range_at(index) {
            Some(Ok(range)) => range,
            Some(Err(e)) => {
                log.add(
                    "WARN",
                    "spreadsheet",
                    &format!("{}: planilha \"{}\" ilegível: {}", entry.name, sheet_name, e),
                );
                continue;
            }
            None => continue,
        };

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect())
            .filter(|cells: &Vec<String>| cells.iter().any(|cell| !cell.trim().is_empty()))
            .collect();

        let sheet_items = rows_to_items(sheet_name, &rows);
        summary.log(format!(
            "Planilha \"{}\": {} linha(s)",
            sheet_name,
            sheet_items.len()
        ));
        items.extend(sheet_items);
    }

    if items.is_empty() {
        summary.push_issue(
            "SPREADSHEET_NO_ROWS",
            IssueSeverity::Error,
            "Nenhuma linha de dados em nenhuma planilha.",
        );
    }

    summary.headers_present = Some(true);
    let columns = union_columns(&items);
    finalize(&mut summary, &mut items, columns, config);
    Ok(Normalized {
        summary,
        items,
        text: None,
    })
}

fn cell_to_string(cell: &Data) -> String {
    cell.as_string()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("{}", cell))
        .trim()
        .to_string()
}

/// Convert one sheet's rows into items. The first row is used as the
/// header when it looks like one; otherwise positional names are used.
pub(crate) fn rows_to_items(sheet_name: &str, rows: &[Vec<String>]) -> Vec<NormalizedItem> {
    if rows.is_empty() {
        return Vec::new();
    }

    let (headers, data_rows): (Vec<String>, &[Vec<String>]) = if looks_like_header(&rows[0]) {
        (rows[0].clone(), &rows[1..])
    } else {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        (
            (0..width).map(|i| format!("campo_{}", i + 1)).collect(),
            rows,
        )
    };

    data_rows
        .iter()
        .map(|row| {
            let mut item = NormalizedItem::new();
            item.set_text(fields::PLANILHA, sheet_name);
            for (index, header) in headers.iter().enumerate() {
                let cell = row.get(index).map(|c| c.trim()).unwrap_or("");
                if !cell.is_empty() {
                    let name = if header.trim().is_empty() {
                        format!("campo_{}", index + 1)
                    } else {
                        header.trim().to_string()
                    };
                    item.set(name, Value::String(cell.to_string()));
                }
            }
            item
        })
        .collect()
}

/// A header row is all-text: no cell parses as a number and most cells
/// are non-empty.
fn looks_like_header(row: &[String]) -> bool {
    if row.is_empty() {
        return false;
    }
    let non_empty = row.iter().filter(|cell| !cell.trim().is_empty()).count();
    if non_empty * 2 < row.len() {
        return false;
    }
    row.iter()
        .filter(|cell| !cell.trim().is_empty())
        .all(|cell| parse_flexible_number(cell).is_none())
}
