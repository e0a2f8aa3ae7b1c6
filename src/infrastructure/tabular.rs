// ============================================================
// TABULAR SNIFFER & PARSER
// ============================================================
// Delimiter sniffing against a fixed candidate set, scored over a
// capped preview; the winning delimiter and its paired quote character
// drive the full parse with a header row.

use csv::{ReaderBuilder, Trim};

use crate::domain::error::{AppError, Result};

/// The fixed candidate set the sniffer is allowed to choose from.
pub const DELIMITER_CANDIDATES: &[u8] = &[b',', b';', b'\t', b'|', b'^', b'~'];

#[derive(Debug, Clone, Copy)]
pub struct SniffedDialect {
    pub delimiter: u8,
    pub quote: u8,
}

/// Parsed tabular content: header names plus row cells, in file order.
#[derive(Debug)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub parse_errors: usize,
}

/// Score each candidate delimiter over a preview: average field count,
/// minus parse errors, minus a penalty for empty header names.
pub fn sniff_dialect(content: &str, preview_lines: usize) -> SniffedDialect {
    let preview: String = content
        .lines()
        .take(preview_lines.max(1))
        .collect::<Vec<_>>()
        .join("\n");

    let mut best = SniffedDialect {
        delimiter: b',',
        quote: b'"',
    };
    let mut best_score = f64::MIN;

    for &delimiter in DELIMITER_CANDIDATES {
        let quote = detect_quote(&preview, delimiter);
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .quote(quote)
            .has_headers(false)
            .from_reader(preview.as_bytes());

        let mut records = 0usize;
        let mut total_fields = 0usize;
        let mut errors = 0usize;
        let mut empty_headers = 0usize;

        for (index, result) in reader.records().enumerate() {
            match result {
                Ok(record) => {
                    records += 1;
                    total_fields += record.len();
                    if index == 0 {
                        empty_headers = record.iter().filter(|f| f.trim().is_empty()).count();
                    }
                }
                Err(_) => errors += 1,
            }
        }

        if records == 0 {
            continue;
        }
        let avg_fields = total_fields as f64 / records as f64;
        // A delimiter that never splits anything carries no signal.
        if avg_fields <= 1.0 {
            continue;
        }
        let score = avg_fields - errors as f64 - empty_headers as f64;
        if score > best_score {
            best_score = score;
            best = SniffedDialect { delimiter, quote };
        }
    }

    best
}

/// Pick the quote character by adjacency: a quote that appears right
/// next to the delimiter (or at a line boundary) is being used to wrap
/// fields.
fn detect_quote(preview: &str, delimiter: u8) -> u8 {
    let delim = delimiter as char;
    for quote in ['"', '\''] {
        let mut adjacency = 0usize;
        for line in preview.lines() {
            if line.starts_with(quote) || line.ends_with(quote) {
                adjacency += 1;
            }
            adjacency += line.matches(&format!("{}{}", delim, quote)).count();
            adjacency += line.matches(&format!("{}{}", quote, delim)).count();
        }
        if adjacency >= 2 {
            return quote as u8;
        }
    }
    b'"'
}

/// Full parse with the sniffed dialect. Rows shorter than the header are
/// padded; parse failures are counted, not fatal.
pub fn parse_table(content: &str, dialect: SniffedDialect) -> Result<ParsedTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .quote(dialect.quote)
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::ParseError(format!("Failed to read header row: {}", e)))?
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let name = name.trim();
            if name.is_empty() {
                format!("campo_{}", index + 1)
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();
    let mut parse_errors = 0usize;
    for result in reader.records() {
        match result {
            Ok(record) => {
                if record.iter().all(|cell| cell.trim().is_empty()) {
                    continue;
                }
                rows.push(record.iter().map(|cell| cell.to_string()).collect());
            }
            Err(_) => parse_errors += 1,
        }
    }

    Ok(ParsedTable {
        headers,
        rows,
        parse_errors,
    })
}
