// ============================================================
// SCANNED DOCUMENT NORMALIZER
// ============================================================
// PDFs with a text layer are read directly; everything else goes
// through optical recognition. The recovered text is handed to a
// pluggable extraction step that returns zero or more structured items.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{base_summary, finalize, union_columns, Normalized};
use crate::domain::error::Result;
use crate::domain::file_entry::{FileFormat, RawFileEntry};
use crate::domain::item::{fields, NormalizedItem};
use crate::domain::summary::IssueSeverity;
use crate::infrastructure::config::PipelineConfig;
use crate::infrastructure::ocr::recover_text;
use crate::shared::log::PipelineLog;

/// Turns recovered document text into structured line items. The
/// generative-language collaborator implements this outside the core;
/// [`HeuristicExtractor`] is the deterministic built-in.
#[async_trait]
pub trait StructuredTextExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Vec<NormalizedItem>;
}

pub async fn normalize_scanned(
    entry: &RawFileEntry,
    mime: Option<String>,
    config: &PipelineConfig,
    log: &PipelineLog,
    extractor: &dyn StructuredTextExtractor,
) -> Result<Normalized> {
    let mut summary = base_summary(entry, FileFormat::DocumentImage, mime);

    let is_pdf = entry.bytes.starts_with(b"%PDF");
    let mut text = if is_pdf {
        extract_pdf_text_layer(&entry.bytes)
    } else {
        String::new()
    };

    if text.trim().is_empty() {
        summary.log("Sem camada de texto; executando reconhecimento ótico".to_string());
        let bytes = entry.bytes.clone();
        let config_owned = config.clone();
        let log_clone = log.clone();
        text = tokio::task::spawn_blocking(move || {
            recover_text(&bytes, is_pdf, &config_owned, &log_clone)
        })
        .await
        .map_err(|e| crate::domain::error::AppError::Internal(format!("OCR task failed: {}", e)))??;
    } else {
        summary.log(format!("Camada de texto do PDF: {} caracteres", text.len()));
    }

    let mut items = Vec::new();
    if text.trim().is_empty() {
        summary.push_issue(
            "OCR_EMPTY_TEXT",
            IssueSeverity::Error,
            "Nenhum texto recuperado do documento.",
        );
    } else {
        items = extractor.extract(&text).await;
        if items.is_empty() || items.iter().all(|item| item.is_empty()) {
            log.add(
                "WARN",
                "scanned",
                &format!("{}: texto recuperado sem colunas estruturadas", entry.name),
            );
            summary.push_issue(
                "OCR_NO_STRUCTURED_COLUMNS",
                IssueSeverity::Warn,
                "O texto recuperado não produziu campos estruturados.",
            );
            items.clear();
        }
    }

    summary.headers_present = Some(false);
    let columns = union_columns(&items);
    let text_out = if text.trim().is_empty() { None } else { Some(text) };
    finalize(&mut summary, &mut items, columns, config);
    Ok(Normalized {
        summary,
        items,
        text: text_out,
    })
}

fn extract_pdf_text_layer(bytes: &[u8]) -> String {
    let document = match lopdf::Document::load_mem(bytes) {
        Ok(document) => document,
        Err(_) => return String::new(),
    };

    let mut text = String::new();
    for (page_number, _) in document.get_pages() {
        if let Ok(page_text) = document.extract_text(&[page_number]) {
            let trimmed = page_text.trim();
            if !trimmed.is_empty() {
                if !text.is_empty() {
                    text.push_str("\n\n");
                }
                text.push_str(trimmed);
            }
        }
    }
    text
}

// ------------------------------------------------------------
// Built-in deterministic extractor
// ------------------------------------------------------------

static CNPJ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}").unwrap());
static DATE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2})/(\d{2})/(\d{4})\b").unwrap());
static DATE_ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap());
static TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)valor\s+total[^\d]{0,12}([\d.]+,\d{2}|[\d,]+\.\d{2}|\d+)").unwrap()
});
static NCM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bNCM\b[:\s]*(\d{8})").unwrap());
static CFOP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCFOP\b[:\s]*(\d{4})").unwrap());

/// Regex-driven recovery of the common header fields of a fiscal
/// document. Returns a single item, or none when the text carries no
/// recognizable field.
pub struct HeuristicExtractor;

#[async_trait]
impl StructuredTextExtractor for HeuristicExtractor {
    async fn extract(&self, text: &str) -> Vec<NormalizedItem> {
        let mut item = NormalizedItem::new();

        if let Some(captures) = DATE_BR.captures(text) {
            item.set_text(
                fields::DATA_EMISSAO,
                format!("{}-{}-{}", &captures[3], &captures[2], &captures[1]),
            );
        } else if let Some(found) = DATE_ISO.find(text) {
            item.set_text(fields::DATA_EMISSAO, found.as_str());
        }

        let mut cnpjs = CNPJ.find_iter(text);
        if let Some(first) = cnpjs.next() {
            item.set_text(fields::EMITENTE_CNPJ, normalize_cnpj(first.as_str()));
        }
        if let Some(second) = cnpjs.next() {
            item.set_text(fields::DESTINATARIO_CNPJ, normalize_cnpj(second.as_str()));
        }

        if let Some(captures) = TOTAL.captures(text) {
            item.set_text(fields::VALOR_TOTAL_NFE, &captures[1]);
        }
        if let Some(captures) = NCM.captures(text) {
            item.set_text(fields::PRODUTO_NCM, &captures[1]);
        }
        if let Some(captures) = CFOP.captures(text) {
            item.set_text(fields::PRODUTO_CFOP, &captures[1]);
        }

        if item.is_empty() {
            Vec::new()
        } else {
            vec![item]
        }
    }
}

fn normalize_cnpj(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heuristic_extractor_recovers_header_fields() {
        let text = "DANFE Documento Auxiliar\n\
                    Emitente: Alfa LTDA CNPJ 12.345.678/0001-90\n\
                    Destinatario: Beta SA CNPJ 98.765.432/0001-10\n\
                    Emissao: 01/07/2024\n\
                    CFOP: 6101 NCM: 96081000\n\
                    VALOR TOTAL DA NOTA R$ 1.234,56";
        let items = HeuristicExtractor.extract(text).await;
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(
            item.text(fields::DATA_EMISSAO).as_deref(),
            Some("2024-07-01")
        );
        assert_eq!(
            item.text(fields::EMITENTE_CNPJ).as_deref(),
            Some("12345678000190")
        );
        assert_eq!(
            item.text(fields::DESTINATARIO_CNPJ).as_deref(),
            Some("98765432000110")
        );
        assert_eq!(item.text(fields::PRODUTO_CFOP).as_deref(), Some("6101"));
        assert!((item.number(fields::VALOR_TOTAL_NFE) - 1234.56).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_heuristic_extractor_returns_nothing_for_prose() {
        let items = HeuristicExtractor.extract("apenas um texto qualquer").await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_unrecognizable_bytes_produce_error_issue_and_placeholder() {
        let config = PipelineConfig {
            ocr_command: "tesseract-binary-that-does-not-exist".to_string(),
            pdftoppm_command: "pdftoppm-binary-that-does-not-exist".to_string(),
            ..Default::default()
        };
        let entry = RawFileEntry::new("foto.png", vec![0x89, b'P', b'N', b'G'], None);
        let normalized = normalize_scanned(
            &entry,
            Some("image/png".to_string()),
            &config,
            &PipelineLog::new(),
            &HeuristicExtractor,
        )
        .await
        .unwrap();

        assert!(normalized.summary.has_issue("OCR_EMPTY_TEXT"));
        assert_eq!(normalized.items.len(), 1);
        assert!(normalized.text.is_none());
    }
}
