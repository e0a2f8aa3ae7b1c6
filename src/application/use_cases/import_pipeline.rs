// ============================================================
// IMPORT PIPELINE
// ============================================================
// Queue-driven ingestion: format detection, archive expansion back
// into the queue, and dispatch to the format normalizers. Every
// per-file failure degrades to an error-status document; the batch
// never aborts.

use std::collections::VecDeque;
use std::sync::Arc;

use super::normalizers::{
    base_summary, normalize_markup, normalize_plain, normalize_scanned, normalize_spreadsheet,
    normalize_structured, normalize_tabular, Normalized, StructuredTextExtractor,
};
use crate::domain::audit::{ImportStatus, ImportedDocument};
use crate::domain::error::{AppError, Result};
use crate::domain::file_entry::{FileFormat, RawFileEntry};
use crate::domain::item::NormalizedItem;
use crate::domain::summary::IssueSeverity;
use crate::infrastructure::archive::expand_archive;
use crate::infrastructure::config::PipelineConfig;
use crate::infrastructure::encoding::decode_bytes;
use crate::infrastructure::format::{detect_format, DetectedFormat};
use crate::shared::log::PipelineLog;
use crate::shared::progress::{CancelFlag, ProgressSink, ProgressUpdate};

pub async fn run_import(
    files: Vec<RawFileEntry>,
    config: Arc<PipelineConfig>,
    log: PipelineLog,
    progress: Option<ProgressSink>,
    cancel: CancelFlag,
    extractor: Arc<dyn StructuredTextExtractor>,
) -> Vec<ImportedDocument> {
    let mut queue: VecDeque<RawFileEntry> = files.into();
    let mut total = queue.len();
    let mut processed = 0usize;
    let mut last_percent = 0.0f64;
    let mut documents = Vec::new();

    log.add(
        "INFO",
        "import",
        &format!("Importação iniciada com {} arquivo(s)", total),
    );

    while let Some(entry) = queue.pop_front() {
        if cancel.is_cancelled() {
            log.add("WARN", "import", "Importação cancelada pelo usuário");
            break;
        }

        let detected = detect_format(&entry);
        log.add(
            "INFO",
            "import",
            &format!("Processando {} ({})", entry.name, detected.format),
        );

        match detected.format {
            FileFormat::Archive => {
                let (document, mut extracted) =
                    expand_archive_entry(&entry, &detected, &config, &log);
                total += extracted.len();
                for new_entry in extracted.drain(..) {
                    queue.push_back(new_entry);
                }
                documents.push(document);
            }
            FileFormat::Unsupported => {
                documents.push(error_document(
                    &entry,
                    &detected,
                    "Formato de arquivo não suportado.",
                ));
            }
            _ => {
                let document = match normalize_entry(&entry, &detected, &config, &log, &extractor)
                    .await
                {
                    Ok(normalized) => parsed_document(&entry, &detected, normalized),
                    Err(error) => {
                        log.add(
                            "ERROR",
                            "import",
                            &format!("{}: {}", entry.name, error),
                        );
                        error_document(&entry, &detected, &error.to_string())
                    }
                };
                documents.push(document);
            }
        }

        processed += 1;
        if let Some(progress) = &progress {
            let percent = (processed as f64 / total.max(1) as f64 * 100.0).max(last_percent);
            last_percent = percent;
            progress(ProgressUpdate {
                percent,
                step: format!("Processando arquivos ({}/{})", processed, total),
                processed,
                total,
            });
        }
    }

    log.add(
        "INFO",
        "import",
        &format!("Importação concluída: {} documento(s)", documents.len()),
    );
    documents
}

/// Expand an archive into new queue entries. The archive itself becomes
/// a document carrying the sanitization record; an unopenable archive
/// degrades to an error document.
fn expand_archive_entry(
    entry: &RawFileEntry,
    detected: &DetectedFormat,
    config: &PipelineConfig,
    log: &PipelineLog,
) -> (ImportedDocument, Vec<RawFileEntry>) {
    match expand_archive(entry, config) {
        Ok(expansion) => {
            let mut summary = base_summary(entry, FileFormat::Archive, detected.mime.clone());
            summary.log(format!(
                "{} entrada(s) aceitas, {} descartada(s)",
                expansion.accepted.len(),
                expansion.discarded_count
            ));
            if expansion.discarded_count > 0 {
                log.add(
                    "INFO",
                    "import",
                    &format!(
                        "{}: {} entrada(s) bloqueadas por segurança",
                        entry.name, expansion.discarded_count
                    ),
                );
                summary.discarded_files = expansion.discarded.clone();
                summary.push_issue(
                    "ZIP_SANITIZED",
                    IssueSeverity::Info,
                    format!(
                        "{} entrada(s) com extensão executável foram descartadas.",
                        expansion.discarded_count
                    ),
                );
            }
            let document = ImportedDocument {
                id: entry.id.clone(),
                kind: FileFormat::Archive,
                name: entry.name.clone(),
                size: entry.size(),
                status: ImportStatus::Parsed,
                items: vec![NormalizedItem::placeholder(format!(
                    "Arquivo compactado com {} entrada(s)",
                    expansion.accepted.len()
                ))],
                text: None,
                error: None,
                summary,
            };
            (document, expansion.accepted)
        }
        Err(error) => (
            error_document(entry, detected, &error.to_string()),
            Vec::new(),
        ),
    }
}

/// Hand one non-archive entry to its normalizer. CPU-heavy work runs on
/// a blocking task so independent files could be normalized in
/// parallel by the scheduler.
async fn normalize_entry(
    entry: &RawFileEntry,
    detected: &DetectedFormat,
    config: &Arc<PipelineConfig>,
    log: &PipelineLog,
    extractor: &Arc<dyn StructuredTextExtractor>,
) -> Result<Normalized> {
    let format = detected.format;
    match format {
        FileFormat::DocumentImage => {
            normalize_scanned(entry, detected.mime.clone(), config, log, extractor.as_ref()).await
        }
        _ => {
            let entry = entry.clone();
            let mime = detected.mime.clone();
            let config = Arc::clone(config);
            let log = log.clone();
            tokio::task::spawn_blocking(move || match format {
                FileFormat::SpreadsheetBinary => {
                    normalize_spreadsheet(&entry, mime, &config, &log)
                }
                FileFormat::TabularText => {
                    let decoded = decode_bytes(&entry.bytes, &[]);
                    normalize_tabular(&entry, &decoded.text, decoded.diagnosis, mime, &config, &log)
                }
                FileFormat::Markup => {
                    let decoded = decode_bytes(&entry.bytes, &[]);
                    normalize_markup(&entry, &decoded.text, decoded.diagnosis, mime, &config, &log)
                }
                FileFormat::StructuredText => {
                    let decoded = decode_bytes(&entry.bytes, &[]);
                    normalize_structured(&entry, &decoded.text, decoded.diagnosis, mime, &config)
                }
                FileFormat::PlainText => {
                    let decoded = decode_bytes(&entry.bytes, &[]);
                    normalize_plain(&entry, &decoded.text, decoded.diagnosis, mime, &config)
                }
                other => Err(AppError::Internal(format!(
                    "No normalizer for format {}",
                    other
                ))),
            })
            .await
            .map_err(|e| AppError::Internal(format!("Normalization task failed: {}", e)))?
        }
    }
}

fn parsed_document(
    entry: &RawFileEntry,
    detected: &DetectedFormat,
    normalized: Normalized,
) -> ImportedDocument {
    ImportedDocument {
        id: entry.id.clone(),
        kind: detected.format,
        name: entry.name.clone(),
        size: entry.size(),
        status: ImportStatus::Parsed,
        items: normalized.items,
        text: normalized.text,
        error: None,
        summary: normalized.summary,
    }
}

fn error_document(
    entry: &RawFileEntry,
    detected: &DetectedFormat,
    message: &str,
) -> ImportedDocument {
    let mut summary = base_summary(entry, detected.format, detected.mime.clone());
    summary.push_issue("IMPORT_ERROR", IssueSeverity::Error, message);
    let status = if detected.format == FileFormat::Unsupported {
        ImportStatus::Unsupported
    } else {
        ImportStatus::Error
    };
    ImportedDocument {
        id: entry.id.clone(),
        kind: detected.format,
        name: entry.name.clone(),
        size: entry.size(),
        status,
        items: Vec::new(),
        text: None,
        error: Some(message.to_string()),
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::normalizers::HeuristicExtractor;
    use std::io::Write;
    use std::sync::Mutex;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn extractor() -> Arc<dyn StructuredTextExtractor> {
        Arc::new(HeuristicExtractor)
    }

    async fn import(files: Vec<RawFileEntry>) -> Vec<ImportedDocument> {
        run_import(
            files,
            Arc::new(PipelineConfig::default()),
            PipelineLog::new(),
            None,
            CancelFlag::new(),
            extractor(),
        )
        .await
    }

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, bytes) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_mixed_batch_produces_one_document_per_file() {
        let files = vec![
            RawFileEntry::new("notas.csv", b"produto_nome,produto_qtd\nCaneta,10".to_vec(), None),
            RawFileEntry::new("coisas.bin", vec![0x00, 0x01], None),
        ];
        let documents = import(files).await;
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].status, ImportStatus::Parsed);
        assert_eq!(documents[1].status, ImportStatus::Unsupported);
        assert!(documents[1].error.is_some());
    }

    #[tokio::test]
    async fn test_archive_members_enter_the_queue_with_provenance() {
        let zip_bytes = build_zip(&[
            ("docs/notas.csv", b"produto_nome;produto_qtd\nCaneta;10"),
            ("malware.js", b"alert(1)"),
        ]);
        let documents = import(vec![RawFileEntry::new("lote.zip", zip_bytes, None)]).await;

        // The archive itself plus its one accepted member.
        assert_eq!(documents.len(), 2);
        let archive_doc = &documents[0];
        assert_eq!(archive_doc.kind, FileFormat::Archive);
        assert!(archive_doc
            .summary
            .discarded_files
            .contains(&"malware.js".to_string()));
        assert!(archive_doc.summary.has_issue("ZIP_SANITIZED"));

        let member = &documents[1];
        assert_eq!(member.name, "notas.csv");
        assert_eq!(
            member.summary.parent_archive.as_deref(),
            Some("lote.zip")
        );
        assert_eq!(member.status, ImportStatus::Parsed);
        // The blocked entry never became a document.
        assert!(!documents.iter().any(|d| d.name == "malware.js"));
    }

    #[tokio::test]
    async fn test_nested_archive_is_expanded_via_the_queue() {
        let inner = build_zip(&[("dentro.csv", b"a;b\n1;2")]);
        let outer = build_zip(&[("interno.zip", &inner)]);
        let documents = import(vec![RawFileEntry::new("externo.zip", outer, None)]).await;

        // outer archive + inner archive + inner csv
        assert_eq!(documents.len(), 3);
        assert_eq!(documents[2].name, "dentro.csv");
        assert_eq!(
            documents[2].summary.parent_archive.as_deref(),
            Some("interno.zip")
        );
    }

    #[tokio::test]
    async fn test_corrupt_archive_degrades_to_error_document() {
        let documents = import(vec![RawFileEntry::new(
            "quebrado.zip",
            b"PK\x03\x04garbage".to_vec(),
            None,
        )])
        .await;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].status, ImportStatus::Error);
    }

    #[tokio::test]
    async fn test_progress_is_monotone_and_counts_discovered_files() {
        let zip_bytes = build_zip(&[("um.csv", b"a;b\n1;2"), ("dois.csv", b"c;d\n3;4")]);
        let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink: ProgressSink = {
            let updates = Arc::clone(&updates);
            Arc::new(move |update: ProgressUpdate| {
                updates.lock().unwrap().push(update);
            })
        };
        run_import(
            vec![RawFileEntry::new("lote.zip", zip_bytes, None)],
            Arc::new(PipelineConfig::default()),
            PipelineLog::new(),
            Some(sink),
            CancelFlag::new(),
            extractor(),
        )
        .await;

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 3);
        assert!(updates.windows(2).all(|w| w[0].percent <= w[1].percent));
        assert_eq!(updates.last().unwrap().total, 3);
        assert!((updates.last().unwrap().percent - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_batch_with_every_file_failing_still_returns_documents() {
        let files = vec![
            RawFileEntry::new("ruim.json", b"{not json".to_vec(), None),
            RawFileEntry::new("ruim.xml", b"<a><b></a>".to_vec(), None),
        ];
        let documents = import(files).await;
        assert_eq!(documents.len(), 2);
        assert!(documents
            .iter()
            .all(|d| d.status == ImportStatus::Error && d.error.is_some()));
    }
}
