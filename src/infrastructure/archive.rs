// ============================================================
// ARCHIVE EXPANDER
// ============================================================
// Lists ZIP entries, applies the executable blocklist and a per-entry
// size cap, and turns accepted entries into new queue items carrying
// provenance. Nested archives re-enter the ingestion queue; recursion
// depth is bounded by queue memory, never by the call stack.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::domain::error::{AppError, Result};
use crate::domain::file_entry::RawFileEntry;
use crate::infrastructure::config::PipelineConfig;

pub struct ArchiveExpansion {
    pub accepted: Vec<RawFileEntry>,
    /// Names of entries dropped by the blocklist or size cap (capped).
    pub discarded: Vec<String>,
    pub discarded_count: usize,
}

pub fn expand_archive(entry: &RawFileEntry, config: &PipelineConfig) -> Result<ArchiveExpansion> {
    let mut archive = ZipArchive::new(Cursor::new(entry.bytes.as_slice()))
        .map_err(|e| AppError::ParseError(format!("Cannot open archive {}: {}", entry.name, e)))?;

    let mut accepted = Vec::new();
    let mut discarded = Vec::new();
    let mut discarded_count = 0usize;

    for index in 0..archive.len() {
        let mut file = match archive.by_index(index) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(archive = %entry.name, index, error = %e, "unreadable archive entry");
                discarded_count += 1;
                continue;
            }
        };
        if file.is_dir() {
            continue;
        }

        let internal_path = file.name().to_string();
        let ext = internal_path
            .rsplit('.')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        if config.extension_blocked(&ext) {
            discarded_count += 1;
            if discarded.len() < config.max_discarded_names {
                discarded.push(internal_path);
            }
            continue;
        }
        if file.size() > config.max_archive_entry_bytes {
            discarded_count += 1;
            if discarded.len() < config.max_discarded_names {
                discarded.push(internal_path);
            }
            continue;
        }

        let mut bytes = Vec::with_capacity(file.size() as usize);
        if let Err(e) = file.read_to_end(&mut bytes) {
            tracing::warn!(archive = %entry.name, entry = %internal_path, error = %e, "failed to extract entry");
            discarded_count += 1;
            if discarded.len() < config.max_discarded_names {
                discarded.push(internal_path);
            }
            continue;
        }

        accepted.push(RawFileEntry::from_archive(
            entry.name.clone(),
            internal_path,
            bytes,
        ));
    }

    Ok(ArchiveExpansion {
        accepted,
        discarded,
        discarded_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_blocklisted_entries_are_discarded_not_expanded() {
        let bytes = build_zip(&[
            ("docs/nota.xml", b"<nfe/>"),
            ("payload.js", b"alert(1)"),
            ("run.exe", b"MZ"),
        ]);
        let entry = RawFileEntry::new("lote.zip", bytes, None);
        let expansion = expand_archive(&entry, &PipelineConfig::default()).unwrap();

        assert_eq!(expansion.accepted.len(), 1);
        assert_eq!(expansion.accepted[0].name, "nota.xml");
        assert_eq!(
            expansion.accepted[0].parent_archive.as_deref(),
            Some("lote.zip")
        );
        assert_eq!(expansion.discarded_count, 2);
        assert!(expansion.discarded.contains(&"payload.js".to_string()));
        assert!(expansion.discarded.contains(&"run.exe".to_string()));
    }

    #[test]
    fn test_nested_archive_is_accepted_for_requeueing() {
        let inner = build_zip(&[("dentro.csv", b"a;b\n1;2")]);
        let outer = build_zip(&[("interno.zip", &inner)]);
        let entry = RawFileEntry::new("externo.zip", outer, None);
        let expansion = expand_archive(&entry, &PipelineConfig::default()).unwrap();

        assert_eq!(expansion.accepted.len(), 1);
        assert_eq!(expansion.accepted[0].name, "interno.zip");
        assert!(expansion.accepted[0].bytes.starts_with(b"PK\x03\x04"));
    }

    #[test]
    fn test_corrupt_archive_is_an_error() {
        let entry = RawFileEntry::new("quebrado.zip", b"PK\x03\x04garbage".to_vec(), None);
        assert!(expand_archive(&entry, &PipelineConfig::default()).is_err());
    }

    #[test]
    fn test_discarded_names_are_capped() {
        let names: Vec<String> = (0..30).map(|i| format!("script{}.js", i)).collect();
        let entries: Vec<(&str, &[u8])> = names
            .iter()
            .map(|n| (n.as_str(), b"x".as_slice()))
            .collect();
        let bytes = build_zip(&entries);
        let entry = RawFileEntry::new("scripts.zip", bytes, None);
        let config = PipelineConfig::default();
        let expansion = expand_archive(&entry, &config).unwrap();

        assert_eq!(expansion.discarded_count, 30);
        assert_eq!(expansion.discarded.len(), config.max_discarded_names);
    }
}
