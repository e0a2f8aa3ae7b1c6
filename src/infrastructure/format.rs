// ============================================================
// FORMAT DETECTOR
// ============================================================
// Classifies a raw buffer into a container format by combining a
// byte-signature prefix with the declared file extension.

use crate::domain::file_entry::{FileFormat, RawFileEntry};

#[derive(Debug, Clone)]
pub struct DetectedFormat {
    pub format: FileFormat,
    pub mime: Option<String>,
}

pub fn detect_format(entry: &RawFileEntry) -> DetectedFormat {
    let ext = entry.extension().unwrap_or_default();
    let bytes = &entry.bytes;

    // Byte signatures take precedence over extensions: an uploaded
    // ".csv" that starts with %PDF is a PDF.
    if bytes.starts_with(b"PK\x03\x04") {
        return if matches!(ext.as_str(), "xlsx" | "xlsm") {
            found(FileFormat::SpreadsheetBinary, Some(XLSX_MIME))
        } else {
            found(FileFormat::Archive, Some("application/zip"))
        };
    }
    if bytes.starts_with(b"%PDF") {
        return found(FileFormat::DocumentImage, Some("application/pdf"));
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return found(FileFormat::DocumentImage, Some("image/png"));
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return found(FileFormat::DocumentImage, Some("image/jpeg"));
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return found(FileFormat::DocumentImage, Some("image/gif"));
    }
    if bytes.starts_with(b"II*\x00") || bytes.starts_with(b"MM\x00*") {
        return found(FileFormat::DocumentImage, Some("image/tiff"));
    }
    // Legacy OLE container; only trusted when the extension agrees.
    if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) && ext == "xls" {
        return found(FileFormat::SpreadsheetBinary, Some("application/vnd.ms-excel"));
    }

    let head = text_head(bytes);
    if head.starts_with('<') {
        return found(FileFormat::Markup, Some("text/xml"));
    }
    if head.starts_with('{') || head.starts_with('[') {
        return found(FileFormat::StructuredText, Some("application/json"));
    }

    match ext.as_str() {
        "xml" | "nfe" => found(FileFormat::Markup, Some("text/xml")),
        "csv" | "tsv" => found(FileFormat::TabularText, Some("text/csv")),
        "json" => found(FileFormat::StructuredText, Some("application/json")),
        "txt" | "md" | "log" => found(FileFormat::PlainText, Some("text/plain")),
        "xlsx" | "xlsm" => found(FileFormat::SpreadsheetBinary, Some(XLSX_MIME)),
        "xls" => found(FileFormat::SpreadsheetBinary, Some("application/vnd.ms-excel")),
        "zip" => found(FileFormat::Archive, Some("application/zip")),
        "pdf" => found(FileFormat::DocumentImage, Some("application/pdf")),
        "png" | "jpg" | "jpeg" | "bmp" | "tiff" | "tif" => {
            found(FileFormat::DocumentImage, Some("image/*"))
        }
        _ => match entry.declared_mime.as_deref() {
            Some("text/csv") => found(FileFormat::TabularText, Some("text/csv")),
            Some("application/json") => found(FileFormat::StructuredText, Some("application/json")),
            Some("text/xml") | Some("application/xml") => {
                found(FileFormat::Markup, Some("text/xml"))
            }
            Some("text/plain") => found(FileFormat::PlainText, Some("text/plain")),
            Some(mime) if mime.starts_with("image/") => {
                found(FileFormat::DocumentImage, Some("image/*"))
            }
            _ => DetectedFormat {
                format: FileFormat::Unsupported,
                mime: entry.declared_mime.clone(),
            },
        },
    }
}

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn found(format: FileFormat, mime: Option<&str>) -> DetectedFormat {
    DetectedFormat {
        format,
        mime: mime.map(|m| m.to_string()),
    }
}

/// First non-whitespace run of the buffer, decoded leniently, for
/// content sniffing of markup and JSON.
fn text_head(bytes: &[u8]) -> String {
    let window = &bytes[..bytes.len().min(256)];
    String::from_utf8_lossy(window)
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, bytes: &[u8]) -> RawFileEntry {
        RawFileEntry::new(name, bytes.to_vec(), None)
    }

    #[test]
    fn test_signature_wins_over_extension() {
        let detected = detect_format(&entry("nota.csv", b"%PDF-1.7 ..."));
        assert_eq!(detected.format, FileFormat::DocumentImage);
        assert_eq!(detected.mime.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_zip_signature_with_xlsx_extension_is_spreadsheet() {
        let detected = detect_format(&entry("planilha.xlsx", b"PK\x03\x04rest"));
        assert_eq!(detected.format, FileFormat::SpreadsheetBinary);
        let detected = detect_format(&entry("lote.zip", b"PK\x03\x04rest"));
        assert_eq!(detected.format, FileFormat::Archive);
    }

    #[test]
    fn test_markup_and_json_sniffing() {
        let detected = detect_format(&entry("qualquer.bin", b"  <?xml version=\"1.0\"?><nfe/>"));
        assert_eq!(detected.format, FileFormat::Markup);
        let detected = detect_format(&entry("dados", b"{\"a\": 1}"));
        assert_eq!(detected.format, FileFormat::StructuredText);
    }

    #[test]
    fn test_extension_fallbacks() {
        assert_eq!(
            detect_format(&entry("dados.csv", b"a;b;c")).format,
            FileFormat::TabularText
        );
        assert_eq!(
            detect_format(&entry("notas.txt", b"linha")).format,
            FileFormat::PlainText
        );
        assert_eq!(
            detect_format(&entry("foto.jpg", b"\xFF\xD8\xFFrest")).format,
            FileFormat::DocumentImage
        );
    }

    #[test]
    fn test_unknown_binary_is_unsupported() {
        assert_eq!(
            detect_format(&entry("programa.bin", &[0x00, 0x01, 0x02])).format,
            FileFormat::Unsupported
        );
    }
}
