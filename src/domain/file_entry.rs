use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Container format inferred by the detector from byte signature and
/// file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileFormat {
    Markup,
    TabularText,
    SpreadsheetBinary,
    StructuredText,
    PlainText,
    Archive,
    DocumentImage,
    Unsupported,
}

impl FileFormat {
    /// True for formats whose content is text and goes through the
    /// encoding detector before normalization.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            FileFormat::Markup
                | FileFormat::TabularText
                | FileFormat::StructuredText
                | FileFormat::PlainText
        )
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            FileFormat::Markup => "MARKUP",
            FileFormat::TabularText => "TABULAR_TEXT",
            FileFormat::SpreadsheetBinary => "SPREADSHEET_BINARY",
            FileFormat::StructuredText => "STRUCTURED_TEXT",
            FileFormat::PlainText => "PLAIN_TEXT",
            FileFormat::Archive => "ARCHIVE",
            FileFormat::DocumentImage => "DOCUMENT_IMAGE",
            FileFormat::Unsupported => "UNSUPPORTED",
        };
        write!(f, "{}", tag)
    }
}

/// An uploaded (or archive-extracted) binary blob waiting in the
/// ingestion queue. Owned exclusively by the queue until consumed.
#[derive(Debug, Clone)]
pub struct RawFileEntry {
    pub id: String,
    pub name: String,
    pub bytes: Vec<u8>,
    pub declared_mime: Option<String>,
    /// Name of the archive this entry was extracted from, if any.
    pub parent_archive: Option<String>,
    /// Path of the entry inside its parent archive.
    pub internal_path: Option<String>,
}

impl RawFileEntry {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, declared_mime: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            bytes,
            declared_mime,
            parent_archive: None,
            internal_path: None,
        }
    }

    pub fn from_archive(
        parent_archive: impl Into<String>,
        internal_path: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let internal_path = internal_path.into();
        let name = internal_path
            .rsplit('/')
            .next()
            .unwrap_or(internal_path.as_str())
            .to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            bytes,
            declared_mime: None,
            parent_archive: Some(parent_archive.into()),
            internal_path: Some(internal_path),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercase file extension, without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.internal_path.as_deref().unwrap_or(&self.name);
        name.rsplit('.')
            .next()
            .filter(|ext| !ext.contains('/') && ext.len() < name.len())
            .map(|ext| ext.to_ascii_lowercase())
    }
}
