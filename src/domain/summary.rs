// ============================================================
// STRUCTURAL SUMMARY
// ============================================================
// Per-file structural diagnostics accumulated during normalization.

use serde::{Deserialize, Serialize};

use super::file_entry::FileFormat;
use super::item::NormalizedItem;
use super::profile::ColumnSemanticProfile;

/// Severity of a structural (not fiscal) issue found while reading a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    Info,
    Warn,
    Error,
}

impl IssueSeverity {
    /// Weight subtracted from the 100-point structural quality score.
    pub fn weight(&self) -> u32 {
        match self {
            IssueSeverity::Info => 1,
            IssueSeverity::Warn => 5,
            IssueSeverity::Error => 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralIssue {
    pub code: String,
    pub message: String,
    pub severity: IssueSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Coarse structural-confidence rating, derived purely from the
/// accumulated issue severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityTier {
    pub fn from_issues(issues: &[StructuralIssue]) -> Self {
        let penalty: u32 = issues.iter().map(|i| i.severity.weight()).sum();
        let score = 100i64 - penalty as i64;
        if score >= 85 {
            QualityTier::Excellent
        } else if score >= 70 {
            QualityTier::Good
        } else if score >= 50 {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }
}

/// Outcome of the encoding detection and decode fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingDiagnosis {
    /// Best guess from statistical detection over the byte sample.
    pub detected: String,
    /// Encoding that actually produced the decoded text.
    pub normalized: String,
    pub confidence: f64,
    pub bom_stripped: bool,
    pub attempted_encodings: Vec<String>,
}

/// One per processed file: everything the pipeline learned about its
/// structure while normalizing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralSummary {
    pub format: FileFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub size_in_bytes: u64,
    /// SHA-256 over the raw bytes, hex-encoded.
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_archive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<EncodingDiagnosis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_char: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers_present: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    pub sample_rows: Vec<NormalizedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub quality: QualityTier,
    pub issues: Vec<StructuralIssue>,
    pub processing_log: Vec<String>,
    /// Archive entries dropped by the security blocklist (capped sample).
    pub discarded_files: Vec<String>,
    pub column_profiles: Vec<ColumnSemanticProfile>,
}

impl StructuralSummary {
    pub fn new(format: FileFormat, size_in_bytes: u64, checksum: String) -> Self {
        Self {
            format,
            mime_type: None,
            size_in_bytes,
            checksum,
            parent_archive: None,
            internal_path: None,
            encoding: None,
            delimiter: None,
            quote_char: None,
            headers_present: None,
            column_count: None,
            columns: None,
            row_count: None,
            sample_rows: Vec::new(),
            language: None,
            locale: None,
            quality: QualityTier::Excellent,
            issues: Vec::new(),
            processing_log: Vec::new(),
            discarded_files: Vec::new(),
            column_profiles: Vec::new(),
        }
    }

    /// Record an issue and recompute the quality tier so it always stays
    /// a pure function of the issue list.
    pub fn push_issue(
        &mut self,
        code: impl Into<String>,
        severity: IssueSeverity,
        message: impl Into<String>,
    ) {
        self.issues.push(StructuralIssue {
            code: code.into(),
            message: message.into(),
            severity,
            hint: None,
        });
        self.quality = QualityTier::from_issues(&self.issues);
    }

    pub fn push_issue_with_hint(
        &mut self,
        code: impl Into<String>,
        severity: IssueSeverity,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.issues.push(StructuralIssue {
            code: code.into(),
            message: message.into(),
            severity,
            hint: Some(hint.into()),
        });
        self.quality = QualityTier::from_issues(&self.issues);
    }

    /// Record an already-built issue (profiler output), keeping the
    /// quality tier in sync.
    pub fn push_structural_issue(&mut self, issue: StructuralIssue) {
        self.issues.push(issue);
        self.quality = QualityTier::from_issues(&self.issues);
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.processing_log.push(line.into());
    }

    pub fn has_issue(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}
