// ============================================================
// DOMAIN LAYER
// ============================================================
// Core types for the audit pipeline. No I/O in this layer.

pub mod audit;
pub mod bank;
pub mod error;
pub mod file_entry;
pub mod item;
pub mod profile;
pub mod report;
pub mod summary;

pub use audit::{
    AuditStatus, AuditedDocument, ClassificationResult, ImportStatus, ImportedDocument,
    Inconsistency, OperationType, ReconciliationStatus, Severity,
};
pub use bank::{BankTransaction, MatchedPair, ReconciliationResult, TransactionKind};
pub use error::{AppError, Result};
pub use file_entry::{FileFormat, RawFileEntry};
pub use item::NormalizedItem;
pub use profile::{ColumnSemanticProfile, NumericStats, SemanticType};
pub use report::{AuditReport, CrossValidationFinding, DocRef, Discrepancy};
pub use summary::{
    EncodingDiagnosis, IssueSeverity, QualityTier, StructuralIssue, StructuralSummary,
};
