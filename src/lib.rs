//! Deterministic ingestion, normalization and audit pipeline for fiscal
//! documents.
//!
//! The pipeline ingests heterogeneous uploads (tabular text, NFe XML,
//! spreadsheets, JSON, plain text, scanned PDFs/images and ZIP
//! archives), normalizes them into a common row model, evaluates each
//! line item against a deterministic catalog of fiscal-consistency
//! rules, cross-checks attributes across documents, and optionally
//! reconciles the batch against bank-statement transactions.
//!
//! ```no_run
//! use fiscaudit::{AuditPipeline, CancelFlag, Corrections, RawFileEntry};
//!
//! # async fn demo() {
//! let pipeline = AuditPipeline::default();
//! let files = vec![RawFileEntry::new(
//!     "notas.csv",
//!     std::fs::read("notas.csv").unwrap(),
//!     Some("text/csv".to_string()),
//! )];
//! let report = pipeline
//!     .run(files, &Corrections::default(), None, CancelFlag::new())
//!     .await;
//! println!("{} documento(s)", report.documents.len());
//! # }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::{AuditPipeline, Corrections, HeuristicExtractor, StructuredTextExtractor};
pub use domain::{
    AppError, AuditReport, AuditStatus, AuditedDocument, BankTransaction, CrossValidationFinding,
    FileFormat, ImportedDocument, Inconsistency, NormalizedItem, QualityTier, RawFileEntry,
    ReconciliationResult, Result, Severity, StructuralSummary,
};
pub use infrastructure::config::PipelineConfig;
pub use infrastructure::logging::init_tracing;
pub use shared::{CancelFlag, LogEntry, PipelineLog, ProgressSink, ProgressUpdate};
