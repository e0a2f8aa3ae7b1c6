pub mod accountant;
pub mod auditor;
pub mod classifier;
pub mod column_profiler;
pub mod cross_validator;
pub mod import_pipeline;
pub mod normalizers;
pub mod pipeline;
pub mod reconciliation;
pub mod rules_catalog;
pub mod rules_engine;
