pub mod use_cases;

pub use use_cases::classifier::Corrections;
pub use use_cases::normalizers::{HeuristicExtractor, StructuredTextExtractor};
pub use use_cases::pipeline::AuditPipeline;
