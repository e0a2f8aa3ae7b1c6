pub mod language;
pub mod log;
pub mod numeric;
pub mod progress;

pub use log::{LogEntry, PipelineLog};
pub use progress::{CancelFlag, ProgressSink, ProgressUpdate};
