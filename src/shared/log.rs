// ============================================================
// PIPELINE LOG
// ============================================================
// Append-only log injected into the pipeline as a capability. The only
// structure mutated concurrently across stages; appends are guarded by
// a mutex so parallel normalizers can share one instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub source: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl PipelineLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, level: &str, source: &str, message: &str) {
        tracing::debug!(source, level, "{}", message);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry {
                timestamp: Utc::now(),
                level: level.to_string(),
                source: source.to_string(),
                message: message.to_string(),
            });
        }
    }

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
