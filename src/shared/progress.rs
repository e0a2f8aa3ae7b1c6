// Progress and cancellation primitives shared by the long-running
// stages (ingestion, reconciliation).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A progress tick: monotonically non-decreasing percentage plus a
/// current-step label.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub percent: f64,
    pub step: String,
    pub processed: usize,
    /// Total known so far; grows as archive expansion discovers files.
    pub total: usize,
}

/// Callback surface the caller injects to observe progress.
pub type ProgressSink = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Cooperative cancellation flag checked between units of work. Shared
/// pools are only mutated after a unit commits, so cancelling never
/// leaves them inconsistent.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_visible_across_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
