use std::sync::Mutex;

use crate::models::ProgressCounts;

/// Serialized progress counters for one running batch.
///
/// `record` is the only mutation path. Each call holds the lock for the whole
/// read-modify-write, so concurrent workers never lose an update.
#[derive(Debug)]
pub struct ProgressTracker {
    counts: Mutex<ProgressCounts>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            counts: Mutex::new(ProgressCounts::new(total)),
        }
    }

    /// Count one finished document. Returns the updated counters, or `None`
    /// when every document has already been counted.
    pub fn record(&self, success: bool) -> Option<ProgressCounts> {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        if counts.processed >= counts.total {
            tracing::debug!(
                total = counts.total,
                "Progress update past batch total ignored"
            );
            return None;
        }

        counts.processed += 1;
        if success {
            counts.success += 1;
        } else {
            counts.failure += 1;
        }
        debug_assert!(counts.is_consistent());
        Some(*counts)
    }

    pub fn snapshot(&self) -> ProgressCounts {
        *self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }
}
