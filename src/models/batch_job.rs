use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::BatchStatus;
use super::ModelError;

/// Maximum number of documents accepted in a single batch.
pub const MAX_BATCH_DOCUMENTS: usize = 1000;

/// Point-in-time copy of a job's progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounts {
    pub total: usize,
    pub processed: usize,
    pub success: usize,
    pub failure: usize,
}

impl ProgressCounts {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// `processed = success + failure` and `processed <= total`.
    pub fn is_consistent(&self) -> bool {
        self.processed == self.success + self.failure && self.processed <= self.total
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub job_name: String,
    pub description: Option<String>,
    pub analysis_template: Option<String>,
    pub status: BatchStatus,
    pub total_documents: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub document_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    /// Create a `Pending` job over `document_ids`.
    pub fn new(
        job_name: &str,
        description: Option<String>,
        analysis_template: Option<String>,
        document_ids: Vec<Uuid>,
    ) -> Result<Self, ModelError> {
        if document_ids.is_empty() {
            return Err(ModelError::EmptyBatch);
        }
        if document_ids.len() > MAX_BATCH_DOCUMENTS {
            return Err(ModelError::TooManyDocuments {
                count: document_ids.len(),
                max: MAX_BATCH_DOCUMENTS,
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            description,
            analysis_template,
            status: BatchStatus::Pending,
            total_documents: document_ids.len(),
            processed_count: 0,
            success_count: 0,
            failure_count: 0,
            document_ids,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        })
    }

    /// Template text when present and non-blank.
    pub fn template(&self) -> Option<&str> {
        self.analysis_template
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn has_analysis_template(&self) -> bool {
        self.template().is_some()
    }

    pub fn counts(&self) -> ProgressCounts {
        ProgressCounts {
            total: self.total_documents,
            processed: self.processed_count,
            success: self.success_count,
            failure: self.failure_count,
        }
    }

    pub fn apply_counts(&mut self, counts: ProgressCounts) {
        self.processed_count = counts.processed;
        self.success_count = counts.success;
        self.failure_count = counts.failure;
    }

    /// Enter `Running` and stamp `started_at`.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = BatchStatus::Running;
        self.started_at = Some(now);
    }

    /// Enter a terminal state and stamp `completed_at`.
    pub fn finish(&mut self, status: BatchStatus, now: DateTime<Utc>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.completed_at = Some(now);
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.total_documents == 0 {
            return 0.0;
        }
        self.processed_count as f64 * 100.0 / self.total_documents as f64
    }

    /// e.g. `"3/10 (30.0%)"`
    pub fn progress_text(&self) -> String {
        format!(
            "{}/{} ({:.1}%)",
            self.processed_count,
            self.total_documents,
            self.progress_percentage()
        )
    }

    /// Seconds remaining, extrapolated from the average time per processed document.
    /// `None` before the job starts or before the first document finishes.
    pub fn estimated_time_remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        let started = self.started_at?;
        if self.processed_count == 0 {
            return None;
        }
        let elapsed = (now - started).num_seconds().max(0) as f64;
        let per_doc = elapsed / self.processed_count as f64;
        let remaining = self.total_documents.saturating_sub(self.processed_count);
        Some((per_doc * remaining as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn new_job_is_pending_with_zero_counts() {
        let job = BatchJob::new("Q3 agreements", None, None, ids(3)).unwrap();
        assert_eq!(job.status, BatchStatus::Pending);
        assert_eq!(job.total_documents, 3);
        assert_eq!(job.counts(), ProgressCounts::new(3));
        assert!(job.started_at.is_none());
    }

    #[test]
    fn empty_batch_rejected() {
        assert_eq!(
            BatchJob::new("empty", None, None, vec![]).unwrap_err(),
            ModelError::EmptyBatch
        );
    }

    #[test]
    fn oversized_batch_rejected() {
        let err = BatchJob::new("big", None, None, ids(MAX_BATCH_DOCUMENTS + 1)).unwrap_err();
        assert_eq!(
            err,
            ModelError::TooManyDocuments {
                count: MAX_BATCH_DOCUMENTS + 1,
                max: MAX_BATCH_DOCUMENTS,
            }
        );
        assert!(BatchJob::new("max", None, None, ids(MAX_BATCH_DOCUMENTS)).is_ok());
    }

    #[test]
    fn blank_template_is_not_a_template() {
        let job = BatchJob::new("j", None, Some("   ".into()), ids(1)).unwrap();
        assert!(!job.has_analysis_template());
        let job = BatchJob::new("j", None, Some(" Find the PAN ".into()), ids(1)).unwrap();
        assert_eq!(job.template(), Some("Find the PAN"));
    }

    #[test]
    fn progress_text_and_percentage() {
        let mut job = BatchJob::new("j", None, None, ids(10)).unwrap();
        job.apply_counts(ProgressCounts {
            total: 10,
            processed: 3,
            success: 2,
            failure: 1,
        });
        assert!((job.progress_percentage() - 30.0).abs() < f64::EPSILON);
        assert_eq!(job.progress_text(), "3/10 (30.0%)");
    }

    #[test]
    fn eta_extrapolates_average() {
        let mut job = BatchJob::new("j", None, None, ids(10)).unwrap();
        let start = Utc::now();
        assert_eq!(job.estimated_time_remaining_secs(start), None);

        job.start(start);
        assert_eq!(job.estimated_time_remaining_secs(start), None);

        job.processed_count = 2;
        job.success_count = 2;
        // 20s for 2 docs -> 10s/doc, 8 remaining
        let eta = job.estimated_time_remaining_secs(start + Duration::seconds(20));
        assert_eq!(eta, Some(80));
    }

    #[test]
    fn start_and_finish_stamp_times() {
        let mut job = BatchJob::new("j", None, None, ids(1)).unwrap();
        let now = Utc::now();
        job.start(now);
        assert_eq!(job.status, BatchStatus::Running);
        assert_eq!(job.started_at, Some(now));
        job.finish(BatchStatus::Completed, now);
        assert_eq!(job.status, BatchStatus::Completed);
        assert_eq!(job.completed_at, Some(now));
    }

    #[test]
    fn counts_consistency() {
        let ok = ProgressCounts {
            total: 4,
            processed: 3,
            success: 2,
            failure: 1,
        };
        assert!(ok.is_consistent());
        assert_eq!(ok.remaining(), 1);

        let bad = ProgressCounts {
            total: 2,
            processed: 3,
            success: 3,
            failure: 0,
        };
        assert!(!bad.is_consistent());
    }
}
