//! Batch processing: a bounded worker pool runs the per-document pipeline
//! over every document of a job, with one serialized progress update per
//! finished document and cooperative cancellation between documents.

pub mod cancel;
pub mod progress;
pub mod task;
pub mod orchestrator;

pub use cancel::CancelToken;
pub use progress::ProgressTracker;
pub use task::DocumentTask;
pub use orchestrator::*;

use thiserror::Error;
use uuid::Uuid;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Batch job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid batch job: {0}")]
    InvalidJob(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}
