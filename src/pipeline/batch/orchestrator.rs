//! Runs a batch job over a bounded pool of worker threads.
//!
//! Document ids go onto one channel; each worker pulls the next id, runs the
//! per-document pipeline, then updates the job counters under a single lock.
//! Cancellation is checked before each pull.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use serde::Serialize;
use uuid::Uuid;

use super::{BatchError, CancelToken, DocumentTask, ProgressTracker};
use crate::config::DEFAULT_WORKERS;
use crate::models::{BatchJob, BatchStatus, DocumentStatus};
use crate::pipeline::extraction::ExtractionEngine;
use crate::pipeline::routing::DocumentAnalyzer;
use crate::storage::{DocumentSource, DocumentStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub filename: String,
    pub status: DocumentStatus,
    pub total_pages: Option<usize>,
    pub file_size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub job_id: Uuid,
    pub job_name: String,
    pub status: BatchStatus,
    pub total_documents: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub progress_percentage: f64,
    pub progress_text: String,
    pub estimated_time_remaining_secs: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub documents: Vec<DocumentSummary>,
}

/// Result of an external cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The batch is running here; workers stop before their next document.
    Signalled,
    /// The batch was not running and is now `Cancelled`.
    Cancelled,
    /// Already terminal; nothing changed.
    AlreadyFinished(BatchStatus),
}

pub struct BatchOrchestrator {
    store: Arc<dyn DocumentStore>,
    source: Arc<dyn DocumentSource>,
    engine: Arc<ExtractionEngine>,
    analyzer: Option<Arc<DocumentAnalyzer>>,
    config: BatchConfig,
    running: Mutex<HashMap<Uuid, CancelToken>>,
}

impl BatchOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        source: Arc<dyn DocumentSource>,
        engine: Arc<ExtractionEngine>,
        analyzer: Option<Arc<DocumentAnalyzer>>,
        config: BatchConfig,
    ) -> Self {
        Self {
            store,
            source,
            engine,
            analyzer,
            config,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Process every document of a `Pending` job and return its final summary.
    ///
    /// Per-document failures are counted, never raised. The job ends
    /// `Cancelled` when `cancel` fires before every document was processed,
    /// otherwise `Completed`.
    pub fn run_batch(&self, job_id: Uuid, cancel: &CancelToken) -> Result<BatchSummary, BatchError> {
        let mut job = self.claim_job(job_id, cancel)?;

        job.start(Utc::now());
        let outcome = match self.store.save_batch_job(&job) {
            Ok(()) => {
                tracing::info!(
                    job_id = %job_id,
                    documents = job.total_documents,
                    workers = self.worker_count(job.total_documents),
                    "Batch started"
                );
                self.run_workers(job, cancel)
            }
            Err(e) => Err(e.into()),
        };
        self.running_tokens().remove(&job_id);

        let job = outcome?;
        self.summary_for(&job)
    }

    /// Check the job is runnable and register its cancel token in one step,
    /// so a concurrent `cancel_batch` either sees the token or runs first.
    fn claim_job(&self, job_id: Uuid, cancel: &CancelToken) -> Result<BatchJob, BatchError> {
        let mut running = self.running_tokens();
        let job = self.load_job(job_id)?;
        if job.status != BatchStatus::Pending || running.contains_key(&job_id) {
            return Err(BatchError::InvalidJob(format!(
                "job {job_id} is {}, expected pending",
                job.status
            )));
        }
        if job.document_ids.is_empty() {
            return Err(BatchError::InvalidJob(format!("job {job_id} has no documents")));
        }
        running.insert(job_id, cancel.clone());
        Ok(job)
    }

    fn run_workers(&self, job: BatchJob, cancel: &CancelToken) -> Result<BatchJob, BatchError> {
        let job_id = job.id;
        let worker_count = self.worker_count(job.total_documents);
        let template = job.template().map(str::to_string);
        let template = template.as_deref();

        let (tx, rx) = crossbeam_channel::bounded(job.document_ids.len());
        for id in &job.document_ids {
            tx.send(*id)
                .map_err(|e| BatchError::WorkerPool(format!("queue closed: {e}")))?;
        }
        drop(tx);

        let tracker = ProgressTracker::new(job.total_documents);
        let job_record = Mutex::new(job);

        let (panicked, spawn_error) = thread::scope(|s| {
            let tracker = &tracker;
            let job_record = &job_record;
            let mut handles = Vec::with_capacity(worker_count);
            let mut spawn_error = None;

            for n in 0..worker_count {
                let rx = rx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("docreader-worker-{n}"))
                    .spawn_scoped(s, move || {
                        self.worker_loop(rx, cancel, tracker, job_record, template)
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        tracing::error!(error = %e, "Could not spawn batch worker");
                        spawn_error = Some(e.to_string());
                        break;
                    }
                }
            }

            let panicked = handles
                .into_iter()
                .map(|h| h.join())
                .filter(Result::is_err)
                .count();
            (panicked, spawn_error)
        });

        let mut job = job_record.into_inner().unwrap_or_else(|e| e.into_inner());
        let counts = tracker.snapshot();
        job.apply_counts(counts);

        if panicked > 0 || (spawn_error.is_some() && counts.processed < counts.total) {
            job.finish(BatchStatus::Failed, Utc::now());
            self.store.save_batch_job(&job)?;
            let reason = spawn_error.unwrap_or_else(|| format!("{panicked} worker(s) panicked"));
            tracing::error!(job_id = %job_id, reason = %reason, "Batch failed");
            return Err(BatchError::WorkerPool(reason));
        }

        let status = if cancel.is_cancelled() && counts.processed < counts.total {
            BatchStatus::Cancelled
        } else {
            BatchStatus::Completed
        };
        job.finish(status, Utc::now());
        self.store.save_batch_job(&job)?;

        tracing::info!(
            job_id = %job_id,
            status = %status,
            processed = counts.processed,
            success = counts.success,
            failure = counts.failure,
            "Batch finished"
        );
        Ok(job)
    }

    fn worker_loop(
        &self,
        rx: Receiver<Uuid>,
        cancel: &CancelToken,
        tracker: &ProgressTracker,
        job: &Mutex<BatchJob>,
        template: Option<&str>,
    ) {
        loop {
            if cancel.is_cancelled() {
                tracing::debug!("Batch cancelled; worker stopping");
                break;
            }
            let Ok(document_id) = rx.recv() else {
                break;
            };

            let success = self.process_document(document_id, template);

            let mut job = job.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(counts) = tracker.record(success) {
                job.apply_counts(counts);
                if let Err(e) = self.store.save_batch_job(&job) {
                    tracing::warn!(job_id = %job.id, error = %e, "Could not persist batch progress");
                }
                tracing::info!(job_id = %job.id, progress = %job.progress_text(), "Batch progress");
            }
        }
    }

    fn process_document(&self, document_id: Uuid, template: Option<&str>) -> bool {
        let mut document = match self.store.load_document(&document_id) {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(document_id = %document_id, error = %e, "Could not load document");
                return false;
            }
        };
        let task = DocumentTask::new(
            &*self.store,
            &*self.source,
            &self.engine,
            self.analyzer.as_deref(),
        );
        task.run(&mut document, template)
    }

    /// Cancel a job. A job running on this orchestrator is signalled and ends
    /// `Cancelled` once in-flight documents finish; a queued job is marked
    /// `Cancelled` directly. A job persisted as `Running` without a token
    /// here belongs to another runner and is left untouched.
    pub fn cancel_batch(&self, job_id: Uuid) -> Result<CancelOutcome, BatchError> {
        let running = self.running_tokens();
        if let Some(token) = running.get(&job_id) {
            token.cancel();
            tracing::info!(job_id = %job_id, "Cancel signalled to running batch");
            return Ok(CancelOutcome::Signalled);
        }

        let mut job = self.load_job(job_id)?;
        if job.status.is_terminal() {
            return Ok(CancelOutcome::AlreadyFinished(job.status));
        }
        if job.status == BatchStatus::Running {
            return Err(BatchError::InvalidJob(format!(
                "job {job_id} is running on another orchestrator"
            )));
        }
        job.finish(BatchStatus::Cancelled, Utc::now());
        self.store.save_batch_job(&job)?;
        drop(running);
        tracing::info!(job_id = %job_id, "Batch cancelled");
        Ok(CancelOutcome::Cancelled)
    }

    /// Mark a queued job `Failed` from outside the worker pool.
    pub fn fail_batch(&self, job_id: Uuid, reason: &str) -> Result<(), BatchError> {
        let running = self.running_tokens();
        if running.contains_key(&job_id) {
            return Err(BatchError::InvalidJob(format!(
                "job {job_id} is running; cancel it first"
            )));
        }
        let mut job = self.load_job(job_id)?;
        if job.status != BatchStatus::Pending {
            return Err(BatchError::InvalidJob(format!(
                "job {job_id} is {}, expected pending",
                job.status
            )));
        }
        job.finish(BatchStatus::Failed, Utc::now());
        self.store.save_batch_job(&job)?;
        drop(running);
        tracing::error!(job_id = %job_id, reason, "Batch marked failed");
        Ok(())
    }

    pub fn batch_summary(&self, job_id: Uuid) -> Result<BatchSummary, BatchError> {
        let job = self.load_job(job_id)?;
        self.summary_for(&job)
    }

    fn summary_for(&self, job: &BatchJob) -> Result<BatchSummary, BatchError> {
        let mut documents = Vec::with_capacity(job.document_ids.len());
        for id in &job.document_ids {
            match self.store.load_document(id) {
                Ok(doc) => documents.push(DocumentSummary {
                    id: doc.id,
                    filename: doc.filename,
                    status: doc.status,
                    total_pages: doc.total_pages,
                    file_size: doc.file_size,
                }),
                Err(StorageError::NotFound { .. }) => {
                    tracing::warn!(job_id = %job.id, document_id = %id, "Batch document missing");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(BatchSummary {
            job_id: job.id,
            job_name: job.job_name.clone(),
            status: job.status,
            total_documents: job.total_documents,
            processed_count: job.processed_count,
            success_count: job.success_count,
            failure_count: job.failure_count,
            progress_percentage: job.progress_percentage(),
            progress_text: job.progress_text(),
            estimated_time_remaining_secs: job.estimated_time_remaining_secs(Utc::now()),
            started_at: job.started_at,
            completed_at: job.completed_at,
            documents,
        })
    }

    fn load_job(&self, job_id: Uuid) -> Result<BatchJob, BatchError> {
        self.store.load_batch_job(&job_id).map_err(|e| match e {
            StorageError::NotFound { .. } => BatchError::JobNotFound(job_id),
            other => other.into(),
        })
    }

    fn worker_count(&self, total: usize) -> usize {
        self.config.workers.clamp(1, total.max(1))
    }

    fn running_tokens(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, CancelToken>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}
