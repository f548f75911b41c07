use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DocumentStatus;
use super::ModelError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub batch_job_id: Option<Uuid>,
    pub filename: String,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub status: DocumentStatus,
    pub extracted_text: Option<String>,
    pub total_pages: Option<usize>,
    /// Last analysis output, or the diagnostic string when the pipeline failed.
    pub analysis: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Construct the initial `Uploaded` document for a stored file.
    ///
    /// Rejects anything without a `.pdf` extension (case-insensitive).
    pub fn new_upload(
        filename: &str,
        file_path: impl Into<PathBuf>,
        file_size: u64,
    ) -> Result<Self, ModelError> {
        if !is_pdf_filename(filename) {
            return Err(ModelError::UnsupportedFileType(filename.to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            batch_job_id: None,
            filename: filename.to_string(),
            file_path: file_path.into(),
            file_size,
            status: DocumentStatus::Uploaded,
            extracted_text: None,
            total_pages: None,
            analysis: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_batch(mut self, batch_job_id: Uuid) -> Self {
        self.batch_job_id = Some(batch_job_id);
        self
    }

    /// Apply a pipeline status transition and bump `updated_at`.
    pub fn transition(&mut self, status: DocumentStatus) -> Result<(), ModelError> {
        if !self.status.can_transition_to(status) {
            return Err(ModelError::InvalidTransition {
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark failed with `message` as the visible output. Allowed from any state.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.analysis = Some(message.into());
        self.status = DocumentStatus::Failed;
        self.updated_at = Utc::now();
    }
}

/// True when `filename` ends in `.pdf`, ignoring case.
pub fn is_pdf_filename(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
