//! Per-document pipeline: read, extract, optionally analyze, persist at
//! each status checkpoint.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::models::{Document, DocumentStatus, ModelError};
use crate::pipeline::extraction::{ExtractionEngine, ExtractionError, QualityLevel};
use crate::pipeline::routing::{DocumentAnalyzer, RouteError};
use crate::storage::{DocumentSource, DocumentStore, StorageError};

pub const EXTRACTION_INFO_MARKER: &str = "\n\n=== EXTRACTION INFO ===\n\n";

#[derive(Error, Debug)]
enum StageError {
    #[error("Extraction failed: could not read file: {0}")]
    Read(std::io::Error),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Extraction failed: extractor panicked (malformed PDF): {0}")]
    ExtractionPanic(String),

    #[error("{}", .0.user_message())]
    Analysis(#[from] RouteError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    State(#[from] ModelError),
}

/// Collaborators the pipeline needs for one document.
pub struct DocumentTask<'a> {
    store: &'a dyn DocumentStore,
    source: &'a dyn DocumentSource,
    engine: &'a ExtractionEngine,
    analyzer: Option<&'a DocumentAnalyzer>,
}

impl<'a> DocumentTask<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        source: &'a dyn DocumentSource,
        engine: &'a ExtractionEngine,
        analyzer: Option<&'a DocumentAnalyzer>,
    ) -> Self {
        Self {
            store,
            source,
            engine,
            analyzer,
        }
    }

    /// Run the pipeline over `document`. Returns `true` when the document
    /// ends `Ready` or `Analyzed`, `false` when it ends `Failed`.
    ///
    /// Analysis runs only when `template` is given and an analyzer is wired.
    pub fn run(&self, document: &mut Document, template: Option<&str>) -> bool {
        match self.try_run(document, template) {
            Ok(()) => {
                tracing::info!(
                    document_id = %document.id,
                    status = %document.status,
                    "Document processed"
                );
                true
            }
            Err(e) => {
                tracing::error!(document_id = %document.id, error = %e, "Document failed");
                document.fail(e.to_string());
                if let Err(save_err) = self.store.save_document(document) {
                    tracing::error!(
                        document_id = %document.id,
                        error = %save_err,
                        "Could not persist failed document"
                    );
                }
                false
            }
        }
    }

    fn try_run(&self, document: &mut Document, template: Option<&str>) -> Result<(), StageError> {
        let bytes = self.source.read(document).map_err(StageError::Read)?;

        document.transition(DocumentStatus::Extracting)?;
        self.store.save_document(document)?;

        // pdf-extract can panic on malformed input; contain it to this document.
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.engine.extract(&bytes)))
            .map_err(|payload| StageError::ExtractionPanic(panic_message(payload.as_ref())))??;
        let image_based = result.used_ocr || result.verdict.level == QualityLevel::Low;

        document.extracted_text = Some(format!(
            "{}{EXTRACTION_INFO_MARKER}{}",
            result.text,
            result.summary()
        ));
        document.total_pages = Some(result.page_count());
        document.transition(DocumentStatus::Ready)?;
        self.store.save_document(document)?;

        let (Some(template), Some(analyzer)) = (template, self.analyzer) else {
            return Ok(());
        };

        document.transition(DocumentStatus::Analyzing)?;
        self.store.save_document(document)?;

        let analysis = analyzer.analyze(&result.text, template, image_based)?;
        document.analysis = Some(analysis);
        document.transition(DocumentStatus::Analyzed)?;
        self.store.save_document(document)?;
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
