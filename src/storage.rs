//! Storage collaborator seam.
//!
//! The pipeline never embeds persistence. It loads and saves documents and
//! batch jobs through `DocumentStore` at each status checkpoint, and reads
//! source bytes through `DocumentSource`. `MemoryStore` backs the CLI and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{BatchJob, Document};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("Storage lock poisoned")]
    Lock,
}

/// Persistence operations the pipeline calls at defined checkpoints.
pub trait DocumentStore: Send + Sync {
    fn load_document(&self, id: &Uuid) -> Result<Document, StorageError>;
    fn save_document(&self, document: &Document) -> Result<(), StorageError>;
    fn load_batch_job(&self, id: &Uuid) -> Result<BatchJob, StorageError>;
    fn save_batch_job(&self, job: &BatchJob) -> Result<(), StorageError>;
}

/// Source of raw document bytes.
pub trait DocumentSource: Send + Sync {
    fn read(&self, document: &Document) -> std::io::Result<Vec<u8>>;
}

/// Reads the file at `Document::file_path`.
pub struct FileSource;

impl DocumentSource for FileSource {
    fn read(&self, document: &Document) -> std::io::Result<Vec<u8>> {
        std::fs::read(&document.file_path)
    }
}

/// In-memory store. State is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<Uuid, Document>>,
    jobs: Mutex<HashMap<Uuid, BatchJob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    fn load_document(&self, id: &Uuid) -> Result<Document, StorageError> {
        let documents = self.documents.lock().map_err(|_| StorageError::Lock)?;
        documents.get(id).cloned().ok_or(StorageError::NotFound {
            kind: "Document",
            id: *id,
        })
    }

    fn save_document(&self, document: &Document) -> Result<(), StorageError> {
        let mut documents = self.documents.lock().map_err(|_| StorageError::Lock)?;
        documents.insert(document.id, document.clone());
        Ok(())
    }

    fn load_batch_job(&self, id: &Uuid) -> Result<BatchJob, StorageError> {
        let jobs = self.jobs.lock().map_err(|_| StorageError::Lock)?;
        jobs.get(id).cloned().ok_or(StorageError::NotFound {
            kind: "BatchJob",
            id: *id,
        })
    }

    fn save_batch_job(&self, job: &BatchJob) -> Result<(), StorageError> {
        let mut jobs = self.jobs.lock().map_err(|_| StorageError::Lock)?;
        jobs.insert(job.id, job.clone());
        Ok(())
    }
}

/// Source serving fixed bytes per document id. Unknown ids yield `NotFound`.
#[derive(Default)]
pub struct MemorySource {
    files: Mutex<HashMap<Uuid, Vec<u8>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: Uuid, bytes: Vec<u8>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(id, bytes);
        }
    }
}

impl DocumentSource for MemorySource {
    fn read(&self, document: &Document) -> std::io::Result<Vec<u8>> {
        let files = self
            .files
            .lock()
            .map_err(|_| std::io::Error::other("source lock poisoned"))?;
        files.get(&document.id).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no bytes for document {}", document.id),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;

    #[test]
    fn memory_store_round_trips_document() {
        let store = MemoryStore::new();
        let mut doc = Document::new_upload("a.pdf", "/tmp/a.pdf", 10).unwrap();
        store.save_document(&doc).unwrap();

        doc.transition(DocumentStatus::Extracting).unwrap();
        store.save_document(&doc).unwrap();

        let loaded = store.load_document(&doc.id).unwrap();
        assert_eq!(loaded.status, DocumentStatus::Extracting);
        assert_eq!(store.document_count(), 1);
    }

    #[test]
    fn missing_job_is_not_found() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        match store.load_batch_job(&id) {
            Err(StorageError::NotFound { kind, id: missing }) => {
                assert_eq!(kind, "BatchJob");
                assert_eq!(missing, id);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn file_source_reads_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let doc = Document::new_upload("doc.pdf", &path, 8).unwrap();
        assert_eq!(FileSource.read(&doc).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn memory_source_unknown_id_errors() {
        let source = MemorySource::new();
        let doc = Document::new_upload("doc.pdf", "/nowhere/doc.pdf", 0).unwrap();
        let err = source.read(&doc).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
