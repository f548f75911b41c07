pub mod batch_job;
pub mod document;
pub mod enums;

pub use batch_job::*;
pub use document::*;
pub use enums::*;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Only PDF files are supported: {0}")]
    UnsupportedFileType(String),

    #[error("Batch must contain at least one document")]
    EmptyBatch,

    #[error("Batch has {count} documents, maximum is {max}")]
    TooManyDocuments { count: usize, max: usize },

    #[error("Document cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}
