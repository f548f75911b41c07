pub mod types;
pub mod quality;
pub mod pdf;
pub mod pdfium;
pub mod ocr;
pub mod table_detect;
pub mod orchestrator;

pub use types::*;
pub use quality::*;
pub use pdf::*;
pub use ocr::{OcrAvailability, OcrBackend, OcrEngine, OcrError, TesseractEngine};
pub use table_detect::{flatten_tables, Table, TableExtractor};
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF rendering failed for page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("PDF is password-protected or encrypted")]
    PdfEncrypted,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),
}
