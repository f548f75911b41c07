use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Per-page statistics recorded during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number.
    pub number: usize,
    pub char_count: usize,
    pub low_text: bool,
}

/// Coarse trust level of the native text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    High,
    Medium,
    Low,
}

/// Quality level plus the reason shown to users. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub level: QualityLevel,
    pub reason: String,
}

/// Result of extracting one document. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub pages: Vec<PageInfo>,
    pub processing_time_ms: u64,
    pub used_ocr: bool,
    /// Verdict on the native text layer that drove the OCR decision.
    pub verdict: QualityVerdict,
    pub warnings: Vec<String>,
    pub info: Vec<String>,
}

impl ExtractionResult {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn method(&self) -> &'static str {
        if self.used_ocr {
            "OCR"
        } else {
            "Native text"
        }
    }

    /// Human-readable extraction report.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Extraction completed in {}ms\n",
            self.processing_time_ms
        ));
        out.push_str(&format!("Method: {}\n", self.method()));
        out.push_str(&format!("Pages: {}\n", self.pages.len()));
        out.push_str(&format!(
            "Total characters: {}\n",
            self.text.chars().count()
        ));
        out.push_str(&format!("Quality: {}\n", self.verdict.reason));

        if !self.warnings.is_empty() {
            out.push_str("\nWarnings:\n");
            for w in &self.warnings {
                out.push_str(&format!("- {w}\n"));
            }
        }
        if !self.info.is_empty() {
            out.push_str("\nInfo:\n");
            for i in &self.info {
                out.push_str(&format!("- {i}\n"));
            }
        }
        out
    }
}

/// Native text-layer extraction, one string per page.
pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Renders single PDF pages to PNG for OCR.
pub trait PdfPageRenderer: Send + Sync {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    /// Render the page at 0-based `page_index`.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}
