//! OCR backend: page rendering + text recognition, isolated per page.
//!
//! Availability is decided once at startup by locating a recognition data
//! directory. When none is found the backend reports unavailable and the
//! engine never attempts OCR.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::pdfium::DEFAULT_RENDER_DPI;
use super::quality::page_info;
use super::types::{PageInfo, PdfPageRenderer};
use super::ExtractionError;
use crate::config::OcrSettings;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("Recognition failed: {0}")]
    Recognition(String),

    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recognizes text in a single rendered page image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, page_image: &[u8]) -> Result<String, OcrError>;
}

/// Candidate recognition data directories, probed in order after `TESSDATA_PREFIX`.
pub const TESSDATA_CANDIDATES: &[&str] = &[
    "/opt/homebrew/share/tessdata",
    "/usr/local/share/tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tesseract-ocr/tessdata",
    "/usr/share/tessdata",
];

/// Find the first directory holding `<lang>.traineddata`.
///
/// `override_dir` is checked before `candidates`. For a multi-language spec
/// such as `eng+hin`, the first language must be present.
pub fn locate_tessdata<P: AsRef<Path>>(
    override_dir: Option<&Path>,
    candidates: &[P],
    language: &str,
) -> Option<PathBuf> {
    let primary = language.split('+').next().unwrap_or("eng");
    let file = format!("{primary}.traineddata");

    override_dir
        .into_iter()
        .map(Path::to_path_buf)
        .chain(candidates.iter().map(|c| c.as_ref().to_path_buf()))
        .find(|dir| dir.join(&file).is_file())
}

/// Outcome of the startup OCR probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrAvailability {
    Available { tessdata_dir: PathBuf },
    Unavailable,
}

impl OcrAvailability {
    /// Probe the system candidate list once.
    pub fn probe(settings: &OcrSettings) -> Self {
        match locate_tessdata(
            settings.tessdata_override.as_deref(),
            TESSDATA_CANDIDATES,
            &settings.language,
        ) {
            Some(dir) => {
                tracing::info!(tessdata = %dir.display(), lang = %settings.language, "OCR available");
                Self::Available { tessdata_dir: dir }
            }
            None => {
                tracing::warn!(
                    lang = %settings.language,
                    "No recognition data directory found; OCR disabled"
                );
                Self::Unavailable
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tesseract CLI engine
// ──────────────────────────────────────────────

/// Runs the `tesseract` binary on a temporary PNG.
pub struct TesseractEngine {
    tessdata_dir: PathBuf,
    language: String,
}

impl TesseractEngine {
    pub fn new(tessdata_dir: &Path, language: &str) -> Self {
        Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            language: language.to_string(),
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, page_image: &[u8]) -> Result<String, OcrError> {
        let mut image_file = tempfile::Builder::new()
            .prefix("docreader-page-")
            .suffix(".png")
            .tempfile()?;
        image_file.write_all(page_image)?;
        image_file.flush()?;

        // psm 1: automatic page segmentation with orientation detection
        // oem 1: LSTM engine only
        let output = Command::new("tesseract")
            .arg(image_file.path())
            .arg("stdout")
            .args(["-l", &self.language, "--psm", "1", "--oem", "1"])
            .env("TESSDATA_PREFIX", &self.tessdata_dir)
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(clean_ocr_text(&String::from_utf8_lossy(&output.stdout)))
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(OcrError::Recognition(format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    stderr.trim()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::Unavailable(
                "tesseract not found (install tesseract-ocr)".to_string(),
            )),
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

static CRLF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n?").unwrap());
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {3,}").unwrap());

/// Normalize raw OCR output: unix newlines, at most one blank line, no long space runs.
pub fn clean_ocr_text(raw: &str) -> String {
    let text = CRLF.replace_all(raw, "\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    let text = SPACE_RUNS.replace_all(&text, " ");
    text.trim().to_string()
}

// ──────────────────────────────────────────────
// Page-isolated OCR over a document
// ──────────────────────────────────────────────

/// One page produced by the OCR path.
#[derive(Debug, Clone)]
pub struct OcrPage {
    pub info: PageInfo,
    pub text: String,
    /// Set when this page's render or recognition failed.
    pub failure: Option<String>,
}

/// Renderer + optional engine. `engine` is `None` when the probe found no data.
pub struct OcrBackend {
    renderer: Box<dyn PdfPageRenderer>,
    engine: Option<Box<dyn OcrEngine>>,
    dpi: u32,
}

impl OcrBackend {
    pub fn new(renderer: Box<dyn PdfPageRenderer>, engine: Option<Box<dyn OcrEngine>>) -> Self {
        Self {
            renderer,
            engine,
            dpi: DEFAULT_RENDER_DPI,
        }
    }

    /// Backend with OCR switched off.
    pub fn disabled(renderer: Box<dyn PdfPageRenderer>) -> Self {
        Self::new(renderer, None)
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    /// OCR every page. Errors only when the document itself cannot be opened;
    /// per-page failures become placeholder pages.
    pub fn ocr_document(&self, pdf_bytes: &[u8]) -> Result<Vec<OcrPage>, ExtractionError> {
        let engine = self.engine.as_ref().ok_or_else(|| {
            OcrError::Unavailable("no recognition data directory".to_string())
        })?;

        let page_count = self.renderer.page_count(pdf_bytes)?;
        let mut pages = Vec::with_capacity(page_count);

        for index in 0..page_count {
            let number = index + 1;
            let recognized = self
                .renderer
                .render_page(pdf_bytes, index, self.dpi)
                .and_then(|png| engine.recognize(&png).map_err(ExtractionError::from));

            match recognized {
                Ok(text) => {
                    tracing::debug!(page = number, chars = text.len(), "OCR page complete");
                    pages.push(OcrPage {
                        info: page_info(number, &text),
                        text,
                        failure: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(page = number, error = %e, "OCR failed for page");
                    pages.push(OcrPage {
                        info: PageInfo {
                            number,
                            char_count: 0,
                            low_text: true,
                        },
                        text: format!("[OCR failed for page {number}]"),
                        failure: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(pages)
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock OCR engine. Returns `page_texts[call]` when configured, else `text`,
/// and fails on the listed 0-based call indices.
pub struct MockOcrEngine {
    text: String,
    page_texts: Vec<String>,
    failing_calls: Vec<usize>,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            page_texts: Vec::new(),
            failing_calls: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page_texts<S: AsRef<str>>(mut self, texts: &[S]) -> Self {
        self.page_texts = texts.iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    pub fn failing_on_calls(mut self, calls: &[usize]) -> Self {
        self.failing_calls = calls.to_vec();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, _page_image: &[u8]) -> Result<String, OcrError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_calls.contains(&call) {
            return Err(OcrError::Recognition(format!("mock failure on call {call}")));
        }
        Ok(self
            .page_texts
            .get(call)
            .cloned()
            .unwrap_or_else(|| self.text.clone()))
    }
}
