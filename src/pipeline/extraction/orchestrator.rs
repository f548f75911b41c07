//! Adaptive extraction: native text first, OCR only for image-based documents.
//!
//! 1. Native pages → per-page stats → quality verdict.
//! 2. `High`/`Medium` → native result. OCR never runs.
//! 3. `Low` → OCR every page (isolated per page) when available; otherwise
//!    the native result with a warning.
//! 4. Tables from the native layer are appended under their own marker.

use std::time::Instant;

use tracing::{info, warn};

use super::ocr::{OcrAvailability, OcrBackend, OcrEngine, TesseractEngine};
use super::pdf::PdfTextExtractor;
use super::pdfium::PdfiumRenderer;
use super::quality::{analyze_quality, page_info};
use super::table_detect::{flatten_tables, TableExtractor};
use super::types::{ExtractionResult, PageInfo, PdfExtractor, QualityLevel};
use super::ExtractionError;
use crate::config::OcrSettings;

/// Native text shorter than this (trimmed) is not kept as an OCR preface.
const NATIVE_PREFACE_MIN_CHARS: usize = 100;

pub const NATIVE_SECTION_MARKER: &str = "=== NATIVE TEXT (HEADERS/FOOTERS) ===\n\n";
pub const OCR_SECTION_MARKER: &str = "\n\n=== OCR TEXT (MAIN CONTENT) ===\n\n";
pub const TABLES_SECTION_MARKER: &str = "\n\n=== EXTRACTED TABLES ===\n\n";

pub const OCR_UNAVAILABLE_WARNING: &str =
    "Document may be image-based; OCR unavailable (no recognition data directory found)";

/// Marker appended after each page's text.
pub fn page_end_marker(number: usize) -> String {
    format!("\n\n=== END OF PAGE {number} ===\n\n")
}

fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::new();
    for (i, page) in pages.iter().enumerate() {
        text.push_str(page.as_ref());
        text.push_str(&page_end_marker(i + 1));
    }
    text
}

pub struct ExtractionEngine {
    pdf: Box<dyn PdfExtractor>,
    ocr: OcrBackend,
    tables: TableExtractor,
}

impl ExtractionEngine {
    pub fn new(pdf: Box<dyn PdfExtractor>, ocr: OcrBackend) -> Self {
        Self {
            pdf,
            ocr,
            tables: TableExtractor::new(),
        }
    }

    /// Production wiring: pdf-extract for native text, PDFium + tesseract for OCR.
    ///
    /// OCR is enabled only when a recognition data directory is found and the
    /// PDFium library binds.
    pub fn from_settings(settings: &OcrSettings) -> Self {
        let engine: Option<Box<dyn OcrEngine>> = match OcrAvailability::probe(settings) {
            OcrAvailability::Available { tessdata_dir } => match PdfiumRenderer::new() {
                Ok(_) => Some(Box::new(TesseractEngine::new(&tessdata_dir, &settings.language))
                    as Box<dyn OcrEngine>),
                Err(e) => {
                    warn!(error = %e, "PDFium unavailable; OCR disabled");
                    None
                }
            },
            OcrAvailability::Unavailable => None,
        };

        let ocr = OcrBackend::new(Box::new(PdfiumRenderer), engine).with_dpi(settings.render_dpi);
        Self::new(Box::new(PdfTextExtractor), ocr)
    }

    pub fn ocr_available(&self) -> bool {
        self.ocr.is_available()
    }

    /// Extract one document. Fails only when the bytes are not a parseable PDF.
    pub fn extract(&self, pdf_bytes: &[u8]) -> Result<ExtractionResult, ExtractionError> {
        let start = Instant::now();

        let native_pages = self.pdf.extract_pages(pdf_bytes)?;
        let pages: Vec<PageInfo> = native_pages
            .iter()
            .enumerate()
            .map(|(i, text)| page_info(i + 1, text))
            .collect();
        let verdict = analyze_quality(&pages);

        info!(
            pages = pages.len(),
            level = ?verdict.level,
            reason = %verdict.reason,
            "Native extraction scored"
        );

        let native_chars: usize = pages.iter().map(|p| p.char_count).sum();
        let native_text = join_pages(&native_pages);
        let mut warnings = Vec::new();
        let mut notes = Vec::new();

        let (mut text, final_pages, used_ocr) = match verdict.level {
            QualityLevel::High | QualityLevel::Medium => (native_text, pages, false),
            QualityLevel::Low if !self.ocr.is_available() => {
                warn!("Poor text quality but OCR not available");
                warnings.push(OCR_UNAVAILABLE_WARNING.to_string());
                (native_text, pages, false)
            }
            QualityLevel::Low => {
                info!("Switching to OCR extraction (image-based PDF detected)");
                let ocr_start = Instant::now();
                match self.ocr.ocr_document(pdf_bytes) {
                    Ok(ocr_pages) => {
                        let mut merged = String::new();
                        if native_chars > NATIVE_PREFACE_MIN_CHARS {
                            merged.push_str(NATIVE_SECTION_MARKER);
                            merged.push_str(&native_text);
                            merged.push_str(OCR_SECTION_MARKER);
                        }
                        let mut infos = Vec::with_capacity(ocr_pages.len());
                        for page in ocr_pages {
                            merged.push_str(&page.text);
                            merged.push_str(&page_end_marker(page.info.number));
                            if page.failure.is_some() {
                                warnings.push(format!("OCR failed for page {}", page.info.number));
                            }
                            infos.push(page.info);
                        }
                        let secs = ocr_start.elapsed().as_secs();
                        info!(seconds = secs, pages = infos.len(), "OCR extraction completed");
                        notes.push(format!("OCR processing took {secs} seconds"));
                        (merged, infos, true)
                    }
                    Err(e) => {
                        warn!(error = %e, "OCR extraction failed; keeping native text");
                        warnings.push(format!("OCR extraction failed: {e}"));
                        (native_text, pages, false)
                    }
                }
            }
        };

        let tables = self.tables.extract_document(&native_pages);
        if !tables.is_empty() {
            info!(tables = tables.len(), "Extracted tables");
            text.push_str(TABLES_SECTION_MARKER);
            text.push_str(&flatten_tables(&tables));
            notes.push(format!("Extracted {} tables", tables.len()));
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            elapsed_ms = processing_time_ms,
            used_ocr,
            chars = text.len(),
            "Extraction completed"
        );

        Ok(ExtractionResult {
            text,
            pages: final_pages,
            processing_time_ms,
            used_ocr,
            verdict,
            warnings,
            info: notes,
        })
    }
}
