//! Page rendering via Google PDFium for the OCR path.
//!
//! `PdfiumRenderer` is stateless (`Send + Sync`). Each operation binds a
//! fresh `Pdfium` instance because the upstream type is `!Send`; the OS
//! caches the library load, so repeat binds are cheap.

use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Maximum width or height of a rendered page image.
const MAX_DIMENSION_PX: u32 = 4096;

/// Rendering resolution for OCR input.
pub const DEFAULT_RENDER_DPI: u32 = 300;

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Environment variable naming an explicit PDFium library file.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_DYNAMIC_LIB_PATH";

pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Create a renderer, failing fast when the PDFium library cannot be bound.
    pub fn new() -> Result<Self, ExtractionError> {
        bind_pdfium().map(|_| Self)
    }
}

/// Directories searched for a bundled library, in order: next to the
/// executable, then its `lib/` subdirectory.
fn bundled_library_dirs(exe: Option<&Path>) -> Vec<PathBuf> {
    exe.and_then(Path::parent)
        .map(|dir| vec![dir.to_path_buf(), dir.join("lib")])
        .unwrap_or_default()
}

fn library_error(reason: String) -> ExtractionError {
    ExtractionError::PdfRendering { page: 0, reason }
}

/// Bind PDFium. An explicit `PDFIUM_DYNAMIC_LIB_PATH` must load; otherwise
/// bundled locations are tried before the system search path.
fn bind_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var(PDFIUM_LIB_ENV) {
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|e| library_error(format!("cannot load PDFium from {path}: {e}")))?;
        debug!(path = %path, "PDFium bound from {PDFIUM_LIB_ENV}");
        return Ok(Pdfium::new(bindings));
    }

    let exe = std::env::current_exe().ok();
    for dir in bundled_library_dirs(exe.as_deref()) {
        let candidate =
            Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&candidate) {
            debug!(dir = %dir.display(), "PDFium bound from bundled location");
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| {
            library_error(format!(
                "PDFium library not found; set {PDFIUM_LIB_ENV} or install PDFium: {e}"
            ))
        })
}

/// Open `pdf_bytes` and hand the document to `f`. Password and
/// encryption failures surface as `PdfEncrypted`.
fn with_document<T>(
    pdf_bytes: &[u8],
    f: impl FnOnce(&PdfDocument<'_>) -> Result<T, ExtractionError>,
) -> Result<T, ExtractionError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| {
            let message = e.to_string();
            let lower = message.to_lowercase();
            if lower.contains("password") || lower.contains("encrypt") {
                ExtractionError::PdfEncrypted
            } else {
                library_error(format!("cannot open PDF: {message}"))
            }
        })?;
    f(&document)
}

/// Pixel size for a page rendered at `dpi`, each side in `[1, MAX_DIMENSION_PX]`.
/// Oversized pages are scaled down uniformly.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let w = (width_points * scale).max(1.0);
    let h = (height_points * scale).max(1.0);

    let ratio = (MAX_DIMENSION_PX as f32 / w.max(h)).min(1.0);
    let fit = |side: f32| ((side * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
    (fit(w), fit(h))
}

fn encode_png(image: &image::DynamicImage, page_number: usize) -> Result<Vec<u8>, ExtractionError> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| {
            ExtractionError::ImageProcessing(format!("page {page_number}: PNG encoding failed: {e}"))
        })?;
    Ok(cursor.into_inner())
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        with_document(pdf_bytes, |document| Ok(document.pages().len() as usize))
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let page_number = page_index + 1;
        let render_error = |reason: String| ExtractionError::PdfRendering {
            page: page_number,
            reason,
        };

        with_document(pdf_bytes, |document| {
            let pages = document.pages();
            let page = u16::try_from(page_index)
                .ok()
                .and_then(|i| pages.get(i).ok())
                .ok_or_else(|| {
                    render_error(format!("no such page (document has {})", pages.len()))
                })?;

            let (width, height) =
                compute_render_dimensions(page.width().value, page.height().value, dpi);
            if width == MAX_DIMENSION_PX || height == MAX_DIMENSION_PX {
                warn!(page = page_number, width, height, "Render size capped");
            }

            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_maximum_height(height as i32);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| render_error(e.to_string()))?;

            let png = encode_png(&bitmap.as_image(), page_number)?;
            debug!(page = page_number, width, height, bytes = png.len(), "Page rendered");
            Ok(png)
        })
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock renderer returning a minimal PNG per page, without the PDFium binary.
pub struct MockPdfPageRenderer {
    page_count: usize,
    failing_pages: HashSet<usize>,
    unreadable: bool,
}

impl MockPdfPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            failing_pages: HashSet::new(),
            unreadable: false,
        }
    }

    /// Fail rendering for these 0-based page indices.
    pub fn with_failing_pages(mut self, indices: &[usize]) -> Self {
        self.failing_pages = indices.iter().copied().collect();
        self
    }

    /// Fail every call, as if the document could not be opened.
    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        if self.unreadable {
            return Err(ExtractionError::PdfEncrypted);
        }
        Ok(self.page_count)
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        if self.unreadable {
            return Err(ExtractionError::PdfEncrypted);
        }
        if page_index >= self.page_count || self.failing_pages.contains(&page_index) {
            return Err(ExtractionError::PdfRendering {
                page: page_index + 1,
                reason: format!("mock cannot render page index {page_index}"),
            });
        }
        Ok(minimal_png())
    }
}

/// Minimal valid 1x1 PNG.
pub(crate) fn minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1
        0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, // 8-bit RGB
        0xDE, // IHDR CRC
        0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, // IDAT chunk
        0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, // compressed
        0x00, 0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33, // IDAT CRC
        0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, // IEND chunk
        0xAE, 0x42, 0x60, 0x82, // IEND CRC
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_at_300dpi() {
        let (w, h) = compute_render_dimensions(595.0, 842.0, 300);
        assert!(w > 2400 && w < 2550, "A4 width at 300dpi: got {w}");
        assert!(h > 3450 && h < 3600, "A4 height at 300dpi: got {h}");
    }

    #[test]
    fn oversized_page_capped_with_aspect_ratio() {
        let (w, h) = compute_render_dimensions(5000.0, 10000.0, DEFAULT_RENDER_DPI);
        assert!(w <= MAX_DIMENSION_PX && h <= MAX_DIMENSION_PX);
        let ratio = h as f32 / w as f32;
        assert!((ratio - 2.0).abs() < 0.15, "Aspect ratio should be ~2:1, got {ratio}");
    }

    #[test]
    fn bundled_dirs_follow_executable() {
        let dirs = bundled_library_dirs(Some(Path::new("/opt/docreader/bin/docreader")));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/opt/docreader/bin"),
                PathBuf::from("/opt/docreader/bin/lib")
            ]
        );
        assert!(bundled_library_dirs(None).is_empty());
    }

    #[test]
    fn zero_points_clamped_to_1() {
        let (w, h) = compute_render_dimensions(0.0, 0.0, DEFAULT_RENDER_DPI);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn mock_renders_png_for_each_page() {
        let mock = MockPdfPageRenderer::new(3);
        for i in 0..3 {
            let png = mock.render_page(&[], i, DEFAULT_RENDER_DPI).unwrap();
            assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
        }
        assert!(mock.render_page(&[], 3, DEFAULT_RENDER_DPI).is_err());
    }

    #[test]
    fn mock_failing_page_reports_1_based_number() {
        let mock = MockPdfPageRenderer::new(3).with_failing_pages(&[1]);
        let err = mock.render_page(&[], 1, DEFAULT_RENDER_DPI).unwrap_err();
        assert!(matches!(err, ExtractionError::PdfRendering { page: 2, .. }));
        assert!(mock.render_page(&[], 2, DEFAULT_RENDER_DPI).is_ok());
    }

    #[test]
    fn unreadable_mock_fails_page_count() {
        let mock = MockPdfPageRenderer::new(3).unreadable();
        assert!(matches!(mock.page_count(&[]), Err(ExtractionError::PdfEncrypted)));
    }
}
