use super::types::PdfExtractor;
use super::ExtractionError;

/// Native text-layer extractor using the pdf-extract crate.
/// Pages without a text layer come back as empty strings.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        // pdf-extract can panic on malformed PDFs.
        std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(pdf_bytes))
            .map_err(|_| ExtractionError::PdfParsing("parser panicked (malformed PDF)".into()))?
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))
    }
}

/// Extractor returning fixed page texts, for tests that bypass PDF parsing.
pub struct MockPdfExtractor {
    pages: Vec<String>,
}

impl MockPdfExtractor {
    pub fn new<S: AsRef<str>>(pages: &[S]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.as_ref().to_string()).collect(),
        }
    }
}

impl PdfExtractor for MockPdfExtractor {
    fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        Ok(self.pages.clone())
    }
}

#[cfg(test)]
pub(crate) mod test_pdf {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    /// Build a PDF with one page per entry; each line of an entry becomes a text line.
    /// An empty entry produces a page with no text layer.
    pub fn make_test_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for text in pages {
            let mut content = String::from("BT /F1 10 Tf 50 750 Td 12 TL ");
            for line in text.lines() {
                let escaped = line
                    .replace('\\', "\\\\")
                    .replace('(', "\\(")
                    .replace(')', "\\)");
                content.push_str(&format!("({escaped}) Tj T* "));
            }
            content.push_str("ET");

            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// A line of roughly `len` readable characters.
    pub fn dense_line(seed: &str, len: usize) -> String {
        let mut line = String::new();
        while line.len() < len {
            line.push_str(seed);
            line.push(' ');
        }
        line
    }
}
