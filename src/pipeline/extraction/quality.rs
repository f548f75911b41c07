//! Extraction quality scoring from per-page character counts.
//!
//! The verdict is a pure function of the counts: the same pages always
//! produce the same verdict.

use super::types::{PageInfo, QualityLevel, QualityVerdict};

/// Pages with fewer trimmed characters than this are "low text".
pub const MIN_TEXT_PER_PAGE: usize = 50;

/// Share of low-text pages at which a document is treated as image-based.
pub const IMAGE_PDF_THRESHOLD: f64 = 0.7;

/// Build the `PageInfo` for one page of native text.
pub fn page_info(number: usize, text: &str) -> PageInfo {
    let char_count = text.trim().chars().count();
    PageInfo {
        number,
        char_count,
        low_text: char_count < MIN_TEXT_PER_PAGE,
    }
}

/// Score a document from its page statistics.
///
/// `Low` when at least 70% of pages are low-text, else `Medium` when the
/// average is under the per-page minimum, else `High`.
pub fn analyze_quality(pages: &[PageInfo]) -> QualityVerdict {
    if pages.is_empty() {
        return QualityVerdict {
            level: QualityLevel::Low,
            reason: "Document has no pages".to_string(),
        };
    }

    let total_pages = pages.len();
    let low_pages = pages.iter().filter(|p| p.low_text).count();
    let total_chars: usize = pages.iter().map(|p| p.char_count).sum();

    let low_text_ratio = low_pages as f64 / total_pages as f64;
    let avg_chars = total_chars / total_pages;

    if low_text_ratio >= IMAGE_PDF_THRESHOLD {
        QualityVerdict {
            level: QualityLevel::Low,
            reason: format!(
                "Image-based PDF detected ({:.0}% pages with minimal text)",
                low_text_ratio * 100.0
            ),
        }
    } else if avg_chars < MIN_TEXT_PER_PAGE {
        QualityVerdict {
            level: QualityLevel::Medium,
            reason: format!("Low text density (avg {avg_chars} chars/page)"),
        }
    } else {
        QualityVerdict {
            level: QualityLevel::High,
            reason: format!("Good text extraction (avg {avg_chars} chars/page)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(counts: &[usize]) -> Vec<PageInfo> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &c)| PageInfo {
                number: i + 1,
                char_count: c,
                low_text: c < MIN_TEXT_PER_PAGE,
            })
            .collect()
    }

    #[test]
    fn all_pages_sparse_is_low() {
        let verdict = analyze_quality(&pages(&[0, 12, 49]));
        assert_eq!(verdict.level, QualityLevel::Low);
        assert_eq!(
            verdict.reason,
            "Image-based PDF detected (100% pages with minimal text)"
        );
    }

    #[test]
    fn all_pages_dense_is_high() {
        let verdict = analyze_quality(&pages(&[200, 450, 1200]));
        assert_eq!(verdict.level, QualityLevel::High);
        assert!(verdict.reason.starts_with("Good text extraction"));
    }

    #[test]
    fn seventy_percent_boundary_is_low() {
        // 7 of 10 low pages hits the threshold exactly
        let verdict = analyze_quality(&pages(&[0, 0, 0, 0, 0, 0, 0, 900, 900, 900]));
        assert_eq!(verdict.level, QualityLevel::Low);
    }

    #[test]
    fn mostly_dense_but_thin_average_is_medium() {
        // 1 of 3 low, average (60+60+0)/3 = 40
        let verdict = analyze_quality(&pages(&[60, 60, 0]));
        assert_eq!(verdict.level, QualityLevel::Medium);
        assert_eq!(verdict.reason, "Low text density (avg 40 chars/page)");
    }

    #[test]
    fn verdict_is_pure_function_of_counts() {
        let p = pages(&[10, 300, 75, 0]);
        assert_eq!(analyze_quality(&p), analyze_quality(&p));
        assert_eq!(analyze_quality(&p), analyze_quality(&p.clone()));
    }

    #[test]
    fn no_pages_is_low() {
        assert_eq!(analyze_quality(&[]).level, QualityLevel::Low);
    }

    #[test]
    fn page_info_counts_trimmed_chars() {
        let info = page_info(2, "   Agreement  \n\n");
        assert_eq!(info.number, 2);
        assert_eq!(info.char_count, "Agreement".len());
        assert!(info.low_text);

        let dense = page_info(1, &"x".repeat(MIN_TEXT_PER_PAGE));
        assert!(!dense.low_text);
    }

    #[test]
    fn page_info_counts_chars_not_bytes() {
        let info = page_info(1, "₹₹₹");
        assert_eq!(info.char_count, 3);
    }
}
