//! Fits long document text into a character budget.
//!
//! Reduction keeps the opening, the closing, and signal-bearing lines from
//! the middle. Text already within budget is returned unchanged.

use std::borrow::Cow;

use super::patterns::has_signal_shape;

pub const DOCUMENT_START_MARKER: &str = "=== DOCUMENT START ===\n";
pub const KEY_INFORMATION_MARKER: &str = "\n\n=== KEY INFORMATION ===\n";
pub const DOCUMENT_END_MARKER: &str = "\n\n=== DOCUMENT END ===\n";
pub const TRUNCATION_NOTICE: &str = "\n\n[Document truncated for fast analysis]";

/// Lines shorter than this (trimmed) never count as key lines.
const MIN_KEY_LINE_CHARS: usize = 10;
const MAX_KEY_LINES: usize = 200;

/// Budget shares in tenths: 30% head, 40% key lines, 30% tail.
const HEAD_TENTHS: usize = 3;
const KEY_TENTHS: usize = 4;
const TAIL_TENTHS: usize = 3;

/// Lowercase keywords marking a line as key information, grouped by kind.
const KEYWORDS: &[&str] = &[
    // financial
    "rs.", "inr", "₹", "rupees", "lakhs", "crores", "amount", "commitment", "contribution",
    "payment", "fee",
    // identity
    "pan", "name", "investor", "contributor",
    // dates
    "date", "dated", "day of", "executed",
    // terms
    "lock-in", "period", "management", "carried interest", "whereas", "witnesseth", "party",
    "agreement",
    // contact
    "email", "phone", "address",
];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`th char, clamped to the end.
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// True when a line is worth keeping from the middle of a document.
pub fn is_key_line(line: &str) -> bool {
    let trimmed = line.trim();
    if char_len(trimmed) < MIN_KEY_LINE_CHARS {
        return false;
    }
    let lower = trimmed.to_lowercase();
    KEYWORDS.iter().any(|k| lower.contains(k)) || has_signal_shape(trimmed)
}

/// Reduce `text` to roughly `budget` chars.
///
/// Output is `head + key lines + tail` with section markers. The head and
/// tail are verbatim; key lines are taken in order until one no longer fits
/// the key share or the line cap is hit.
pub fn reduce(text: &str, budget: usize) -> Cow<'_, str> {
    let total = char_len(text);
    if total <= budget {
        return Cow::Borrowed(text);
    }

    let head_chars = budget * HEAD_TENTHS / 10;
    let key_budget = budget * KEY_TENTHS / 10;
    let tail_chars = budget * TAIL_TENTHS / 10;

    let head_end = byte_offset(text, head_chars);
    let tail_start_char = total.saturating_sub(tail_chars).max(head_chars);
    let tail_start = byte_offset(text, tail_start_char);

    let head = &text[..head_end];
    let middle = &text[head_end..tail_start];
    let tail = &text[tail_start..];

    let mut key_section = String::new();
    let mut key_used = 0;
    let mut key_lines = 0;
    for line in middle.lines().map(str::trim).filter(|l| is_key_line(l)) {
        if key_lines >= MAX_KEY_LINES {
            break;
        }
        let len = char_len(line) + 1;
        if key_used + len > key_budget {
            break;
        }
        key_section.push_str(line);
        key_section.push('\n');
        key_used += len;
        key_lines += 1;
    }

    tracing::debug!(
        original_chars = total,
        budget,
        key_lines,
        "Reduced document text"
    );

    let mut out = String::with_capacity(head.len() + key_section.len() + tail.len() + 80);
    out.push_str(DOCUMENT_START_MARKER);
    out.push_str(head);
    out.push_str(KEY_INFORMATION_MARKER);
    out.push_str(&key_section);
    out.push_str(DOCUMENT_END_MARKER);
    out.push_str(tail);
    Cow::Owned(out)
}

/// Keep the first `max_chars` chars and append a truncation notice.
pub fn truncate(text: &str, max_chars: usize) -> Cow<'_, str> {
    if char_len(text) <= max_chars {
        return Cow::Borrowed(text);
    }
    let end = byte_offset(text, max_chars);
    Cow::Owned(format!("{}{TRUNCATION_NOTICE}", &text[..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_document() -> String {
        let mut text = String::from("OPENING RECITAL of the contribution agreement.\n");
        for i in 0..400 {
            text.push_str(&format!("Boilerplate clause number {i} without anything useful.\n"));
            if i == 200 {
                text.push_str("Contributor PAN: ABCDE1234F\n");
            }
        }
        text.push_str("CLOSING SIGNATURE BLOCK");
        text
    }

    #[test]
    fn within_budget_is_identity() {
        let text = "short document";
        let out = reduce(text, 100);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, text);
    }

    #[test]
    fn exactly_at_budget_is_identity() {
        let text = "x".repeat(50);
        assert_eq!(reduce(&text, 50), text.as_str());
    }

    #[test]
    fn reduction_keeps_head_tail_and_signal() {
        let text = long_document();
        let out = reduce(&text, 3_000);

        assert!(out.starts_with(DOCUMENT_START_MARKER));
        assert!(out.contains("OPENING RECITAL"));
        assert!(out.contains(KEY_INFORMATION_MARKER));
        assert!(out.contains("Contributor PAN: ABCDE1234F"));
        assert!(out.contains(DOCUMENT_END_MARKER));
        assert!(out.ends_with("CLOSING SIGNATURE BLOCK"));
        assert!(char_len(&out) < char_len(&text));
    }

    #[test]
    fn head_and_tail_survive_verbatim() {
        let inputs = [
            long_document(),
            "₹ commitment é line\n".repeat(700),
            "abcdefghij".repeat(1_000),
        ];
        for text in &inputs {
            let total = char_len(text);
            for budget in [100, 333, 1_000, 2_501] {
                assert!(total > budget);
                let out = reduce(text, budget);
                let k = budget * 3 / 10;
                let head: String = text.chars().take(k).collect();
                let tail: String = text.chars().skip(total - k).collect();

                let body = out.strip_prefix(DOCUMENT_START_MARKER).unwrap();
                assert!(body.starts_with(&head), "head lost at budget {budget}");
                assert!(out.ends_with(&tail), "tail lost at budget {budget}");
            }
        }
    }

    #[test]
    fn key_scan_stops_at_first_overflow() {
        let mut text = String::new();
        for i in 0..10 {
            text.push_str(&format!("Boilerplate clause number {i} without anything useful.\n"));
        }
        text.push_str(&format!("Management fee schedule {}\n", "x".repeat(600)));
        text.push_str("Contributor PAN: ABCDE1234F\n");
        for i in 10..60 {
            text.push_str(&format!("Boilerplate clause number {i} without anything useful.\n"));
        }

        let out = reduce(&text, 1_000);
        let key_start = out.find(KEY_INFORMATION_MARKER).unwrap() + KEY_INFORMATION_MARKER.len();
        let key_end = out.find(DOCUMENT_END_MARKER).unwrap();
        assert_eq!(&out[key_start..key_end], "");
    }

    #[test]
    fn key_section_respects_its_share() {
        let mut text = String::new();
        for i in 0..2_000 {
            text.push_str(&format!("Capital commitment line {i:05} for investor\n"));
        }
        let budget = 10_000;
        let out = reduce(&text, budget);
        let key_start = out.find(KEY_INFORMATION_MARKER).unwrap() + KEY_INFORMATION_MARKER.len();
        let key_end = out.find(DOCUMENT_END_MARKER).unwrap();
        let key_section = &out[key_start..key_end];
        assert!(char_len(key_section) <= budget * 2 / 5);
        assert!(key_section.lines().count() <= MAX_KEY_LINES);
    }

    #[test]
    fn multibyte_text_slices_on_char_boundaries() {
        let text = "₹ commitment é ".repeat(500);
        let out = reduce(&text, 333);
        assert!(out.contains(DOCUMENT_END_MARKER));
        let out = truncate(&text, 7);
        assert!(out.starts_with("₹ commi"));
    }

    #[test]
    fn key_line_rules() {
        assert!(is_key_line("Management fee is two percent"));
        assert!(is_key_line("Reference 88812 attached"));
        assert!(!is_key_line("fee 2%"));
        assert!(!is_key_line("An ordinary sentence with no markers."));
    }

    #[test]
    fn truncate_appends_notice() {
        let text = "a".repeat(20);
        let out = truncate(&text, 5);
        assert_eq!(out, format!("aaaaa{TRUNCATION_NOTICE}"));
        assert_eq!(truncate("abc", 5), "abc");
    }
}
