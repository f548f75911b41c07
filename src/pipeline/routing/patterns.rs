//! Regex field library for fund-agreement style documents.
//!
//! Pure functions over text. Each field has an ordered pattern list; the
//! first pattern that matches wins. The summarizer reuses the signal
//! patterns to decide which mid-document lines to keep.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Z]{5}[0-9]{4}[A-Z])\b").unwrap());

static PAN_SPACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{5})\s*([0-9]{4})\s*([A-Z])\b").unwrap());

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i:name)[ \t]*:?[ \t]*([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)+)",
        r"(?:Mr|Ms|Mrs)\.[ \t]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){1,3})",
        r"(?i:investor)[: \t]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static AMOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(?:capital\s+commitment|commitment\s+amount|investment\s+amount)\s*:?\s*(?:Rs\.?|INR|₹)\s*[0-9,]+(?:\.[0-9]{2})?",
        r"(?i)(?:Rs\.?|INR|₹)\s*[0-9,]+\s*(?:crores?|lakhs?|lacs?|million)",
        r"(?i)amount\s+of\s+(?:Rs\.?|INR|₹)\s*[0-9,]+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static DATE_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-3]?[0-9][/-][0-1]?[0-9][/-]20[0-9]{2}\b").unwrap());

static DATE_LONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b[0-3]?[0-9]\s+(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+20[0-9]{2}\b",
    )
    .unwrap()
});

static LOCK_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)lock[- ]?in\s+period\s*:?\s*(?:of\s+)?([0-9]+)\s*(year|month)").unwrap()
});

static MANAGEMENT_FEE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)management\s+fee\s*:?\s*(?:of\s+)?([0-9.]+)\s*%").unwrap());

static CARRIED_INTEREST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)carried\s+interest\s*:?\s*(?:of\s+)?([0-9.]+)\s*%").unwrap());

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\+91[ -]?)?\b[6-9][0-9]{9}\b").unwrap());

static LONG_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{4,}").unwrap());

/// Shapes that mark a line as signal-bearing regardless of keywords.
static SIGNAL_PATTERNS: LazyLock<Vec<&'static Regex>> = LazyLock::new(|| {
    vec![&*PAN, &*DATE_NUMERIC, &*DATE_LONG, &*LONG_DIGITS, &*EMAIL]
});

/// True when `line` contains a PAN, date, long digit run, or email shape.
pub fn has_signal_shape(line: &str) -> bool {
    SIGNAL_PATTERNS.iter().any(|re| re.is_match(line))
}

pub fn extract_pan(text: &str) -> Option<String> {
    find_pan(text).map(|(pan, _)| pan)
}

/// PAN plus its confidence: a contiguous token scores higher than one
/// reassembled from spaced parts.
fn find_pan(text: &str) -> Option<(String, u32)> {
    if let Some(c) = PAN.captures(text) {
        return Some((c[1].to_string(), EXACT_PAN_CONFIDENCE));
    }
    PAN_SPACED
        .captures(text)
        .map(|c| (format!("{}{}{}", &c[1], &c[2], &c[3]), SPACED_PAN_CONFIDENCE))
}

pub fn extract_name(text: &str) -> Option<String> {
    NAME_PATTERNS
        .iter()
        .find_map(|re| re.captures(text))
        .map(|c| c[1].trim().to_string())
}

pub fn extract_capital_commitment(text: &str) -> Option<String> {
    AMOUNT_PATTERNS
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().trim().to_string())
}

/// All dates in document order, numeric forms first.
pub fn extract_dates(text: &str) -> Vec<String> {
    DATE_NUMERIC
        .find_iter(text)
        .chain(DATE_LONG.find_iter(text))
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn extract_lock_in_period(text: &str) -> Option<String> {
    LOCK_IN
        .captures(text)
        .map(|c| format!("{} {}(s)", &c[1], c[2].to_lowercase()))
}

pub fn extract_management_fee(text: &str) -> Option<String> {
    MANAGEMENT_FEE.captures(text).map(|c| format!("{}%", &c[1]))
}

pub fn extract_carried_interest(text: &str) -> Option<String> {
    CARRIED_INTEREST.captures(text).map(|c| format!("{}%", &c[1]))
}

pub fn extract_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|m| m.as_str().to_string())
}

pub fn extract_phone(text: &str) -> Option<String> {
    PHONE.find(text).map(|m| m.as_str().to_string())
}

/// Fields found by the pattern pass, with per-field confidence (0-100).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredFields {
    pub contributor_name: Option<String>,
    pub pan_number: Option<String>,
    pub capital_commitment: Option<String>,
    pub lock_in_period: Option<String>,
    pub management_fee: Option<String>,
    pub carried_interest: Option<String>,
    pub agreement_dates: Vec<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub pan_confidence: u32,
    pub amount_confidence: u32,
}

const EXACT_PAN_CONFIDENCE: u32 = 100;
const SPACED_PAN_CONFIDENCE: u32 = 50;
const NAME_CONFIDENCE: u32 = 80;
const TERM_CONFIDENCE: u32 = 75;

/// Run every field pattern over `text` and score the results.
pub fn extract_fields(text: &str) -> StructuredFields {
    let (pan_number, pan_confidence) = match find_pan(text) {
        Some((pan, confidence)) => (Some(pan), confidence),
        None => (None, 0),
    };
    let capital_commitment = extract_capital_commitment(text);

    let amount_confidence = match capital_commitment.as_deref() {
        Some(a) if a.contains("Rs") || a.contains("INR") || a.contains('₹') => 90,
        Some(_) => 70,
        None => 0,
    };

    StructuredFields {
        contributor_name: extract_name(text),
        pan_number,
        capital_commitment,
        lock_in_period: extract_lock_in_period(text),
        management_fee: extract_management_fee(text),
        carried_interest: extract_carried_interest(text),
        agreement_dates: extract_dates(text),
        email: extract_email(text),
        phone: extract_phone(text),
        pan_confidence,
        amount_confidence,
    }
}

impl StructuredFields {
    /// Core fields the pattern pass did not find.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.contributor_name.is_none() {
            missing.push("Contributor Name");
        }
        if self.pan_number.is_none() {
            missing.push("PAN Number");
        }
        if self.capital_commitment.is_none() {
            missing.push("Capital Commitment");
        }
        if self.lock_in_period.is_none() {
            missing.push("Lock-in Period");
        }
        if self.management_fee.is_none() {
            missing.push("Management Fee");
        }
        if self.carried_interest.is_none() {
            missing.push("Carried Interest");
        }
        missing
    }

    /// Mean confidence over the core fields that were found; 0 if none.
    pub fn overall_confidence(&self) -> u32 {
        let scores: Vec<u32> = [
            self.contributor_name.as_ref().map(|_| NAME_CONFIDENCE),
            self.pan_number.as_ref().map(|_| self.pan_confidence),
            self.capital_commitment.as_ref().map(|_| self.amount_confidence),
            self.lock_in_period.as_ref().map(|_| TERM_CONFIDENCE),
            self.management_fee.as_ref().map(|_| TERM_CONFIDENCE),
            self.carried_interest.as_ref().map(|_| TERM_CONFIDENCE),
        ]
        .into_iter()
        .flatten()
        .collect();

        if scores.is_empty() {
            0
        } else {
            scores.iter().sum::<u32>() / scores.len() as u32
        }
    }

    pub fn to_formatted_string(&self) -> String {
        let mut out = format!(
            "=== FUND AGREEMENT DATA (Confidence: {}%) ===\n\n",
            self.overall_confidence()
        );

        let rows = [
            ("Contributor", &self.contributor_name),
            ("PAN", &self.pan_number),
            ("Capital Commitment", &self.capital_commitment),
            ("Lock-in Period", &self.lock_in_period),
            ("Management Fee", &self.management_fee),
            ("Carried Interest", &self.carried_interest),
            ("Email", &self.email),
            ("Phone", &self.phone),
        ];
        for (label, value) in rows {
            if let Some(v) = value {
                out.push_str(&format!("{label}: {v}\n"));
            }
        }
        if !self.agreement_dates.is_empty() {
            out.push_str(&format!(
                "Agreement Date: {}\n",
                self.agreement_dates.join(", ")
            ));
        }

        let missing = self.missing_fields();
        if !missing.is_empty() {
            out.push_str("\nMissing Fields:\n");
            for field in missing {
                out.push_str(&format!("- {field}\n"));
            }
        }
        out
    }
}
