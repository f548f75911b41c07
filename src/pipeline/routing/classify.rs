//! Request classification: decides which backend class a prompt needs.

use serde::{Deserialize, Serialize};

/// Phrases that mark a single-fact lookup.
const SIMPLE_PHRASES: &[&str] = &[
    "find the",
    "what is the",
    "is there a",
    "extract the",
    "get the",
    "show me the",
    "does it contain",
    "is it present",
];

/// Field names counted toward request complexity.
const FIELD_VOCABULARY: &[&str] = &[
    "name", "pan", "amount", "date", "period", "fee", "address", "email",
];

/// More fields than this makes a lookup complex.
const MAX_SIMPLE_FIELDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    Simple,
    Complex,
    ImageBased,
}

/// Number of distinct field names the prompt mentions.
pub fn count_fields(prompt: &str) -> usize {
    let lower = prompt.to_lowercase();
    FIELD_VOCABULARY
        .iter()
        .filter(|field| lower.contains(*field))
        .count()
}

/// Classify a request. Image-based documents always need the vision class.
pub fn classify_request(prompt: &str, image_based: bool) -> RequestClass {
    if image_based {
        return RequestClass::ImageBased;
    }

    let lower = prompt.to_lowercase();
    let has_simple_phrase = SIMPLE_PHRASES.iter().any(|p| lower.contains(p));
    if has_simple_phrase && count_fields(&lower) <= MAX_SIMPLE_FIELDS {
        RequestClass::Simple
    } else {
        RequestClass::Complex
    }
}
