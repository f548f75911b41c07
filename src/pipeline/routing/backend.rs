//! Typed backend configuration, constructed once and passed explicitly.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Fast,
    Power,
    Vision,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Power => "power",
            Self::Vision => "vision",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const FAST_PREAMBLE: &str = "You are a fast document analyzer. Provide quick, accurate answers.\n\
Be concise and direct. Extract specific information only.";

const POWER_PREAMBLE: &str = "You are an expert financial document analyzer specializing in fund agreements.\n\
\n\
Extract information with extreme accuracy. For each field:\n\
1. Quote the exact text from the document\n\
2. Provide the page reference if available\n\
3. If not found, explicitly state \"Not found in document\"\n\
\n\
Focus on:\n\
- Contributor/Investor names\n\
- Capital commitment amounts (look for Rs., INR, ₹)\n\
- PAN numbers (format: XXXXX1234X)\n\
- Lock-in periods (years/months)\n\
- Management fees (%)\n\
- Carried interest (%)\n\
- Dates (multiple formats)\n\
- Key terms and conditions\n\
\n\
Format output clearly with headers and bullet points.";

const VISION_PREAMBLE: &str = "You are a document analyzer working from OCR text of scanned pages.\n\
Expect recognition errors in names and numbers; quote values exactly as recognized\n\
and flag any that look garbled.";

/// How document text is fitted into the backend's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStrategy {
    /// Keep a verbatim prefix.
    Truncate,
    /// Head + keyword-dense middle + tail.
    Summarize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub model: String,
    pub context_window: u32,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_chars: usize,
    pub num_thread: u32,
    pub num_gpu: u32,
    pub fit: FitStrategy,
    pub preamble: String,
}

impl BackendConfig {
    pub fn fast() -> Self {
        Self {
            kind: BackendKind::Fast,
            model: "llama3.2:1b".to_string(),
            context_window: 4096,
            timeout_secs: 10,
            temperature: 0.0,
            max_chars: 8_000,
            num_thread: 8,
            num_gpu: 1,
            fit: FitStrategy::Truncate,
            preamble: FAST_PREAMBLE.to_string(),
        }
    }

    pub fn power() -> Self {
        Self {
            kind: BackendKind::Power,
            model: "qwen2.5:7b".to_string(),
            context_window: 32_768,
            timeout_secs: 30,
            temperature: 0.1,
            max_chars: 120_000,
            num_thread: 8,
            num_gpu: 1,
            fit: FitStrategy::Summarize,
            preamble: POWER_PREAMBLE.to_string(),
        }
    }

    pub fn vision() -> Self {
        Self {
            kind: BackendKind::Vision,
            model: "llama3.2-vision:11b".to_string(),
            context_window: 8192,
            timeout_secs: 60,
            temperature: 0.1,
            max_chars: 30_000,
            num_thread: 8,
            num_gpu: 1,
            fit: FitStrategy::Summarize,
            preamble: VISION_PREAMBLE.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The three backends, one typed config each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSet {
    pub fast: BackendConfig,
    pub power: BackendConfig,
    pub vision: BackendConfig,
    /// Serve vision requests with the power backend until image input is wired.
    pub vision_via_power: bool,
}

impl Default for BackendSet {
    fn default() -> Self {
        Self {
            fast: BackendConfig::fast(),
            power: BackendConfig::power(),
            vision: BackendConfig::vision(),
            vision_via_power: true,
        }
    }
}

impl BackendSet {
    pub fn get(&self, kind: BackendKind) -> &BackendConfig {
        match kind {
            BackendKind::Fast => &self.fast,
            BackendKind::Power => &self.power,
            BackendKind::Vision => &self.vision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budgets_per_backend() {
        let set = BackendSet::default();
        assert_eq!(set.fast.model, "llama3.2:1b");
        assert_eq!(set.fast.context_window, 4096);
        assert_eq!(set.fast.timeout(), Duration::from_secs(10));
        assert_eq!(set.fast.fit, FitStrategy::Truncate);

        assert_eq!(set.power.model, "qwen2.5:7b");
        assert_eq!(set.power.context_window, 32_768);
        assert_eq!(set.power.timeout_secs, 30);
        assert_eq!(set.power.max_chars, 120_000);

        assert_eq!(set.vision.model, "llama3.2-vision:11b");
        assert_eq!(set.vision.timeout_secs, 60);
        assert!(set.vision_via_power);
    }

    #[test]
    fn get_returns_matching_kind() {
        let set = BackendSet::default();
        for kind in [BackendKind::Fast, BackendKind::Power, BackendKind::Vision] {
            assert_eq!(set.get(kind).kind, kind);
        }
    }

    #[test]
    fn power_preamble_names_fund_fields() {
        let power = BackendConfig::power();
        assert!(power.preamble.contains("PAN numbers"));
        assert!(power.preamble.contains("Carried interest"));
    }
}
