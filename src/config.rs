use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::routing::BackendSet;

/// Application-level constants
pub const APP_NAME: &str = "DocReader";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default worker pool size for batch runs.
pub const DEFAULT_WORKERS: usize = 4;

/// Upper bound on the worker pool, regardless of configuration.
pub const MAX_WORKERS: usize = 64;

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "docreader=info"
}

/// Get the application data directory (~/DocReader/).
/// Falls back to the working directory when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Directory where batch reports are written by the CLI.
pub fn reports_dir() -> PathBuf {
    app_data_dir().join("reports")
}

/// OCR settings resolved at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Recognition language passed to tesseract (`-l`).
    pub language: String,
    /// Explicit recognition data directory (TESSDATA_PREFIX), checked first.
    pub tessdata_override: Option<PathBuf>,
    /// Page rendering resolution for OCR.
    pub render_dpi: u32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            tessdata_override: None,
            render_dpi: 300,
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub ollama_url: String,
    pub workers: usize,
    pub ocr: OcrSettings,
    pub backends: BackendSet,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            workers: DEFAULT_WORKERS,
            ocr: OcrSettings::default(),
            backends: BackendSet::default(),
        }
    }
}

impl AppConfig {
    /// Build from defaults plus process environment overrides.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from defaults plus overrides supplied by `lookup`.
    ///
    /// Recognised keys: `DOCREADER_OLLAMA_URL`, `DOCREADER_WORKERS`,
    /// `DOCREADER_OCR_LANG`, `TESSDATA_PREFIX`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DOCREADER_OLLAMA_URL").filter(|v| !v.trim().is_empty()) {
            config.ollama_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup("DOCREADER_WORKERS") {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.workers = clamp_workers(n),
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid DOCREADER_WORKERS"),
            }
        }

        if let Some(lang) = lookup("DOCREADER_OCR_LANG").filter(|v| !v.trim().is_empty()) {
            config.ocr.language = lang.trim().to_string();
        }

        if let Some(dir) = lookup("TESSDATA_PREFIX").filter(|v| !v.trim().is_empty()) {
            config.ocr.tessdata_override = Some(PathBuf::from(dir.trim()));
        }

        config
    }
}

/// Clamp a requested worker count to `1..=MAX_WORKERS`.
pub fn clamp_workers(requested: usize) -> usize {
    requested.clamp(1, MAX_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with(APP_NAME));
    }

    #[test]
    fn reports_dir_under_app_data() {
        let reports = reports_dir();
        assert!(reports.starts_with(app_data_dir()));
        assert!(reports.ends_with("reports"));
    }

    #[test]
    fn defaults_without_overrides() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.render_dpi, 300);
        assert!(config.ocr.tessdata_override.is_none());
    }

    #[test]
    fn env_overrides_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DOCREADER_OLLAMA_URL", "http://gpu-box:11434/"),
            ("DOCREADER_WORKERS", "8"),
            ("DOCREADER_OCR_LANG", "eng+hin"),
            ("TESSDATA_PREFIX", "/data/tessdata"),
        ]));
        assert_eq!(config.ollama_url, "http://gpu-box:11434");
        assert_eq!(config.workers, 8);
        assert_eq!(config.ocr.language, "eng+hin");
        assert_eq!(
            config.ocr.tessdata_override,
            Some(PathBuf::from("/data/tessdata"))
        );
    }

    #[test]
    fn worker_count_clamped() {
        let zero = AppConfig::from_lookup(lookup_from(&[("DOCREADER_WORKERS", "0")]));
        assert_eq!(zero.workers, 1);
        let huge = AppConfig::from_lookup(lookup_from(&[("DOCREADER_WORKERS", "10000")]));
        assert_eq!(huge.workers, MAX_WORKERS);
    }

    #[test]
    fn invalid_worker_count_keeps_default() {
        let config = AppConfig::from_lookup(lookup_from(&[("DOCREADER_WORKERS", "lots")]));
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn blank_overrides_ignored() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DOCREADER_OLLAMA_URL", "  "),
            ("TESSDATA_PREFIX", ""),
        ]));
        assert_eq!(config.ollama_url, DEFAULT_OLLAMA_URL);
        assert!(config.ocr.tessdata_override.is_none());
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
