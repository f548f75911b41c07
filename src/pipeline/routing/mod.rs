pub mod backend;
pub mod classify;
pub mod patterns;
pub mod summarizer;
pub mod ollama;
pub mod router;
pub mod analysis;

pub use backend::*;
pub use classify::{classify_request, RequestClass};
pub use ollama::{InferenceClient, MockInferenceClient, OllamaClient};
pub use router::*;
pub use analysis::DocumentAnalyzer;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("{backend} backend ({model}) timed out after {timeout_secs}s")]
    Timeout {
        backend: BackendKind,
        model: String,
        timeout_secs: u64,
    },

    #[error("Ollama not reachable at {0}")]
    Connection(String),

    #[error("Ollama returned error {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Failed to parse backend response: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    Http(String),
}

impl RouteError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Short diagnostic shown as a failed document's output.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout {
                backend,
                model,
                timeout_secs,
            } => format!(
                "Analysis Timeout: the {backend} model did not respond within {timeout_secs}s. \
                 The document may be very large, Ollama may not be running (check: ollama list), \
                 or the model may need to be pulled (run: ollama pull {model})."
            ),
            other => format!("Analysis failed: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_has_remediation() {
        let err = RouteError::Timeout {
            backend: BackendKind::Power,
            model: "qwen2.5:7b".into(),
            timeout_secs: 30,
        };
        assert!(err.is_timeout());
        let msg = err.user_message();
        assert!(msg.starts_with("Analysis Timeout"));
        assert!(msg.contains("ollama list"));
        assert!(msg.contains("ollama pull qwen2.5:7b"));
    }

    #[test]
    fn generic_error_wraps_raw_message() {
        let err = RouteError::Backend {
            status: 500,
            body: "model not loaded".into(),
        };
        assert_eq!(
            err.user_message(),
            "Analysis failed: Ollama returned error 500: model not loaded"
        );
    }
}
