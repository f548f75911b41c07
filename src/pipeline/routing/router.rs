//! Routes a request to the fast, power, or vision backend and runs it.

use std::borrow::Cow;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::classify::{classify_request, RequestClass};
use super::ollama::{GenerateRequest, InferenceClient};
use super::summarizer::{reduce, truncate};
use super::{BackendKind, BackendSet, FitStrategy, RouteError};

/// Which backend serves a request, and with what budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub backend: BackendKind,
    /// Class the prompt was classified as, before any degradation.
    pub requested: RequestClass,
    pub model: String,
    pub context_window: u32,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_chars: usize,
    pub fit: FitStrategy,
}

impl RouteDecision {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub decision: RouteDecision,
    pub response: String,
    pub elapsed_ms: u64,
    pub input_chars: usize,
    pub fitted_chars: usize,
    /// Text was reduced or truncated to fit the backend budget.
    pub summarized: bool,
}

/// Which configured models the inference server has pulled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackendAvailability {
    pub fast: bool,
    pub power: bool,
    pub vision: bool,
    pub backend_reachable: bool,
}

pub struct ModelRouter {
    client: Box<dyn InferenceClient>,
    backends: BackendSet,
}

impl ModelRouter {
    pub fn new(client: Box<dyn InferenceClient>, backends: BackendSet) -> Self {
        Self { client, backends }
    }

    /// Classify `prompt` and pick a backend.
    pub fn decide(&self, prompt: &str, image_based: bool) -> RouteDecision {
        let requested = classify_request(prompt, image_based);
        let backend = match requested {
            RequestClass::Simple => BackendKind::Fast,
            RequestClass::Complex => BackendKind::Power,
            RequestClass::ImageBased if self.backends.vision_via_power => {
                tracing::warn!(
                    "Image-based request served by power backend; page images are not sent"
                );
                BackendKind::Power
            }
            RequestClass::ImageBased => BackendKind::Vision,
        };

        let config = self.backends.get(backend);
        RouteDecision {
            backend,
            requested,
            model: config.model.clone(),
            context_window: config.context_window,
            timeout_secs: config.timeout_secs,
            temperature: config.temperature,
            max_chars: config.max_chars,
            fit: config.fit,
        }
    }

    /// Run `prompt` over `text` on the decided backend.
    pub fn execute(
        &self,
        decision: RouteDecision,
        text: &str,
        prompt: &str,
    ) -> Result<AnalysisResult, RouteError> {
        let config = self.backends.get(decision.backend);
        let fitted = fit_text(text, decision.fit, decision.max_chars);
        let summarized = matches!(fitted, Cow::Owned(_));
        let input_chars = text.chars().count();
        let fitted_chars = fitted.chars().count();

        let full_prompt = build_prompt(&config.preamble, &fitted, prompt);
        let request = GenerateRequest {
            model: decision.model.clone(),
            ..GenerateRequest::for_backend(config, full_prompt)
        };

        tracing::info!(
            backend = %decision.backend,
            model = %decision.model,
            input_chars,
            fitted_chars,
            summarized,
            "Routing analysis request"
        );

        let start = Instant::now();
        let response = self
            .client
            .generate(decision.backend, &request, decision.timeout())
            .inspect_err(|e| {
                tracing::warn!(backend = %decision.backend, error = %e, "Analysis request failed");
            })?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::info!(backend = %decision.backend, elapsed_ms, "Analysis complete");

        Ok(AnalysisResult {
            decision,
            response,
            elapsed_ms,
            input_chars,
            fitted_chars,
            summarized,
        })
    }

    /// `decide` then `execute`.
    pub fn route(
        &self,
        text: &str,
        prompt: &str,
        image_based: bool,
    ) -> Result<AnalysisResult, RouteError> {
        let decision = self.decide(prompt, image_based);
        self.execute(decision, text, prompt)
    }

    /// Probe the server for each configured model. Any failure reads as
    /// nothing available.
    pub fn check_availability(&self) -> BackendAvailability {
        let models = match self.client.list_models() {
            Ok(models) => models,
            Err(e) => {
                tracing::warn!(error = %e, "Inference server not reachable");
                return BackendAvailability::default();
            }
        };

        let has = |model: &str| models.iter().any(|m| m.contains(model));
        BackendAvailability {
            fast: has(&self.backends.fast.model),
            power: has(&self.backends.power.model),
            vision: has(&self.backends.vision.model),
            backend_reachable: true,
        }
    }
}

fn fit_text(text: &str, fit: FitStrategy, max_chars: usize) -> Cow<'_, str> {
    match fit {
        FitStrategy::Truncate => truncate(text, max_chars),
        FitStrategy::Summarize => reduce(text, max_chars),
    }
}

pub fn build_prompt(preamble: &str, text: &str, prompt: &str) -> String {
    format!(
        "{preamble}\n\n<document>\n{text}\n</document>\n\nUSER REQUEST:\n{prompt}\n\n\
         Provide a detailed, structured response."
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::routing::MockInferenceClient;

    fn router_with(mock: Arc<MockInferenceClient>) -> ModelRouter {
        ModelRouter::new(Box::new(mock), BackendSet::default())
    }

    #[test]
    fn simple_lookup_goes_to_fast() {
        let router = router_with(Arc::new(MockInferenceClient::new("")));
        let decision = router.decide("What is the PAN number?", false);
        assert_eq!(decision.requested, RequestClass::Simple);
        assert_eq!(decision.backend, BackendKind::Fast);
        assert_eq!(decision.model, "llama3.2:1b");
        assert_eq!(decision.timeout_secs, 10);
    }

    #[test]
    fn multi_field_request_goes_to_power() {
        let router = router_with(Arc::new(MockInferenceClient::new("")));
        let decision = router.decide(
            "Extract the contributor name, PAN, commitment amount and management fee",
            false,
        );
        assert_eq!(decision.backend, BackendKind::Power);
        assert_eq!(decision.context_window, 32_768);
    }

    #[test]
    fn four_named_fields_go_to_power_despite_short_phrase() {
        let router = router_with(Arc::new(MockInferenceClient::new("")));
        let prompt = "What is the name, amount, date, and fee?";
        assert_eq!(classify_request(prompt, false), RequestClass::Complex);
        assert_eq!(router.decide(prompt, false).backend, BackendKind::Power);
    }

    #[test]
    fn image_request_degrades_to_power() {
        let router = router_with(Arc::new(MockInferenceClient::new("")));
        let decision = router.decide("What is the PAN number?", true);
        assert_eq!(decision.requested, RequestClass::ImageBased);
        assert_eq!(decision.backend, BackendKind::Power);
    }

    #[test]
    fn image_request_uses_vision_when_enabled() {
        let mut backends = BackendSet::default();
        backends.vision_via_power = false;
        let router = ModelRouter::new(Box::new(MockInferenceClient::new("")), backends);
        let decision = router.decide("anything", true);
        assert_eq!(decision.backend, BackendKind::Vision);
        assert_eq!(decision.model, "llama3.2-vision:11b");
    }

    #[test]
    fn route_sends_wrapped_prompt() {
        let mock = Arc::new(MockInferenceClient::new("PAN is ABCDE1234F"));
        let router = router_with(mock.clone());
        let result = router
            .route("Holder PAN ABCDE1234F", "What is the PAN number?", false)
            .unwrap();

        assert_eq!(result.response, "PAN is ABCDE1234F");
        assert!(!result.summarized);

        let recorded = mock.recorded();
        assert_eq!(recorded.len(), 1);
        let (backend, request) = &recorded[0];
        assert_eq!(*backend, BackendKind::Fast);
        assert_eq!(request.model, "llama3.2:1b");
        assert!(request.prompt.contains("<document>\nHolder PAN ABCDE1234F\n</document>"));
        assert!(request.prompt.contains("USER REQUEST:\nWhat is the PAN number?"));
        assert!(request.prompt.ends_with("Provide a detailed, structured response."));
    }

    #[test]
    fn fast_backend_truncates_long_text() {
        let mock = Arc::new(MockInferenceClient::new("ok"));
        let router = router_with(mock.clone());
        let text = "word ".repeat(4_000);
        let result = router.route(&text, "What is the PAN number?", false).unwrap();
        assert!(result.summarized);
        assert_eq!(result.input_chars, 20_000);
        assert!(mock.recorded()[0]
            .1
            .prompt
            .contains("[Document truncated for fast analysis]"));
    }

    #[test]
    fn timeout_propagates() {
        let router = router_with(Arc::new(MockInferenceClient::new("").timing_out()));
        let err = router
            .route("text", "Summarize every clause", false)
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.user_message().contains("ollama pull qwen2.5:7b"));
    }

    #[test]
    fn availability_checks_each_model() {
        let mock = MockInferenceClient::new("").with_models(vec![
            "llama3.2:1b".into(),
            "mistral:7b".into(),
        ]);
        let router = router_with(Arc::new(mock));
        let avail = router.check_availability();
        assert!(avail.backend_reachable);
        assert!(avail.fast);
        assert!(!avail.power);
        assert!(!avail.vision);
    }

    #[test]
    fn unreachable_server_means_nothing_available() {
        let router = router_with(Arc::new(MockInferenceClient::new("").unreachable()));
        assert_eq!(router.check_availability(), BackendAvailability::default());
    }

    #[test]
    fn prompt_layout() {
        assert_eq!(
            build_prompt("P", "T", "Q"),
            "P\n\n<document>\nT\n</document>\n\nUSER REQUEST:\nQ\n\nProvide a detailed, structured response."
        );
    }
}
