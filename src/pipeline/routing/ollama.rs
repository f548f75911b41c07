use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{BackendConfig, BackendKind, RouteError};

/// Model listing is a liveness probe; keep it short.
const TAGS_TIMEOUT: Duration = Duration::from_secs(5);

/// Request body for Ollama /api/generate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateOptions {
    pub num_ctx: u32,
    pub temperature: f32,
    pub num_thread: u32,
    pub num_gpu: u32,
}

impl GenerateRequest {
    /// Non-streaming request carrying the backend's sampling options.
    pub fn for_backend(config: &BackendConfig, prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            prompt,
            stream: false,
            options: GenerateOptions {
                num_ctx: config.context_window,
                temperature: config.temperature,
                num_thread: config.num_thread,
                num_gpu: config.num_gpu,
            },
        }
    }
}

/// Local inference seam. `backend` is only used to label errors.
pub trait InferenceClient: Send + Sync {
    fn generate(
        &self,
        backend: BackendKind,
        request: &GenerateRequest,
        timeout: Duration,
    ) -> Result<String, RouteError>;

    fn list_models(&self) -> Result<Vec<String>, RouteError>;
}

impl<T: InferenceClient + ?Sized> InferenceClient for Arc<T> {
    fn generate(
        &self,
        backend: BackendKind,
        request: &GenerateRequest,
        timeout: Duration,
    ) -> Result<String, RouteError> {
        (**self).generate(backend, request, timeout)
    }

    fn list_models(&self) -> Result<Vec<String>, RouteError> {
        (**self).list_models()
    }
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

/// Ollama HTTP client. Timeouts are set per request by the caller.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, RouteError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| RouteError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn backend_error(response: reqwest::blocking::Response) -> RouteError {
        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        RouteError::Backend { status, body }
    }
}

impl InferenceClient for OllamaClient {
    fn generate(
        &self,
        backend: BackendKind,
        request: &GenerateRequest,
        timeout: Duration,
    ) -> Result<String, RouteError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    RouteError::Timeout {
                        backend,
                        model: request.model.clone(),
                        timeout_secs: timeout.as_secs(),
                    }
                } else if e.is_connect() {
                    RouteError::Connection(self.base_url.clone())
                } else {
                    RouteError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response));
        }

        let parsed: GenerateResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                RouteError::Timeout {
                    backend,
                    model: request.model.clone(),
                    timeout_secs: timeout.as_secs(),
                }
            } else {
                RouteError::ResponseParsing(e.to_string())
            }
        })?;

        Ok(parsed.response)
    }

    fn list_models(&self) -> Result<Vec<String>, RouteError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(TAGS_TIMEOUT)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    RouteError::Connection(self.base_url.clone())
                } else {
                    RouteError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response));
        }

        let parsed: TagsResponse = response
            .json()
            .map_err(|e| RouteError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockFailure {
    Timeout,
    Unreachable,
}

/// Scripted inference client. Records every request it receives.
pub struct MockInferenceClient {
    response: String,
    available_models: Vec<String>,
    failure: Option<MockFailure>,
    requests: Mutex<Vec<(BackendKind, GenerateRequest)>>,
    calls: AtomicUsize,
}

impl MockInferenceClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            available_models: vec![
                "llama3.2:1b".to_string(),
                "qwen2.5:7b".to_string(),
            ],
            failure: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    /// Every generate call reports a timeout.
    pub fn timing_out(mut self) -> Self {
        self.failure = Some(MockFailure::Timeout);
        self
    }

    /// Every call reports the server as unreachable.
    pub fn unreachable(mut self) -> Self {
        self.failure = Some(MockFailure::Unreachable);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<(BackendKind, GenerateRequest)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl InferenceClient for MockInferenceClient {
    fn generate(
        &self,
        backend: BackendKind,
        request: &GenerateRequest,
        timeout: Duration,
    ) -> Result<String, RouteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((backend, request.clone()));
        }
        match self.failure {
            Some(MockFailure::Timeout) => Err(RouteError::Timeout {
                backend,
                model: request.model.clone(),
                timeout_secs: timeout.as_secs(),
            }),
            Some(MockFailure::Unreachable) => {
                Err(RouteError::Connection("http://mock:11434".to_string()))
            }
            None => Ok(self.response.clone()),
        }
    }

    fn list_models(&self) -> Result<Vec<String>, RouteError> {
        match self.failure {
            Some(MockFailure::Unreachable) => {
                Err(RouteError::Connection("http://mock:11434".to_string()))
            }
            _ => Ok(self.available_models.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_backend_options() {
        let req = GenerateRequest::for_backend(&BackendConfig::power(), "hi".into());
        assert_eq!(req.model, "qwen2.5:7b");
        assert!(!req.stream);
        assert_eq!(req.options.num_ctx, 32_768);

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_ctx"], 32_768);
        assert_eq!(json["options"]["num_gpu"], 1);
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn mock_records_requests() {
        let mock = MockInferenceClient::new("answer");
        let req = GenerateRequest::for_backend(&BackendConfig::fast(), "q".into());
        let out = mock
            .generate(BackendKind::Fast, &req, Duration::from_secs(10))
            .unwrap();
        assert_eq!(out, "answer");
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.recorded()[0].0, BackendKind::Fast);
    }

    #[test]
    fn mock_timeout_is_labelled() {
        let mock = MockInferenceClient::new("").timing_out();
        let req = GenerateRequest::for_backend(&BackendConfig::power(), "q".into());
        let err = mock
            .generate(BackendKind::Power, &req, Duration::from_secs(30))
            .unwrap_err();
        assert!(matches!(
            err,
            RouteError::Timeout { backend: BackendKind::Power, timeout_secs: 30, .. }
        ));
    }

    #[test]
    fn unreachable_mock_fails_listing() {
        let mock = MockInferenceClient::new("").unreachable();
        assert!(matches!(mock.list_models(), Err(RouteError::Connection(_))));
    }

    #[test]
    fn unreachable_server_is_an_error() {
        let client = OllamaClient::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(
            client.list_models(),
            Err(RouteError::Connection(_) | RouteError::Http(_))
        ));
    }
}
