//! LLM agent seam.
//!
//! Stages talk to the model through the [`Agent`] trait so the whole
//! pipeline can run against a scripted [`MockAgent`] in tests. The real
//! implementation, [`OpenAiAgent`], speaks the OpenAI-compatible chat
//! completions protocol over reqwest.

use std::collections::VecDeque;
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Default chat completions endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
/// Default model when `MATHFORGE_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Per-call deadline in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Per-call sampling parameters.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Optional system message prepended to the conversation.
    pub system: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            system: None,
            temperature: 0.7,
            max_tokens: 4000,
        }
    }
}

impl CompletionConfig {
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A completion-capable agent. One prompt in, one text response out.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn complete(&self, prompt: &str, config: &CompletionConfig) -> Result<String, LlmError>;
}

/// A message in the chat completions wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Agent backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiAgent {
    api_base: String,
    api_key: String,
    model: String,
    http_client: Client,
}

impl OpenAiAgent {
    /// Create an agent with explicit configuration.
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
            http_client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Create an agent from environment variables.
    ///
    /// - `MATHFORGE_API_KEY`: required; missing key is a fatal
    ///   configuration error that aborts before any stage runs.
    /// - `MATHFORGE_API_BASE`: optional, defaults to [`DEFAULT_API_BASE`].
    /// - `MATHFORGE_MODEL`: optional, defaults to [`DEFAULT_MODEL`].
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env::var("MATHFORGE_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        let api_base =
            env::var("MATHFORGE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let model = env::var("MATHFORGE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_base, api_key, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[async_trait]
impl Agent for OpenAiAgent {
    async fn complete(&self, prompt: &str, config: &CompletionConfig) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = config.system {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));

        let request = ApiRequest {
            model: self.model.clone(),
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.api_base);

        let http_response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        seconds: REQUEST_TIMEOUT_SECS,
                    }
                } else {
                    LlmError::RequestFailed(e.to_string())
                }
            })?;

        let status = http_response.status();
        if !status.is_success() {
            let body = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::ApiError {
                code: status.as_u16(),
                message,
            });
        }

        let response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::RequestFailed(format!("Failed to parse API response: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Scripted agent for tests. Returns queued responses in order and errors
/// with [`LlmError::ScriptExhausted`] once the script runs out.
pub struct MockAgent {
    responses: Mutex<VecDeque<String>>,
    repeating: bool,
    calls: AtomicUsize,
}

impl MockAgent {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            repeating: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// An agent that replies with the same text forever.
    pub fn repeating(response: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([response.into()])),
            repeating: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many completions have been requested.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for MockAgent {
    async fn complete(&self, _prompt: &str, _config: &CompletionConfig) -> Result<String, LlmError> {
        let served = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().expect("mock agent lock");
        if self.repeating {
            return responses
                .front()
                .cloned()
                .ok_or(LlmError::ScriptExhausted(served));
        }
        responses
            .pop_front()
            .ok_or(LlmError::ScriptExhausted(served))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_agent_serves_script_in_order() {
        let agent = MockAgent::new(["first", "second"]);
        let config = CompletionConfig::default();

        assert_eq!(agent.complete("p", &config).await.unwrap(), "first");
        assert_eq!(agent.complete("p", &config).await.unwrap(), "second");
        assert_eq!(agent.call_count(), 2);

        let err = agent.complete("p", &config).await.unwrap_err();
        assert!(matches!(err, LlmError::ScriptExhausted(2)));
    }

    #[tokio::test]
    async fn test_mock_agent_repeating() {
        let agent = MockAgent::repeating("same");
        let config = CompletionConfig::default();
        for _ in 0..5 {
            assert_eq!(agent.complete("p", &config).await.unwrap(), "same");
        }
    }

    #[test]
    fn test_completion_config_builder() {
        let config = CompletionConfig::default()
            .with_system("You are a mathematician.")
            .with_temperature(0.3)
            .with_max_tokens(2000);

        assert_eq!(config.system.as_deref(), Some("You are a mathematician."));
        assert!((config.temperature - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.max_tokens, 2000);
    }

    #[test]
    fn test_api_request_serialization() {
        let request = ApiRequest {
            model: "gpt-4o".to_string(),
            messages: vec![Message::user("test")],
            temperature: 0.7,
            max_tokens: 1000,
        };

        let json = serde_json::to_string(&request).expect("serialize");
        assert!(json.contains("\"model\":\"gpt-4o\""));
        assert!(json.contains("\"temperature\":0.7"));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[tokio::test]
    async fn test_openai_agent_connection_error() {
        let agent = OpenAiAgent::new("http://localhost:65535", "test-key", "gpt-4o");
        let result = agent.complete("hello", &CompletionConfig::default()).await;
        assert!(matches!(result, Err(LlmError::RequestFailed(_))));
    }
}
