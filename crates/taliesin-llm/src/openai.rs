//! OpenAI-compatible chat completion backend.
//!
//! Connects to OpenAI's API or any compatible service. The streaming path
//! parses the provider's SSE frames into plain text deltas; everything about
//! thought/answer segmentation lives downstream of this crate.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, Response, header};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{ChatBackend, TokenStream, with_retry};
use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, Role};

/// Default OpenAI API base URL.
const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication (optional for local services).
    pub api_key: Option<String>,

    /// Base URL for the API.
    pub base_url: String,

    /// Model override. When set, requests always use this model.
    pub model: Option<String>,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum retries for transient errors.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,

    /// Name for this backend instance.
    pub name: String,
}

impl OpenAiConfig {
    /// Create a new config for OpenAI.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: DEFAULT_OPENAI_BASE.to_string(),
            model: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            name: "openai".to_string(),
        }
    }

    /// Create config from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LlmError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::openai(api_key))
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set a model override.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the backend name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI-compatible chat backend.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a backend from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    /// Build the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Add authentication headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(header::CONTENT_TYPE, "application/json");

        if let Some(ref api_key) = self.config.api_key {
            builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key))
        } else {
            builder
        }
    }

    /// Convert a [`CompletionRequest`] to the wire format.
    fn to_wire_request(&self, request: &CompletionRequest) -> WireChatRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect();

        // Config model wins over the per-request model.
        let model = self
            .config
            .model
            .clone()
            .unwrap_or_else(|| request.model.clone());

        WireChatRequest {
            model,
            messages,
            max_completion_tokens: Some(request.max_completion_tokens),
            temperature: request.temperature,
            stream: Some(request.stream),
        }
    }

    /// Handle a successful response.
    async fn handle_response(response: Response) -> Result<String> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: WireChatResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Serialization(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(text)
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(error) = serde_json::from_str::<WireErrorResponse>(&body) {
            match status.as_u16() {
                401 => LlmError::Auth(format!("Authentication failed: {}", error.error.message)),
                429 => LlmError::RateLimit(format!("Rate limit exceeded: {}", error.error.message)),
                500..=599 => LlmError::Backend(format!("Server error: {}", error.error.message)),
                _ => LlmError::Backend(error.error.message),
            }
        } else {
            LlmError::Backend(format!("HTTP {}: {}", status, body))
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let mut request = request;
        request.stream = false;

        let wire_request = self.to_wire_request(&request);

        tracing::debug!(
            backend = %self.config.name,
            model = %wire_request.model,
            messages = %wire_request.messages.len(),
            "Sending chat completion request"
        );

        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            &self.config.name,
            || async {
                let response = self
                    .add_headers(self.client.post(self.completions_url()))
                    .json(&wire_request)
                    .send()
                    .await?;

                Self::handle_response(response).await
            },
        )
        .await
    }

    async fn complete_stream(&self, request: CompletionRequest) -> Result<TokenStream> {
        let mut request = request;
        request.stream = true;

        let wire_request = self.to_wire_request(&request);

        tracing::debug!(
            backend = %self.config.name,
            model = %wire_request.model,
            "Opening streaming chat completion"
        );

        let response = self
            .add_headers(self.client.post(self.completions_url()))
            .json(&wire_request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        Ok(parse_sse_deltas(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

/// Create a shared OpenAI-compatible backend.
pub fn create_shared_backend(config: OpenAiConfig) -> Result<Arc<dyn ChatBackend>> {
    Ok(Arc::new(OpenAiBackend::new(config)?))
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Serialize)]
struct WireChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, serde::Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, serde::Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, serde::Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct WireErrorResponse {
    error: WireError,
}

#[derive(Debug, serde::Deserialize)]
struct WireError {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Streaming
// ─────────────────────────────────────────────────────────────────────────────

struct SseState {
    byte_stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: String,
    done: bool,
}

/// Parse a provider SSE byte stream into plain text deltas.
fn parse_sse_deltas(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> TokenStream {
    Box::pin(futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(byte_stream),
            buffer: String::new(),
            done: false,
        },
        |mut state| async move {
            if state.done {
                return None;
            }

            loop {
                // Process complete lines in the buffer.
                while let Some(line_end) = state.buffer.find('\n') {
                    let line = state.buffer[..line_end].trim().to_string();
                    state.buffer = state.buffer[line_end + 1..].to_string();

                    if line.is_empty() {
                        continue;
                    }

                    if let Some(data) = line.strip_prefix("data: ") {
                        if data == "[DONE]" {
                            state.done = true;
                            return None;
                        }

                        if let Ok(chunk) = serde_json::from_str::<WireStreamChunk>(data) {
                            if let Some(content) = chunk
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta)
                                .and_then(|d| d.content)
                            {
                                if !content.is_empty() {
                                    return Some((Ok(content), state));
                                }
                            }
                        }
                    }
                }

                // Need more data.
                match state.byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        let text = String::from_utf8_lossy(&bytes);
                        state.buffer.push_str(&text);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(LlmError::Network(e.to_string())), state));
                    }
                    None => {
                        // Stream exhausted without [DONE].
                        return None;
                    }
                }
            }
        },
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct WireStreamChoice {
    delta: Option<WireStreamDelta>,
}

#[derive(Debug, serde::Deserialize)]
struct WireStreamDelta {
    content: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    #[test]
    fn test_config_defaults() {
        let config = OpenAiConfig::openai("test-key");
        assert_eq!(config.api_key, Some("test-key".to_string()));
        assert_eq!(config.base_url, DEFAULT_OPENAI_BASE);
        assert_eq!(config.name, "openai");
    }

    #[test]
    fn test_config_builder() {
        let config = OpenAiConfig::openai("key")
            .with_base_url("http://localhost:11434/v1")
            .with_model("o4-mini")
            .with_name("local")
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.model, Some("o4-mini".to_string()));
        assert_eq!(config.name, "local");
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_completions_url() {
        let backend = OpenAiBackend::new(OpenAiConfig::openai("key")).unwrap();
        assert_eq!(
            backend.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_model_override_wins() {
        let backend =
            OpenAiBackend::new(OpenAiConfig::openai("key").with_model("gpt-4.1-nano")).unwrap();
        let request = CompletionRequest::new("o4-mini", vec![ChatMessage::user("q")], 64);
        let wire = backend.to_wire_request(&request);
        assert_eq!(wire.model, "gpt-4.1-nano");
    }

    #[test]
    fn test_wire_request_roles() {
        let backend = OpenAiBackend::new(OpenAiConfig::openai("key")).unwrap();
        let request = CompletionRequest::new(
            "o4-mini",
            vec![ChatMessage::system("rules"), ChatMessage::user("q")],
            2000,
        );
        let wire = backend.to_wire_request(&request);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[1].role, "user");
        assert_eq!(wire.max_completion_tokens, Some(2000));
    }

    #[tokio::test]
    async fn test_sse_parsing_yields_deltas() {
        let frames = vec![
            Ok(Bytes::from(
                "data: {\"choices\":[{\"delta\":{\"content\":\"THOUGHT: \"}}]}\n\n",
            )),
            Ok(Bytes::from(
                "data: {\"choices\":[{\"delta\":{\"content\":\"adding\\n\"}}]}\n\n",
            )),
            Ok(Bytes::from("data: [DONE]\n\n")),
        ];
        let mut stream = parse_sse_deltas(futures::stream::iter(frames));

        assert_eq!(stream.next().await.unwrap().unwrap(), "THOUGHT: ");
        assert_eq!(stream.next().await.unwrap().unwrap(), "adding\n");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_sse_parsing_handles_split_frames() {
        // One SSE frame arriving across two network reads.
        let frames = vec![
            Ok(Bytes::from("data: {\"choices\":[{\"delta\":{\"co")),
            Ok(Bytes::from("ntent\":\"4\"}}]}\n\ndata: [DONE]\n\n")),
        ];
        let mut stream = parse_sse_deltas(futures::stream::iter(frames));

        assert_eq!(stream.next().await.unwrap().unwrap(), "4");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_sse_parsing_skips_empty_deltas() {
        let frames = vec![
            Ok(Bytes::from(
                "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
            )),
            Ok(Bytes::from(
                "data: {\"choices\":[{\"delta\":{}}]}\n\ndata: [DONE]\n\n",
            )),
        ];
        let mut stream = parse_sse_deltas(futures::stream::iter(frames));
        assert!(stream.next().await.is_none());
    }
}
