//! Chat backend trait, retry logic, and the test mock.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result, is_retryable};
use crate::types::CompletionRequest;

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures, rate limits).
/// Non-retryable errors are returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;
    let mut backoff = initial_backoff;

    for attempt in 0..=max_retries {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }

                last_error = Some(e);

                if attempt < max_retries {
                    tracing::warn!(
                        backend = backend_name,
                        attempt = attempt + 1,
                        max_retries = max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| LlmError::Internal("retry loop without error".into())))
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A stream of raw text deltas from a chat completion.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>>;

/// Trait for chat-model providers.
///
/// Implementations connect to an actual completion service (OpenAI-compatible
/// APIs, local models) or script responses for tests. The streaming variant
/// yields incremental text deltas; segmentation into lines and semantic
/// records happens downstream.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Execute a completion and return the full response text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Execute a completion and return a stream of text deltas.
    async fn complete_stream(&self, request: CompletionRequest) -> Result<TokenStream>;

    /// Name of this backend, for logging.
    fn name(&self) -> &str;
}

/// A shared chat backend usable across tasks.
pub type SharedChatBackend = Arc<dyn ChatBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Failure mode for [`MockChatBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockFailure {
    None,
    /// `complete_stream` itself fails.
    OnCreate,
    /// The stream yields an error after `n` deltas.
    MidStream(usize),
}

/// A scripted chat backend for tests.
///
/// Streams a fixed sequence of deltas exactly as a provider would hand them
/// over the wire, including deltas that split lines mid-token.
#[derive(Debug, Clone)]
pub struct MockChatBackend {
    deltas: Vec<String>,
    completion: String,
    failure: MockFailure,
}

impl MockChatBackend {
    /// Stream the given deltas; `complete` returns their concatenation.
    pub fn with_deltas<S: Into<String>>(deltas: Vec<S>) -> Self {
        let deltas: Vec<String> = deltas.into_iter().map(Into::into).collect();
        let completion = deltas.concat();
        Self {
            deltas,
            completion,
            failure: MockFailure::None,
        }
    }

    /// Return the given text as a single delta / full completion.
    pub fn with_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            deltas: vec![text.clone()],
            completion: text,
            failure: MockFailure::None,
        }
    }

    /// Fail when the stream is created.
    pub fn failing() -> Self {
        Self {
            deltas: Vec::new(),
            completion: String::new(),
            failure: MockFailure::OnCreate,
        }
    }

    /// Yield `n` deltas, then fail mid-stream.
    pub fn failing_after(n: usize) -> Self {
        Self {
            deltas: (0..n).map(|i| format!("delta {}\n", i)).collect(),
            completion: String::new(),
            failure: MockFailure::MidStream(n),
        }
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        match self.failure {
            MockFailure::None => Ok(self.completion.clone()),
            _ => Err(LlmError::Backend("mock backend failure".into())),
        }
    }

    async fn complete_stream(&self, _request: CompletionRequest) -> Result<TokenStream> {
        match self.failure {
            MockFailure::OnCreate => Err(LlmError::Backend("mock stream creation failure".into())),
            MockFailure::MidStream(n) => {
                let items: Vec<Result<String>> = self
                    .deltas
                    .iter()
                    .take(n)
                    .cloned()
                    .map(Ok)
                    .chain(std::iter::once(Err(LlmError::Backend(
                        "mock mid-stream failure".into(),
                    ))))
                    .collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            MockFailure::None => {
                let items: Vec<Result<String>> = self.deltas.iter().cloned().map(Ok).collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
