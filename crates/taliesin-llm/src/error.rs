//! Error types for the LLM crate.

use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Error type for chat-model and embedding operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration problem (missing key, bad URL).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication rejected by the provider.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Provider rate limit hit.
    #[error("Rate limit: {0}")]
    RateLimit(String),

    /// Network-level failure (timeout, connection reset).
    #[error("Network error: {0}")]
    Network(String),

    /// Provider returned an error response.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Failed to parse a provider response.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Network(e.to_string())
    }
}

/// Returns true for transient errors worth retrying.
pub fn is_retryable(error: &LlmError) -> bool {
    matches!(error, LlmError::Network(_) | LlmError::RateLimit(_))
}
