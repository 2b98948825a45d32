//! Error types for the retrieval crate.

use thiserror::Error;

/// Result type alias using the retrieval error type.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Error type for search, fetch, and vector store operations.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Search provider failure.
    #[error("Search error: {0}")]
    Search(String),

    /// Page fetch failure.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Malformed URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Embedding collaborator failure.
    #[error("Embedding error: {0}")]
    Embedding(#[from] taliesin_llm::LlmError),

    /// Failed to parse a provider response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for RetrievalError {
    fn from(e: reqwest::Error) -> Self {
        RetrievalError::Fetch(e.to_string())
    }
}
