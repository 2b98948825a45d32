//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for run processing.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Chat-model backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] taliesin_llm::LlmError),

    /// Retrieval collaborator error.
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] taliesin_retrieval::RetrievalError),

    /// Run registry error.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Create a registry error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::registry("run not found");
        assert!(err.to_string().contains("Registry error"));
    }

    #[test]
    fn test_llm_error_converts() {
        let err: AgentError = taliesin_llm::LlmError::Backend("overloaded".into()).into();
        assert!(err.to_string().contains("LLM error"));
    }
}
