//! Chat-model and embedding collaborators for Taliesin.
//!
//! This crate isolates everything that talks to a language-model provider:
//! the [`ChatBackend`] trait with its OpenAI-compatible implementation, the
//! [`Embedder`] trait for vector embeddings, and the shared error taxonomy.
//! The rest of the workspace depends only on the traits, so any provider
//! with a compatible API (or a mock, in tests) can be swapped in.

pub mod backend;
pub mod embeddings;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{ChatBackend, MockChatBackend, SharedChatBackend, TokenStream, with_retry};
pub use embeddings::{Embedder, MockEmbedder, OpenAiEmbedder, OpenAiEmbedderConfig, SharedEmbedder};
pub use error::{LlmError, Result, is_retryable};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use types::{ChatMessage, CompletionRequest, Role};
