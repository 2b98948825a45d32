//! Retrieval data model: search results and document chunks.

use serde::{Deserialize, Serialize};

/// A single web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result URL.
    pub url: String,
    /// Result title.
    pub title: String,
    /// Snippet text, possibly empty.
    pub snippet: String,
}

impl SearchResult {
    /// Create a new search result.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

/// A chunk of page content, either freshly embedded or a retrieval hit.
///
/// A freshly embedded chunk carries `embedding` and no `score`; a retrieval
/// hit carries `score` (cosine similarity) and may omit the embedding.
/// Chunks from the same source URL share `url` and `title`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Chunk text.
    pub content: String,
    /// Source URL.
    pub url: String,
    /// Source title.
    pub title: String,
    /// Embedding vector, present on freshly embedded chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Cosine similarity, present on retrieval hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl DocumentChunk {
    /// Create a freshly embedded chunk.
    pub fn embedded(
        content: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            content: content.into(),
            url: url.into(),
            title: title.into(),
            embedding: Some(embedding),
            score: None,
        }
    }

    /// Create a retrieval hit with a similarity score.
    pub fn scored(
        content: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        score: f32,
    ) -> Self {
        Self {
            content: content.into(),
            url: url.into(),
            title: title.into(),
            embedding: None,
            score: Some(score),
        }
    }
}
