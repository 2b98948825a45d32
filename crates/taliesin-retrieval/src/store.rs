//! In-memory vector store for embedded page chunks.
//!
//! Content is chunked by word count, embedded via the configured embedder,
//! and held in process memory. Similarity search ranks by
//! cosine similarity and enforces a per-domain cap so one source cannot
//! dominate the context window.

use std::cmp::Ordering;
use tokio::sync::RwLock;

use taliesin_llm::SharedEmbedder;
use taliesin_types::DocumentChunk;

use crate::error::Result;
use crate::fetch::domain_of;

// ─────────────────────────────────────────────────────────────────────────────
// Cosine Similarity
// ─────────────────────────────────────────────────────────────────────────────

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chunking
// ─────────────────────────────────────────────────────────────────────────────

/// Split text into word-based chunks of approximately `max_tokens` tokens,
/// estimating 0.75 words per token.
fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_words = ((max_tokens as f32) * 0.75) as usize;
    let max_words = max_words.max(1);

    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words)
        .map(|chunk| chunk.join(" "))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Vector Store
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the vector store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Approximate token budget per chunk.
    pub max_chunk_tokens: usize,
    /// Chunks shorter than this many characters are skipped.
    pub min_chunk_chars: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: 2000,
            min_chunk_chars: 50,
        }
    }
}

struct StoredChunk {
    content: String,
    url: String,
    title: String,
    embedding: Vec<f32>,
}

/// In-memory store of embedded content chunks.
///
/// The per-URL existence check and the subsequent insert are not atomic;
/// two runs fetching the same URL concurrently may both embed it.
pub struct VectorStore {
    embedder: SharedEmbedder,
    config: StoreConfig,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl VectorStore {
    /// Create a store with default configuration.
    pub fn new(embedder: SharedEmbedder) -> Self {
        Self::with_config(embedder, StoreConfig::default())
    }

    /// Create a store with custom configuration.
    pub fn with_config(embedder: SharedEmbedder, config: StoreConfig) -> Self {
        Self {
            embedder,
            config,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    /// Returns true when no chunks are stored.
    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    /// Remove all stored chunks.
    pub async fn clear(&self) {
        self.chunks.write().await.clear();
        tracing::info!("Cleared vector store");
    }

    /// Chunk, embed, and store page content.
    ///
    /// When the URL already has stored chunks they are reused instead of
    /// re-embedding. Returns the chunks for the URL (freshly embedded or
    /// pre-existing); an empty result means nothing was worth storing.
    pub async fn embed_and_store(
        &self,
        content: &str,
        url: &str,
        title: &str,
    ) -> Result<Vec<DocumentChunk>> {
        let existing = self.chunks_for_url(url).await;
        if !existing.is_empty() {
            tracing::info!(url, count = existing.len(), "Reusing existing embeddings");
            return Ok(existing);
        }

        let pieces: Vec<String> = chunk_text(content, self.config.max_chunk_tokens)
            .into_iter()
            .filter(|c| c.trim().len() >= self.config.min_chunk_chars)
            .collect();

        if pieces.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(url, count = pieces.len(), "Creating embeddings");

        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&refs).await?;

        let mut document_chunks = Vec::with_capacity(pieces.len());
        {
            let mut chunks = self.chunks.write().await;
            for (content, embedding) in pieces.into_iter().zip(embeddings) {
                chunks.push(StoredChunk {
                    content: content.clone(),
                    url: url.to_string(),
                    title: title.to_string(),
                    embedding: embedding.clone(),
                });
                document_chunks.push(DocumentChunk::embedded(content, url, title, embedding));
            }
        }

        Ok(document_chunks)
    }

    /// Search for the `top_k` most similar chunks, keeping at most
    /// `max_per_domain` chunks from any one source domain.
    ///
    /// Results are ordered by descending similarity; equal scores keep
    /// store insertion order.
    pub async fn search_similar(
        &self,
        query: &str,
        top_k: usize,
        max_per_domain: usize,
    ) -> Result<Vec<DocumentChunk>> {
        let query_embedding = self.embedder.embed(query).await?;

        let chunks = self.chunks.read().await;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, &StoredChunk)> = chunks
            .iter()
            .map(|c| (cosine_similarity(&query_embedding, &c.embedding), c))
            .collect();

        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let mut domain_counts: std::collections::HashMap<String, usize> =
            std::collections::HashMap::new();
        let mut selected = Vec::new();

        for (score, chunk) in scored {
            if selected.len() >= top_k {
                break;
            }

            let domain = domain_of(&chunk.url).unwrap_or_else(|| chunk.url.clone());
            let count = domain_counts.entry(domain).or_insert(0);
            if *count < max_per_domain {
                *count += 1;
                selected.push(DocumentChunk::scored(
                    chunk.content.clone(),
                    chunk.url.clone(),
                    chunk.title.clone(),
                    score,
                ));
            }
        }

        tracing::info!(query, count = selected.len(), "Retrieved similar chunks");
        Ok(selected)
    }

    async fn chunks_for_url(&self, url: &str) -> Vec<DocumentChunk> {
        self.chunks
            .read()
            .await
            .iter()
            .filter(|c| c.url == url)
            .map(|c| {
                DocumentChunk::embedded(
                    c.content.clone(),
                    c.url.clone(),
                    c.title.clone(),
                    c.embedding.clone(),
                )
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
