//! Agent runtime configuration.

use std::time::Duration;

/// Runtime configuration for run processing.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Default chat model for answer generation.
    pub chat_model: String,
    /// Cheap model used for search-query rewriting.
    pub rewrite_model: String,
    /// Maximum search-provider calls per run.
    pub max_search_queries: usize,
    /// Results requested per search call.
    pub search_results_per_query: usize,
    /// Top results fetched per search call.
    pub pages_per_query: usize,
    /// Maximum page fetches per run, counted across the whole run.
    pub max_page_fetches: usize,
    /// Chunks requested from similarity search.
    pub top_k: usize,
    /// Maximum chunks per source domain in similarity results.
    pub max_per_domain: usize,
    /// Maximum classified lines mid-stream; past this the model stream is
    /// drained without classification.
    pub max_thoughts: usize,
    /// Completion token budget.
    pub max_completion_tokens: u32,
    /// Channel read timeout before a heartbeat is yielded.
    pub heartbeat_interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            chat_model: "o4-mini".to_string(),
            rewrite_model: "gpt-4.1-nano".to_string(),
            max_search_queries: 5,
            search_results_per_query: 5,
            pages_per_query: 3,
            max_page_fetches: 10,
            top_k: 6,
            max_per_domain: 2,
            max_thoughts: 50,
            max_completion_tokens: 2000,
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}

impl AgentConfig {
    /// Set the default chat model.
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Set the rewrite model.
    pub fn with_rewrite_model(mut self, model: impl Into<String>) -> Self {
        self.rewrite_model = model.into();
        self
    }

    /// Set the maximum search-provider calls per run.
    pub fn with_max_search_queries(mut self, max: usize) -> Self {
        self.max_search_queries = max;
        self
    }

    /// Set the maximum page fetches per run.
    pub fn with_max_page_fetches(mut self, max: usize) -> Self {
        self.max_page_fetches = max;
        self
    }

    /// Set the similarity search top-K.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the mid-stream classified line cap.
    pub fn with_max_thoughts(mut self, max: usize) -> Self {
        self.max_thoughts = max;
        self
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}
