//! Web search collaborators.
//!
//! A [`SearchProvider`] turns a query string into ranked results. Calls are
//! spaced out by a process-wide [`CallThrottle`] regardless of how many runs
//! are searching concurrently.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

use taliesin_types::SearchResult;

use crate::error::{Result, RetrievalError};
use crate::throttle::CallThrottle;

/// Default request timeout for search calls.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────────────────
// Search Provider Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for web search backends.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for `query`, returning up to `k` ranked results.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>>;

    /// Name of this provider, for logging.
    fn name(&self) -> &str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Serper (Google)
// ─────────────────────────────────────────────────────────────────────────────

/// Google search via the Serper API.
pub struct SerperSearch {
    client: Client,
    api_key: String,
    throttle: CallThrottle,
}

impl SerperSearch {
    /// Create a Serper-backed search provider.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(|e| RetrievalError::Search(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            throttle: CallThrottle::default(),
        })
    }

    /// Create from the `SERPER_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SERPER_API_KEY").map_err(|_| {
            RetrievalError::Search("SERPER_API_KEY environment variable not set".to_string())
        })?;
        Self::new(api_key)
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.throttle.acquire().await;

        tracing::info!(query, k, provider = "serper", "Performing web search");

        let response = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&json!({ "q": query, "num": k }))
            .send()
            .await
            .map_err(|e| RetrievalError::Search(format!("Serper request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RetrievalError::Search(format!(
                "Serper error: {}",
                response.status()
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| RetrievalError::Parse(format!("Failed to parse Serper response: {}", e)))?;

        let results = data["organic"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .take(k)
                    .filter_map(|r| {
                        Some(SearchResult {
                            title: r["title"].as_str()?.to_string(),
                            url: r["link"].as_str()?.to_string(),
                            snippet: r["snippet"].as_str().unwrap_or("").to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }

    fn name(&self) -> &str {
        "serper"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DuckDuckGo
// ─────────────────────────────────────────────────────────────────────────────

/// DuckDuckGo instant-answer search (no API key, limited coverage).
pub struct DuckDuckGoSearch {
    client: Client,
    throttle: CallThrottle,
}

impl DuckDuckGoSearch {
    /// Create a DuckDuckGo-backed search provider.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(|e| RetrievalError::Search(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            throttle: CallThrottle::default(),
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.throttle.acquire().await;

        tracing::info!(query, k, provider = "duckduckgo", "Performing web search");

        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_html=1&skip_disambig=1",
            urlencoding::encode(query)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RetrievalError::Search(format!("DuckDuckGo request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RetrievalError::Search(format!(
                "DuckDuckGo error: {}",
                response.status()
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            RetrievalError::Parse(format!("Failed to parse DuckDuckGo response: {}", e))
        })?;

        let mut results = Vec::new();

        if let Some(abstract_text) = data["AbstractText"].as_str() {
            if !abstract_text.is_empty() {
                results.push(SearchResult {
                    title: data["Heading"].as_str().unwrap_or("Result").to_string(),
                    url: data["AbstractURL"].as_str().unwrap_or("").to_string(),
                    snippet: abstract_text.to_string(),
                });
            }
        }

        if let Some(topics) = data["RelatedTopics"].as_array() {
            for topic in topics.iter().take(k.saturating_sub(results.len())) {
                if let (Some(text), Some(url)) =
                    (topic["Text"].as_str(), topic["FirstURL"].as_str())
                {
                    results.push(SearchResult {
                        title: text.chars().take(50).collect::<String>(),
                        url: url.to_string(),
                        snippet: text.to_string(),
                    });
                }
            }
        }

        Ok(results)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Provider
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted search provider for tests.
pub struct MockSearch {
    results: Vec<SearchResult>,
    fail: bool,
}

impl MockSearch {
    /// Always return the given results (truncated to `k`).
    pub fn with_results(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            fail: false,
        }
    }

    /// Always return no results.
    pub fn empty() -> Self {
        Self::with_results(Vec::new())
    }

    /// Always fail.
    pub fn failing() -> Self {
        Self {
            results: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if self.fail {
            return Err(RetrievalError::Search("mock search failure".into()));
        }
        Ok(self.results.iter().take(k).cloned().collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_results() -> Vec<SearchResult> {
        vec![
            SearchResult::new("https://a.com/1", "A", "first"),
            SearchResult::new("https://b.com/1", "B", "second"),
            SearchResult::new("https://c.com/1", "C", "third"),
        ]
    }

    #[tokio::test]
    async fn test_mock_returns_results_in_order() {
        let provider = MockSearch::with_results(sample_results());
        let results = provider.search("anything", 5).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].url, "https://a.com/1");
    }

    #[tokio::test]
    async fn test_mock_truncates_to_k() {
        let provider = MockSearch::with_results(sample_results());
        let results = provider.search("anything", 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let provider = MockSearch::failing();
        assert!(provider.search("anything", 5).await.is_err());
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(MockSearch::empty().name(), "mock");
    }
}
