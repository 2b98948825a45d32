//! Page fetching and content extraction.
//!
//! A [`PageFetcher`] retrieves cleaned text and titles for URLs. The HTTP
//! implementation extracts readable text from content areas of the page,
//! falling back to the whole body, and applies a cross-run per-domain
//! throttle before every request.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::error::{Result, RetrievalError};
use crate::throttle::DomainThrottle;

// ─────────────────────────────────────────────────────────────────────────────
// URL Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extract the domain (host) of a URL, if it parses.
pub fn domain_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

/// Favicon URL for a page's domain, via Google's favicon service.
pub fn favicon_url(url: &str) -> Option<String> {
    domain_of(url).map(|domain| format!("https://www.google.com/s2/favicons?domain={}", domain))
}

// ─────────────────────────────────────────────────────────────────────────────
// Page Fetcher Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for page fetching backends.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page and return its cleaned text content.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Fetch a page's title.
    async fn fetch_title(&self, url: &str) -> Result<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Fetcher
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the HTTP page fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Shorter timeout for title-only requests.
    pub title_timeout: Duration,
    /// Maximum extracted text length.
    pub max_text_length: usize,
    /// User agent string.
    pub user_agent: String,
    /// Minimum interval between requests to one domain.
    pub domain_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            title_timeout: Duration::from_secs(5),
            max_text_length: 50_000,
            user_agent: concat!("Taliesin/", env!("CARGO_PKG_VERSION"), " (Research Agent)")
                .to_string(),
            domain_delay: Duration::from_secs(1),
        }
    }
}

/// Fetches pages over HTTP and extracts readable text.
pub struct HttpPageFetcher {
    client: Client,
    config: FetchConfig,
    throttle: DomainThrottle,
}

impl HttpPageFetcher {
    /// Create a fetcher with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(FetchConfig::default())
    }

    /// Create a fetcher with custom configuration.
    pub fn with_config(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| RetrievalError::Fetch(format!("Failed to build HTTP client: {}", e)))?;

        let throttle = DomainThrottle::new(config.domain_delay);

        Ok(Self {
            client,
            config,
            throttle,
        })
    }

    /// Extract readable text from HTML.
    ///
    /// Prefers recognizable content areas; falls back to the whole body.
    fn extract_text(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        let content_selectors = [
            "article",
            "main",
            "[role='main']",
            ".content",
            "#content",
            ".post-content",
            ".entry-content",
        ];

        let mut text_parts = Vec::new();
        let mut found_content = false;
        for selector_str in content_selectors {
            if let Ok(selector) = Selector::parse(selector_str) {
                for element in document.select(&selector) {
                    let text = element.text().collect::<Vec<_>>().join(" ");
                    if !text.trim().is_empty() {
                        text_parts.push(text);
                        found_content = true;
                    }
                }
            }
            if found_content {
                break;
            }
        }

        if !found_content {
            if let Ok(body_selector) = Selector::parse("body") {
                for element in document.select(&body_selector) {
                    text_parts.push(element.text().collect::<Vec<_>>().join(" "));
                }
            }
        }

        // Normalize whitespace.
        let text = text_parts.join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        if text.len() > self.config.max_text_length {
            let mut end = self.config.max_text_length;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...[truncated]", &text[..end])
        } else {
            text
        }
    }

    /// Extract the title from HTML.
    fn extract_title(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("title").ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Validate the URL and apply the per-domain throttle.
    async fn prepare(&self, url: &str) -> Result<Url> {
        let parsed =
            Url::parse(url).map_err(|e| RetrievalError::InvalidUrl(format!("{}: {}", url, e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(RetrievalError::InvalidUrl(format!(
                "Only HTTP and HTTPS URLs are supported: {}",
                url
            )));
        }

        let domain = parsed.host_str().unwrap_or("").to_string();
        self.throttle.acquire(&domain).await;
        Ok(parsed)
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let parsed = self.prepare(url).await?;

        tracing::info!(url = %parsed, "Fetching page");

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| RetrievalError::Fetch(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(RetrievalError::Fetch(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| RetrievalError::Fetch(format!("Failed to read {}: {}", url, e)))?;

        let text = self.extract_text(&html);
        if text.is_empty() {
            return Err(RetrievalError::Fetch(format!("No extractable text at {}", url)));
        }

        tracing::debug!(url, chars = text.len(), "Extracted page text");
        Ok(text)
    }

    async fn fetch_title(&self, url: &str) -> Result<String> {
        let parsed = self.prepare(url).await?;

        let response = self
            .client
            .get(parsed.as_str())
            .timeout(self.config.title_timeout)
            .send()
            .await
            .map_err(|e| RetrievalError::Fetch(format!("Failed to fetch {}: {}", url, e)))?;

        let html = response
            .text()
            .await
            .map_err(|e| RetrievalError::Fetch(format!("Failed to read {}: {}", url, e)))?;

        // Fall back to the URL when the page has no usable title.
        Ok(self.extract_title(&html).unwrap_or_else(|| url.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Fetcher
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted page fetcher for tests.
#[derive(Default)]
pub struct MockPageFetcher {
    pages: Mutex<HashMap<String, (String, String)>>,
}

impl MockPageFetcher {
    /// Create an empty mock; every fetch fails until pages are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page by URL with its text content and title.
    pub fn with_page(
        self,
        url: impl Into<String>,
        text: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        self.pages
            .lock()
            .insert(url.into(), (text.into(), title.into()));
        self
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.pages
            .lock()
            .get(url)
            .map(|(text, _)| text.clone())
            .ok_or_else(|| RetrievalError::Fetch(format!("mock: no page for {}", url)))
    }

    async fn fetch_title(&self, url: &str) -> Result<String> {
        self.pages
            .lock()
            .get(url)
            .map(|(_, title)| title.clone())
            .ok_or_else(|| RetrievalError::Fetch(format!("mock: no page for {}", url)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
