//! The orchestrating agent.
//!
//! Turns a submitted query into retrieved, embedded context while narrating
//! every step as events, then hands the assembled context to the
//! completion-stream adapter. Collaborator failures during retrieval are
//! downgraded to empty results; only the completion call itself can end a
//! run with an `error`.

use std::sync::Arc;

use taliesin_llm::{ChatMessage, CompletionRequest, SharedChatBackend};
use taliesin_retrieval::{PageFetcher, SearchProvider, VectorStore, favicon_url};
use taliesin_types::{DocumentChunk, Event, RunId, ToolKind};

use crate::completion::stream_completion;
use crate::config::AgentConfig;
use crate::registry::RunRegistry;

/// System prompt for the answer-generation stream.
const ANALYST_SYSTEM_PROMPT: &str = "\
You are an expert research analyst AI. I have already searched the web and scraped relevant \
content for you. Analyze the provided context and give a comprehensive answer.\n\n\
IMPORTANT RESPONSE FORMAT:\n\
- Start each reasoning step with 'THOUGHT: ' followed by your analysis\n\
- Start your final answer with 'FINAL: ' followed by the complete response\n\
- Use multiple THOUGHT: lines to show your reasoning process\n\
- End with one FINAL: section that directly answers the user's question\n\
- Be thorough but concise in your thoughts\n\n\
Example format:\n\
THOUGHT: Analyzing the first source about quantum developments...\n\
THOUGHT: The second source discusses cybersecurity implications...\n\
THOUGHT: Combining these insights reveals...\n\
FINAL: Based on my analysis, the latest developments in quantum computing include...\n\n\
The research has already been completed. Your job is to analyze and synthesize the information.";

/// Leading interrogative phrases stripped by the heuristic query rewrite.
const INTERROGATIVE_PREFIXES: &[&str] = &[
    "tell me about",
    "give me",
    "describe",
    "explain",
    "what",
    "who",
    "when",
    "where",
    "why",
    "how",
];

/// A pending citation collected during retrieval.
#[derive(Debug, Clone)]
struct Citation {
    url: String,
    title: String,
    favicon: Option<String>,
}

/// The orchestrating agent, shared across all runs.
pub struct Agent {
    chat: SharedChatBackend,
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<VectorStore>,
    registry: RunRegistry,
    config: AgentConfig,
}

impl Agent {
    /// Create an agent from its collaborators.
    pub fn new(
        chat: SharedChatBackend,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<VectorStore>,
        registry: RunRegistry,
    ) -> Self {
        Self {
            chat,
            search,
            fetcher,
            store,
            registry,
            config: AgentConfig::default(),
        }
    }

    /// Replace the default configuration.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// The run registry this agent emits into.
    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// The agent configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Process a query end to end, as the run's background task.
    ///
    /// The run must already be registered. Exactly one terminal event is
    /// emitted: `complete` on success (by the completion adapter), `error`
    /// here on any fatal failure.
    pub async fn process_query(&self, run_id: RunId, query: &str, model: Option<&str>) {
        let chat_model = model.unwrap_or(&self.config.chat_model).to_string();
        tracing::info!(%run_id, query, model = %chat_model, "Starting run");

        if let Err(e) = self.run(run_id, query, &chat_model).await {
            tracing::error!(%run_id, error = %e, "Run failed");
            self.registry.emit(run_id, Event::error(e.to_string()));
        }

        self.registry.mark_inactive(run_id);
    }

    async fn run(&self, run_id: RunId, query: &str, chat_model: &str) -> crate::error::Result<()> {
        let mut fetch_count = 0usize;
        let mut search_count = 0usize;
        let mut citations: Vec<Citation> = Vec::new();

        // Step 1: rewrite the query for search effectiveness.
        let rewritten = self.rewrite_query(query).await;
        self.registry.emit(
            run_id,
            Event::thought(format!("Rewriting query for search: '{}'", rewritten)),
        );

        // Step 2: search.
        self.registry.emit(
            run_id,
            Event::tool_use(
                ToolKind::GoogleSearch,
                "Searching Google",
                format!("Query: '{}'", rewritten),
            ),
        );

        let results = if search_count < self.config.max_search_queries {
            search_count += 1;
            match self
                .search
                .search(&rewritten, self.config.search_results_per_query)
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!(%run_id, error = %e, "Search failed, continuing with no results");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        self.registry.emit(
            run_id,
            Event::tool_result(
                ToolKind::GoogleSearch,
                format!("Found {} search results", results.len()),
            ),
        );

        // Step 3: fetch and embed the top results.
        for result in results.iter().take(self.config.pages_per_query) {
            if fetch_count >= self.config.max_page_fetches {
                break;
            }

            let favicon = favicon_url(&result.url);

            self.registry.emit(
                run_id,
                Event::tool_use(
                    ToolKind::WebScraper,
                    "Scraping webpage",
                    format!("URL: {}", result.url),
                ),
            );
            self.registry.emit(
                run_id,
                Event::Page {
                    url: result.url.clone(),
                    title: None,
                    favicon: favicon.clone(),
                },
            );

            let content = match self.fetcher.fetch_text(&result.url).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(%run_id, url = %result.url, error = %e, "Page fetch failed");
                    self.registry.emit(
                        run_id,
                        Event::tool_result(
                            ToolKind::WebScraper,
                            format!("Failed to scrape content from {}", result.url),
                        ),
                    );
                    continue;
                }
            };
            fetch_count += 1;

            let title = self
                .fetcher
                .fetch_title(&result.url)
                .await
                .unwrap_or_else(|_| result.url.clone());

            self.registry.emit(
                run_id,
                Event::tool_result(
                    ToolKind::WebScraper,
                    format!("Successfully scraped content from {}", title),
                ),
            );

            self.registry.emit(
                run_id,
                Event::tool_use(
                    ToolKind::Embedding,
                    "Creating embeddings",
                    format!("Processing content from {}", title),
                ),
            );

            let chunks = match self
                .store
                .embed_and_store(&content, &result.url, &title)
                .await
            {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!(%run_id, url = %result.url, error = %e, "Embedding failed");
                    Vec::new()
                }
            };

            if !chunks.is_empty() {
                self.registry.emit(
                    run_id,
                    Event::tool_result(
                        ToolKind::Embedding,
                        format!("Created {} text embeddings", chunks.len()),
                    ),
                );
                citations.push(Citation {
                    url: result.url.clone(),
                    title,
                    favicon,
                });
            }
        }

        tracing::debug!(%run_id, search_count, fetch_count, "Retrieval finished");

        // Step 4: similarity search with the original query, not the rewrite.
        self.registry.emit(
            run_id,
            Event::tool_use(
                ToolKind::Embedding,
                "Searching embeddings",
                format!("Finding relevant context for: '{}'", query),
            ),
        );

        let relevant_chunks = match self
            .store
            .search_similar(query, self.config.top_k, self.config.max_per_domain)
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(%run_id, error = %e, "Similarity search failed");
                Vec::new()
            }
        };

        self.registry.emit(
            run_id,
            Event::tool_result(
                ToolKind::Embedding,
                format!("Found {} relevant text chunks", relevant_chunks.len()),
            ),
        );

        // Step 5: emit citations and hand off to the completion stream.
        self.registry
            .emit(run_id, Event::thought("Generating comprehensive answer..."));

        for citation in &citations {
            self.registry.emit(
                run_id,
                Event::Citation {
                    url: citation.url.clone(),
                    title: Some(citation.title.clone()),
                    favicon: citation.favicon.clone(),
                },
            );
        }

        let context_text = build_context(&relevant_chunks);
        tracing::debug!(
            %run_id,
            context_words = context_text.split_whitespace().count(),
            "Assembled context"
        );

        let messages = vec![
            ChatMessage::system(ANALYST_SYSTEM_PROMPT),
            ChatMessage::user(format!("Context:\n{}\n\nQuestion: {}", context_text, query)),
        ];

        stream_completion(
            self.chat.as_ref(),
            &self.registry,
            run_id,
            messages,
            chat_model,
            &self.config,
        )
        .await
    }

    /// Rewrite the query for search via the cheap model, falling back to the
    /// deterministic heuristic on any failure.
    async fn rewrite_query(&self, query: &str) -> String {
        let prompt = format!(
            "Rephrase the following question to maximize the chance of finding relevant \
             information in a web search. Do not answer the question, do not make it generic \
             or SEO-optimized. Just reword it naturally for search.\n\n\
             Question: {}\nRephrased: ",
            query
        );

        let request = CompletionRequest::new(
            &self.config.rewrite_model,
            vec![ChatMessage::user(prompt)],
            64,
        )
        .with_temperature(0.4);

        match self.chat.complete(request).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => rewritten.trim().to_string(),
            Ok(_) => heuristic_rewrite(query),
            Err(e) => {
                tracing::warn!(error = %e, "Model rewrite failed, falling back to heuristic");
                heuristic_rewrite(query)
            }
        }
    }
}

/// Deterministic query rewrite: strip leading interrogatives and trailing
/// punctuation, pad very short queries with generic qualifier terms.
fn heuristic_rewrite(query: &str) -> String {
    let mut query = query.trim().to_string();

    for prefix in INTERROGATIVE_PREFIXES {
        let matches = query.len() >= prefix.len()
            && query.is_char_boundary(prefix.len())
            && query[..prefix.len()].eq_ignore_ascii_case(prefix);
        if matches {
            let after = &query[prefix.len()..];
            // Only strip whole words, not prefixes of longer words.
            if after.is_empty() || after.starts_with(|c: char| !c.is_alphanumeric()) {
                query = after.trim_start().to_string();
                break;
            }
        }
    }

    query = query.trim_end_matches(['?', '!', '.']).trim().to_string();

    if query.split_whitespace().count() < 5 {
        query.push_str(" information details overview summary");
        query = query.trim().to_string();
    }

    query
}

/// Assemble the context block handed to the model.
fn build_context(chunks: &[DocumentChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "Source: {} ({})\nContent: {}",
                chunk.title, chunk.url, chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
