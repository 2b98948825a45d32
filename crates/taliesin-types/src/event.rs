//! Event types streamed to clients during a run.
//!
//! Every run produces an ordered sequence of [`Event`]s wrapped in an
//! [`Envelope`] carrying the emission timestamp and the run identifier.
//! The sequence always ends with exactly one terminal event (`complete`
//! or `error`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::RunId;

// ─────────────────────────────────────────────────────────────────────────────
// Tool Kind
// ─────────────────────────────────────────────────────────────────────────────

/// The tool a `tool_use`/`tool_result` event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Web search collaborator.
    GoogleSearch,
    /// Page fetching / content extraction collaborator.
    WebScraper,
    /// Embedding / similarity search collaborator.
    Embedding,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ToolKind::GoogleSearch => "google_search",
            ToolKind::WebScraper => "web_scraper",
            ToolKind::Embedding => "embedding",
        };
        write!(f, "{}", name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────────────────────────────────────

/// A discrete, typed progress or result notification for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A reasoning step surfaced to the client.
    Thought {
        /// The thought text.
        text: String,
    },
    /// A page the agent is about to read.
    Page {
        /// Page URL.
        url: String,
        /// Page title, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Favicon URL for the page's domain.
        #[serde(skip_serializing_if = "Option::is_none")]
        favicon: Option<String>,
    },
    /// A raw output token delta.
    Token {
        /// The token text.
        text: String,
    },
    /// A token delta belonging to the final answer.
    FinalAnswerToken {
        /// The token text.
        text: String,
    },
    /// A final answer segment.
    FinalAnswer {
        /// The answer text.
        text: String,
    },
    /// A source the answer draws on.
    Citation {
        /// Source URL.
        url: String,
        /// Source title, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Favicon URL for the source's domain.
        #[serde(skip_serializing_if = "Option::is_none")]
        favicon: Option<String>,
    },
    /// A tool invocation is starting.
    ToolUse {
        /// Which tool.
        tool: ToolKind,
        /// Human-readable action description.
        action: String,
        /// Additional details about the action.
        details: String,
    },
    /// A tool invocation finished.
    ToolResult {
        /// Which tool.
        tool: ToolKind,
        /// Human-readable result description.
        result: String,
    },
    /// The run failed. Terminal.
    Error {
        /// Human-readable error message.
        message: String,
    },
    /// The run finished successfully. Terminal.
    Complete {
        /// Closing message.
        text: String,
    },
    /// Synthetic keep-alive, yielded by the channel on read timeout.
    /// Never persisted and never counted toward ordering.
    Heartbeat,
}

impl Event {
    /// Create a thought event.
    pub fn thought(text: impl Into<String>) -> Self {
        Self::Thought { text: text.into() }
    }

    /// Create a page event.
    pub fn page(url: impl Into<String>, favicon: impl Into<String>) -> Self {
        Self::Page {
            url: url.into(),
            title: None,
            favicon: Some(favicon.into()),
        }
    }

    /// Create a raw token event.
    pub fn token(text: impl Into<String>) -> Self {
        Self::Token { text: text.into() }
    }

    /// Create a final-answer token event.
    pub fn final_answer_token(text: impl Into<String>) -> Self {
        Self::FinalAnswerToken { text: text.into() }
    }

    /// Create a final answer event.
    pub fn final_answer(text: impl Into<String>) -> Self {
        Self::FinalAnswer { text: text.into() }
    }

    /// Create a citation event.
    pub fn citation(
        url: impl Into<String>,
        title: impl Into<String>,
        favicon: impl Into<String>,
    ) -> Self {
        Self::Citation {
            url: url.into(),
            title: Some(title.into()),
            favicon: Some(favicon.into()),
        }
    }

    /// Create a tool use event.
    pub fn tool_use(tool: ToolKind, action: impl Into<String>, details: impl Into<String>) -> Self {
        Self::ToolUse {
            tool,
            action: action.into(),
            details: details.into(),
        }
    }

    /// Create a tool result event.
    pub fn tool_result(tool: ToolKind, result: impl Into<String>) -> Self {
        Self::ToolResult {
            tool,
            result: result.into(),
        }
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Create a complete event.
    pub fn complete(text: impl Into<String>) -> Self {
        Self::Complete { text: text.into() }
    }

    /// Returns true if this event ends the stream (`complete` or `error`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Complete { .. } | Event::Error { .. })
    }

    /// Returns true if this is a synthetic heartbeat.
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Event::Heartbeat)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// An [`Event`] stamped with its emission time and run identifier.
///
/// Serializes to the flat wire shape
/// `{type, ...fields, timestamp, run_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The event payload, flattened into the envelope.
    #[serde(flatten)]
    pub event: Event,
    /// Emission time, monotonically non-decreasing within a run.
    pub timestamp: DateTime<Utc>,
    /// The run this event belongs to.
    pub run_id: RunId,
}

impl Envelope {
    /// Stamp an event with the current time for the given run.
    pub fn stamp(run_id: RunId, event: Event) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            run_id,
        }
    }

    /// Returns true if the wrapped event is terminal.
    pub fn is_terminal(&self) -> bool {
        self.event.is_terminal()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thought_serialization() {
        let event = Event::thought("analyzing sources");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "thought");
        assert_eq!(json["text"], "analyzing sources");
    }

    #[test]
    fn test_tool_use_serialization() {
        let event = Event::tool_use(ToolKind::GoogleSearch, "Searching Google", "Query: 'rust'");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["tool"], "google_search");
        assert_eq!(json["action"], "Searching Google");
    }

    #[test]
    fn test_tool_kind_names() {
        assert_eq!(ToolKind::GoogleSearch.to_string(), "google_search");
        assert_eq!(ToolKind::WebScraper.to_string(), "web_scraper");
        assert_eq!(ToolKind::Embedding.to_string(), "embedding");
    }

    #[test]
    fn test_page_omits_missing_title() {
        let event = Event::page("https://example.com", "https://example.com/favicon.ico");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "page");
        assert!(json.get("title").is_none());
        assert!(json.get("favicon").is_some());
    }

    #[test]
    fn test_final_answer_token_tag() {
        let event = Event::final_answer_token("4");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "final_answer_token");
        let token = serde_json::to_value(Event::token("4")).unwrap();
        assert_eq!(token["type"], "token");
    }

    #[test]
    fn test_terminal_events() {
        assert!(Event::complete("Answer complete").is_terminal());
        assert!(Event::error("boom").is_terminal());
        assert!(!Event::thought("hm").is_terminal());
        assert!(!Event::Heartbeat.is_terminal());
    }

    #[test]
    fn test_envelope_wire_shape() {
        let run_id = RunId::new();
        let envelope = Envelope::stamp(run_id, Event::final_answer("4"));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "final_answer");
        assert_eq!(json["text"], "4");
        assert_eq!(json["run_id"], run_id.to_string());
        // Timestamp is an ISO-8601 string.
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = Envelope::stamp(
            RunId::new(),
            Event::citation("https://example.com", "Example", "https://f.ico"),
        );
        let json = serde_json::to_string(&envelope).unwrap();
        let restored: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, envelope);
    }
}
