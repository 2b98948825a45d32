//! Shared types for the Taliesin research agent.
//!
//! This crate defines the vocabulary spoken by every other crate in the
//! workspace: run identifiers, the event variants streamed to clients,
//! and the retrieval data model (search results and document chunks).

pub mod event;
pub mod retrieval;
pub mod run;

pub use event::{Envelope, Event, ToolKind};
pub use retrieval::{DocumentChunk, SearchResult};
pub use run::RunId;
