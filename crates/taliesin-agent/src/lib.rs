//! Run-scoped event streaming core for Taliesin.
//!
//! A run is one query's end-to-end processing session. This crate owns the
//! whole pipeline between query submission and the event stream a client
//! consumes:
//!
//! - [`RunRegistry`]: per-run event channels with heartbeat reads and
//!   terminal-event cleanup;
//! - [`ReasoningClassifier`]: the line state machine separating `THOUGHT:`
//!   reasoning from `FINAL:` answers;
//! - the completion-stream adapter, which drives the chat backend and guarantees
//!   exactly one terminal event per run;
//! - [`Agent`]: the orchestrator narrating search, scraping, and embedding
//!   progress while assembling context for the model.

pub mod classifier;
pub mod completion;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;

pub use classifier::{ClassifiedLine, ReasoningClassifier};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use orchestrator::Agent;
pub use registry::{EventStream, RunRegistry};
