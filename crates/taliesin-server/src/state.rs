//! Application state shared across handlers.

use std::sync::Arc;

use taliesin_agent::{Agent, RunRegistry};

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The agent instance.
    pub agent: Arc<Agent>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(agent: Arc<Agent>, config: ServerConfig) -> Self {
        Self {
            agent,
            config: Arc::new(config),
        }
    }

    /// The run registry behind the agent.
    pub fn registry(&self) -> &RunRegistry {
        self.agent.registry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taliesin_llm::{MockChatBackend, MockEmbedder};
    use taliesin_retrieval::{MockPageFetcher, MockSearch, VectorStore};

    fn test_state() -> AppState {
        let agent = Agent::new(
            Arc::new(MockChatBackend::with_text("FINAL: ok\n")),
            Arc::new(MockSearch::empty()),
            Arc::new(MockPageFetcher::new()),
            Arc::new(VectorStore::new(Arc::new(MockEmbedder::default()))),
            RunRegistry::new(),
        );
        AppState::new(Arc::new(agent), ServerConfig::default())
    }

    #[test]
    fn test_state_exposes_registry() {
        let state = test_state();
        assert_eq!(state.registry().run_count(), 0);
    }

    #[test]
    fn test_state_is_cheaply_cloneable() {
        let state = test_state();
        let clone = state.clone();
        assert!(Arc::ptr_eq(&state.agent, &clone.agent));
    }
}
