//! The `serve` command: wire up collaborators and run the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use taliesin_agent::{Agent, AgentConfig, RunRegistry};
use taliesin_llm::{OpenAiBackend, OpenAiEmbedder, SharedChatBackend, SharedEmbedder};
use taliesin_retrieval::{
    DuckDuckGoSearch, HttpPageFetcher, SearchProvider, SerperSearch, VectorStore,
};
use taliesin_server::{Server, ServerConfig};

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind the server to
    #[arg(long, env = "TALIESIN_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Default chat model for answer generation
    #[arg(long, env = "TALIESIN_CHAT_MODEL", default_value = "o4-mini")]
    pub model: String,

    /// Model used for search-query rewriting
    #[arg(long, env = "TALIESIN_REWRITE_MODEL", default_value = "gpt-4.1-nano")]
    pub rewrite_model: String,

    /// Heartbeat interval in seconds for idle event streams
    #[arg(long, env = "TALIESIN_HEARTBEAT_SECS", default_value_t = 1)]
    pub heartbeat_secs: u64,
}

/// Run the serve command.
pub async fn run(args: ServeArgs) -> Result<()> {
    let chat: SharedChatBackend = Arc::new(
        OpenAiBackend::from_env().context("chat backend requires OPENAI_API_KEY")?,
    );
    let embedder: SharedEmbedder = Arc::new(
        OpenAiEmbedder::from_env().context("embedder requires OPENAI_API_KEY")?,
    );

    // Serper when a key is configured, DuckDuckGo otherwise.
    let search: Arc<dyn SearchProvider> = match SerperSearch::from_env() {
        Ok(serper) => {
            info!("Using Serper search provider");
            Arc::new(serper)
        }
        Err(_) => {
            info!("SERPER_API_KEY not set, using DuckDuckGo search provider");
            Arc::new(DuckDuckGoSearch::new()?)
        }
    };

    let fetcher = Arc::new(HttpPageFetcher::new()?);
    let store = Arc::new(VectorStore::new(embedder));

    let heartbeat = Duration::from_secs(args.heartbeat_secs.max(1));
    let registry = RunRegistry::with_heartbeat_interval(heartbeat);

    let agent_config = AgentConfig::default()
        .with_chat_model(&args.model)
        .with_rewrite_model(&args.rewrite_model)
        .with_heartbeat_interval(heartbeat);

    let agent = Arc::new(
        Agent::new(chat, search, fetcher, store, registry).with_config(agent_config),
    );

    let server_config = ServerConfig::new().with_bind_address(args.bind);
    let server = Server::new(agent, server_config);

    info!(bind = %args.bind, model = %args.model, "Taliesin ready");
    server.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ServeArgs,
    }

    #[test]
    fn test_default_args() {
        let cli = TestCli::parse_from(["test"]);
        assert_eq!(cli.args.bind.port(), 8000);
        assert_eq!(cli.args.model, "o4-mini");
        assert_eq!(cli.args.heartbeat_secs, 1);
    }

    #[test]
    fn test_overridden_args() {
        let cli = TestCli::parse_from([
            "test",
            "--bind",
            "0.0.0.0:9000",
            "--model",
            "gpt-4",
            "--heartbeat-secs",
            "5",
        ]);
        assert_eq!(cli.args.bind.port(), 9000);
        assert_eq!(cli.args.model, "gpt-4");
        assert_eq!(cli.args.heartbeat_secs, 5);
    }
}
