//! HTTP API and SSE streaming server for Taliesin.
//!
//! The transport layer over the agent core: clients submit a query, get a
//! run id back immediately, and attach to the run's server-sent event
//! stream to watch retrieval progress, reasoning, and the final answer.
//!
//! # Example
//!
//! ```ignore
//! use taliesin_server::{Server, ServerConfig};
//!
//! let server = Server::new(agent, ServerConfig::default());
//! server.run().await?;
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use routes::{HealthResponse, QueryRequest, QueryResponse};
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use taliesin_agent::Agent;

/// The Taliesin HTTP/SSE server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server with the given agent and configuration.
    pub fn new(agent: Arc<Agent>, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(agent, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(routes::health_handler))
            .route("/v1/query", post(routes::query_handler))
            .route("/v1/stream/{run_id}", get(routes::stream_handler));

        let router = if self.state.config.request_logging {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        };

        router.with_state(self.state.clone())
    }

    /// Run the server on the configured bind address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!("Starting server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
