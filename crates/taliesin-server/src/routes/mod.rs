//! HTTP route handlers.

pub mod health;
pub mod query;
pub mod stream;

pub use health::{HealthResponse, health_handler};
pub use query::{QueryRequest, QueryResponse, query_handler};
pub use stream::stream_handler;
