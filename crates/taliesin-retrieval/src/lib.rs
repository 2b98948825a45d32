//! Web search, page fetching, and vector retrieval for Taliesin.
//!
//! Collaborators live behind narrow traits ([`SearchProvider`],
//! [`PageFetcher`]) so the agent can be driven by real providers in
//! production and scripted ones in tests. The [`VectorStore`] keeps embedded
//! page chunks in memory and answers cosine-similarity queries with a
//! per-domain diversity cap.

pub mod error;
pub mod fetch;
pub mod search;
pub mod store;
pub mod throttle;

pub use error::{Result, RetrievalError};
pub use fetch::{FetchConfig, HttpPageFetcher, MockPageFetcher, PageFetcher, domain_of, favicon_url};
pub use search::{DuckDuckGoSearch, MockSearch, SearchProvider, SerperSearch};
pub use store::{StoreConfig, VectorStore, cosine_similarity};
pub use throttle::{CallThrottle, DomainThrottle};
