//! Pooled MCP search client: connection cache, payload unwrapping and item normalisation.

pub mod client;
pub mod config;
pub mod normalize;
pub mod pool;
pub mod rmcp_transport;
pub mod unwrap;

pub use client::SearchClient;
pub use config::ClientConfig;
pub use pool::{CachePolicy, SessionPool};
pub use rmcp_transport::RmcpConnector;
