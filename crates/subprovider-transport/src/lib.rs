//! Terminal transports: a JSON-RPC over HTTP client and an ordered failover group.

pub mod failover;
pub mod http;

pub use failover::Failover;
pub use http::{HttpTransport, DEFAULT_TIMEOUT_MS};
