//! JSON-RPC service around the subprovider engine.
//!
//! - `pipeline`: builds the middleware pipeline from configuration
//! - `server`: axum endpoint accepting single and batch requests
//! - `telemetry`: tracing subscriber setup

pub mod pipeline;
pub mod server;
pub mod telemetry;
