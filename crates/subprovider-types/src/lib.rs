//! Shared types for the subprovider engine.
//!
//! Everything that crosses a crate boundary lives here: the JSON-RPC
//! envelopes, the closed set of intercepted method names, typed transaction
//! parameters and the `ProviderError` taxonomy.

pub mod envelope;
pub mod errors;
pub mod method;
pub mod transaction;
pub mod utils;

pub use envelope::{JsonRpcError, RequestEnvelope, ResponseEnvelope, JSONRPC_VERSION};
pub use errors::{ProviderError, Result};
pub use method::RpcMethod;
pub use transaction::TxParams;

// Re-export commonly used ethereum types
pub use ethers_core::types::{Address, Bytes, Signature, U256, U64};
