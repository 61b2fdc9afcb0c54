//! Middleware pipeline for Ethereum JSON-RPC requests.
//!
//! An [`Engine`] walks an ordered list of [`Middleware`]s. Each one answers the
//! request, forwards it, or forwards it and observes the final result through a
//! completion hook. Middlewares that need to issue their own sub-requests get an
//! [`Emitter`] bound to the engine that owns them.

pub mod engine;
pub mod implementations;
pub mod middleware;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use engine::{Emitter, Engine, EngineBuilder, SubPipeline};
pub use implementations::debug::DebugMiddleware;
pub use implementations::fixed_gas::FixedGasEstimateMiddleware;
pub use middleware::{CompletionHook, Middleware, Outcome, Transport, TransportMiddleware};
