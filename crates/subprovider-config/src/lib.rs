//! Configuration for the subprovider service.

pub mod loader;
pub mod types;

pub use loader::{load_config, ConfigLoader};
pub use types::*;
