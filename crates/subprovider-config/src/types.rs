//! Configuration types for the subprovider service.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8545";
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_CHAIN_ID: u64 = 1;
pub const DEFAULT_MNEMONIC_PATH: &str = "m/44'/60'/0'/0";
pub const DEFAULT_NUMBER_OF_ACCOUNTS: usize = 10;
pub const DEFAULT_ADDRESS_SEARCH_LIMIT: usize = 1000;

fn default_true() -> bool {
	true
}

fn default_listen() -> String {
	DEFAULT_LISTEN.to_string()
}

fn default_timeout_ms() -> u64 {
	DEFAULT_TIMEOUT_MS
}

fn default_chain_id() -> u64 {
	DEFAULT_CHAIN_ID
}

fn default_mnemonic_path() -> String {
	DEFAULT_MNEMONIC_PATH.to_string()
}

fn default_number_of_accounts() -> usize {
	DEFAULT_NUMBER_OF_ACCOUNTS
}

fn default_address_search_limit() -> usize {
	DEFAULT_ADDRESS_SEARCH_LIMIT
}

fn default_log_level() -> String {
	"info".to_string()
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
	/// Which optional middlewares run
	#[serde(default)]
	pub engine: EngineConfig,
	/// Signing backend
	#[serde(default)]
	pub wallet: WalletConfig,
	/// Nodes behind the failover group
	#[serde(default)]
	pub upstream: UpstreamConfig,
	/// JSON-RPC listener
	#[serde(default)]
	pub server: ServerConfig,
	#[serde(default)]
	pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
	/// Serve pending nonces from the local cache
	#[serde(default = "default_true")]
	pub nonce_tracking: bool,
	/// Log every request and result at debug level
	#[serde(default)]
	pub debug_payloads: bool,
	/// Answer `eth_estimateGas` with this constant instead of asking the node
	#[serde(default)]
	pub fixed_gas_estimate: Option<u64>,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			nonce_tracking: true,
			debug_payloads: false,
			fixed_gas_estimate: None,
		}
	}
}

/// Signing backend, selected by `type`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WalletConfig {
	PrivateKey {
		private_key: String,
		#[serde(default = "default_chain_id")]
		chain_id: u64,
	},
	Mnemonic {
		mnemonic: String,
		#[serde(default = "default_mnemonic_path")]
		base_derivation_path: String,
		#[serde(default = "default_number_of_accounts")]
		number_of_accounts: usize,
		#[serde(default = "default_address_search_limit")]
		address_search_limit: usize,
		#[serde(default = "default_chain_id")]
		chain_id: u64,
	},
	/// No accounts; signing requests fail.
	#[default]
	Empty,
}

impl WalletConfig {
	pub fn kind(&self) -> &'static str {
		match self {
			Self::PrivateKey { .. } => "private_key",
			Self::Mnemonic { .. } => "mnemonic",
			Self::Empty => "empty",
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
	/// Endpoint URLs in failover order
	#[serde(default)]
	pub endpoints: Vec<String>,
	/// Per-request timeout
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
	fn default() -> Self {
		Self {
			endpoints: Vec::new(),
			timeout_ms: DEFAULT_TIMEOUT_MS,
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
	/// Socket address to bind
	#[serde(default = "default_listen")]
	pub listen: String,
	/// Allow cross-origin requests from browsers
	#[serde(default)]
	pub cors: bool,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen: default_listen(),
			cors: false,
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
	#[serde(default = "default_log_level")]
	pub level: String,
	/// Emit JSON lines instead of human readable output
	#[serde(default)]
	pub json: bool,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: default_log_level(),
			json: false,
		}
	}
}
