//! Configuration loading from files and environment.

use crate::types::*;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

pub const ENV_PRIVATE_KEY: &str = "SUBPROVIDER_PRIVATE_KEY";
pub const ENV_MNEMONIC: &str = "SUBPROVIDER_MNEMONIC";
pub const ENV_UPSTREAM_URLS: &str = "SUBPROVIDER_UPSTREAM_URLS";
pub const ENV_LISTEN: &str = "SUBPROVIDER_LISTEN";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
	/// Load, substitute, override and validate a configuration file.
	///
	/// The format follows the extension: `.toml`, `.json`, `.yaml` or `.yml`.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
		let path = path.as_ref();
		info!("Loading configuration from {:?}", path);

		let raw = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {:?}", path))?;
		let contents = Self::substitute_env_vars(&raw)?;

		let mut config = match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Self::from_toml(&contents)?,
			Some("json") => Self::from_json(&contents)?,
			Some("yaml") | Some("yml") => Self::from_yaml(&contents)?,
			_ => anyhow::bail!("Unsupported config format: {:?}", path),
		};

		Self::apply_env_overrides(&mut config)?;
		Self::validate(&config)?;
		Ok(config)
	}

	/// Load from TOML string
	pub fn from_toml(contents: &str) -> Result<Config> {
		toml::from_str(contents).map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))
	}

	/// Load from JSON string
	pub fn from_json(contents: &str) -> Result<Config> {
		serde_json::from_str(contents).context("Failed to parse JSON")
	}

	/// Load from YAML string
	pub fn from_yaml(contents: &str) -> Result<Config> {
		serde_yaml::from_str(contents).context("Failed to parse YAML")
	}

	/// Replaces `${VAR}` references with values from the process environment.
	pub fn substitute_env_vars(contents: &str) -> Result<String> {
		Self::substitute_with(contents, |name| std::env::var(name).ok())
	}

	/// Replaces `${VAR}` references using `lookup`; an unknown variable is an error.
	pub fn substitute_with<F>(contents: &str, lookup: F) -> Result<String>
	where
		F: Fn(&str) -> Option<String>,
	{
		let pattern = Regex::new(r"\$\{([^}]+)\}").context("Invalid substitution pattern")?;
		let mut result = contents.to_string();

		for capture in pattern.captures_iter(contents) {
			let reference = &capture[0];
			let name = &capture[1];
			let value = lookup(name)
				.with_context(|| format!("Environment variable not found: {}", name))?;
			result = result.replace(reference, &value);
		}

		Ok(result)
	}

	/// Apply `SUBPROVIDER_*` overrides from the process environment
	pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
		Self::apply_overrides(config, |name| std::env::var(name).ok())
	}

	pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(key) = lookup(ENV_PRIVATE_KEY) {
			debug!("Overriding private key from environment");
			config.wallet = match &config.wallet {
				WalletConfig::PrivateKey { chain_id, .. } => WalletConfig::PrivateKey {
					private_key: key,
					chain_id: *chain_id,
				},
				WalletConfig::Empty => WalletConfig::PrivateKey {
					private_key: key,
					chain_id: DEFAULT_CHAIN_ID,
				},
				WalletConfig::Mnemonic { .. } => {
					anyhow::bail!("{} is set but the wallet is a mnemonic wallet", ENV_PRIVATE_KEY)
				}
			};
		}

		if let Some(phrase) = lookup(ENV_MNEMONIC) {
			debug!("Overriding mnemonic from environment");
			if config.wallet == WalletConfig::Empty {
				config.wallet = WalletConfig::Mnemonic {
					mnemonic: String::new(),
					base_derivation_path: DEFAULT_MNEMONIC_PATH.to_string(),
					number_of_accounts: DEFAULT_NUMBER_OF_ACCOUNTS,
					address_search_limit: DEFAULT_ADDRESS_SEARCH_LIMIT,
					chain_id: DEFAULT_CHAIN_ID,
				};
			}
			match &mut config.wallet {
				WalletConfig::Mnemonic { mnemonic, .. } => *mnemonic = phrase,
				WalletConfig::Empty | WalletConfig::PrivateKey { .. } => {
					anyhow::bail!("{} is set but the wallet is a private key wallet", ENV_MNEMONIC)
				}
			}
		}

		if let Some(urls) = lookup(ENV_UPSTREAM_URLS) {
			debug!("Overriding upstream endpoints from environment");
			config.upstream.endpoints = urls
				.split(',')
				.map(str::trim)
				.filter(|url| !url.is_empty())
				.map(String::from)
				.collect();
		}

		if let Some(listen) = lookup(ENV_LISTEN) {
			debug!("Overriding listen address from environment");
			config.server.listen = listen;
		}

		Ok(())
	}

	/// Validate configuration
	pub fn validate(config: &Config) -> Result<()> {
		if config.upstream.endpoints.is_empty() {
			anyhow::bail!("At least one upstream endpoint must be configured");
		}

		for endpoint in &config.upstream.endpoints {
			if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
				anyhow::bail!("Upstream endpoint must be an http(s) URL: {}", endpoint);
			}
		}

		if config.upstream.timeout_ms == 0 {
			anyhow::bail!("Upstream timeout must be greater than zero");
		}

		match &config.wallet {
			WalletConfig::PrivateKey { private_key, .. } => {
				let digits = private_key.strip_prefix("0x").unwrap_or(private_key);
				if digits.len() != 64 {
					anyhow::bail!("Private key must be 64 hex characters (32 bytes)");
				}
				if hex::decode(digits).is_err() {
					anyhow::bail!("Private key must be valid hexadecimal");
				}
			}
			WalletConfig::Mnemonic {
				mnemonic,
				number_of_accounts,
				address_search_limit,
				..
			} => {
				if mnemonic.trim().is_empty() {
					anyhow::bail!("Mnemonic must not be empty");
				}
				if *number_of_accounts == 0 {
					anyhow::bail!("number_of_accounts must be at least 1");
				}
				if number_of_accounts > address_search_limit {
					anyhow::bail!(
						"number_of_accounts ({}) exceeds address_search_limit ({})",
						number_of_accounts,
						address_search_limit
					);
				}
			}
			WalletConfig::Empty => {}
		}

		config
			.server
			.listen
			.parse::<std::net::SocketAddr>()
			.with_context(|| format!("Invalid listen address: {}", config.server.listen))?;

		Ok(())
	}
}

/// Load configuration from standard locations
pub fn load_config() -> Result<Config> {
	// 1. Environment variable CONFIG_FILE
	// 2. ./config.toml
	// 3. ./config/subprovider.toml
	if let Ok(path) = std::env::var("CONFIG_FILE") {
		return ConfigLoader::from_file(path);
	}

	for path in ["./config.toml", "./config/subprovider.toml"] {
		if Path::new(path).exists() {
			return ConfigLoader::from_file(path);
		}
	}

	anyhow::bail!("No configuration file found; set CONFIG_FILE or create ./config.toml")
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

	fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| vars.get(name).cloned()
	}

	fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
		let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
		file.write_all(contents.as_bytes()).unwrap();
		file
	}

	#[test]
	fn test_defaults() {
		let config = ConfigLoader::from_toml(
			r#"
[upstream]
endpoints = ["http://localhost:8545"]
"#,
		)
		.unwrap();

		assert!(config.engine.nonce_tracking);
		assert!(!config.engine.debug_payloads);
		assert_eq!(config.engine.fixed_gas_estimate, None);
		assert_eq!(config.wallet, WalletConfig::Empty);
		assert_eq!(config.upstream.timeout_ms, 20_000);
		assert_eq!(config.server.listen, "127.0.0.1:8545");
		assert_eq!(config.logging.level, "info");
		assert!(ConfigLoader::validate(&config).is_ok());
	}

	#[test]
	fn test_toml_parsing() {
		let config = ConfigLoader::from_toml(&format!(
			r#"
[engine]
nonce_tracking = false
debug_payloads = true
fixed_gas_estimate = 6000000

[wallet]
type = "private_key"
private_key = "{}"
chain_id = 1337

[upstream]
endpoints = ["http://a:8545", "https://b.example.com"]
timeout_ms = 5000

[server]
listen = "0.0.0.0:9000"
cors = true

[logging]
level = "debug"
json = true
"#,
			KEY
		))
		.unwrap();

		assert!(!config.engine.nonce_tracking);
		assert_eq!(config.engine.fixed_gas_estimate, Some(6_000_000));
		assert_eq!(
			config.wallet,
			WalletConfig::PrivateKey {
				private_key: KEY.to_string(),
				chain_id: 1337
			}
		);
		assert_eq!(config.upstream.endpoints.len(), 2);
		assert!(config.server.cors);
		assert!(config.logging.json);
		assert!(ConfigLoader::validate(&config).is_ok());
	}

	#[test]
	fn test_mnemonic_wallet_defaults() {
		let config = ConfigLoader::from_json(
			r#"{
				"wallet": { "type": "mnemonic", "mnemonic": "test test test test test test test test test test test junk" },
				"upstream": { "endpoints": ["http://localhost:8545"] }
			}"#,
		)
		.unwrap();

		match &config.wallet {
			WalletConfig::Mnemonic {
				base_derivation_path,
				number_of_accounts,
				address_search_limit,
				chain_id,
				..
			} => {
				assert_eq!(base_derivation_path, "m/44'/60'/0'/0");
				assert_eq!(*number_of_accounts, 10);
				assert_eq!(*address_search_limit, 1000);
				assert_eq!(*chain_id, 1);
			}
			other => panic!("unexpected wallet {:?}", other),
		}
	}

	#[test]
	fn test_yaml_parsing() {
		let config = ConfigLoader::from_yaml(
			r#"
wallet:
  type: empty
upstream:
  endpoints:
    - http://localhost:8545
"#,
		)
		.unwrap();
		assert_eq!(config.wallet.kind(), "empty");
	}

	#[test]
	fn test_substitution() {
		let contents = "[upstream]\nendpoints = [\"${NODE_URL}\"]\n";
		let substituted =
			ConfigLoader::substitute_with(contents, env(&[("NODE_URL", "http://node:8545")]))
				.unwrap();
		assert_eq!(substituted, "[upstream]\nendpoints = [\"http://node:8545\"]\n");

		let missing = ConfigLoader::substitute_with(contents, env(&[])).unwrap_err();
		assert!(missing.to_string().contains("NODE_URL"));
	}

	#[test]
	fn test_env_overrides() {
		let mut config = Config::default();
		ConfigLoader::apply_overrides(
			&mut config,
			env(&[
				(ENV_PRIVATE_KEY, KEY),
				(ENV_UPSTREAM_URLS, "http://a:8545, https://b.example.com,"),
				(ENV_LISTEN, "0.0.0.0:8546"),
			]),
		)
		.unwrap();

		assert_eq!(config.wallet.kind(), "private_key");
		assert_eq!(
			config.upstream.endpoints,
			vec!["http://a:8545", "https://b.example.com"]
		);
		assert_eq!(config.server.listen, "0.0.0.0:8546");
		assert!(ConfigLoader::validate(&config).is_ok());
	}

	#[test]
	fn test_conflicting_secret_override_is_rejected() {
		let mut config = Config {
			wallet: WalletConfig::PrivateKey {
				private_key: KEY.to_string(),
				chain_id: 1,
			},
			..Default::default()
		};
		let result =
			ConfigLoader::apply_overrides(&mut config, env(&[(ENV_MNEMONIC, "abandon abandon")]));
		assert!(result.is_err());
	}

	#[test]
	fn test_validation_failures() {
		let base = ConfigLoader::from_toml("[upstream]\nendpoints = [\"http://a\"]\n").unwrap();

		let mut no_upstream = base.clone();
		no_upstream.upstream.endpoints.clear();
		assert!(ConfigLoader::validate(&no_upstream).is_err());

		let mut websocket = base.clone();
		websocket.upstream.endpoints = vec!["ws://a".to_string()];
		assert!(ConfigLoader::validate(&websocket).is_err());

		let mut short_key = base.clone();
		short_key.wallet = WalletConfig::PrivateKey {
			private_key: "0x1234".to_string(),
			chain_id: 1,
		};
		let error = ConfigLoader::validate(&short_key).unwrap_err();
		assert!(error.to_string().contains("64 hex characters"));

		let mut accounts = base.clone();
		accounts.wallet = WalletConfig::Mnemonic {
			mnemonic: "test test test test test test test test test test test junk".to_string(),
			base_derivation_path: DEFAULT_MNEMONIC_PATH.to_string(),
			number_of_accounts: 20,
			address_search_limit: 10,
			chain_id: 1,
		};
		assert!(ConfigLoader::validate(&accounts).is_err());

		let mut listen = base;
		listen.server.listen = "localhost".to_string();
		assert!(ConfigLoader::validate(&listen).is_err());
	}

	#[test]
	fn test_from_file_picks_format_by_extension() {
		let toml = write_config(".toml", "[upstream]\nendpoints = [\"http://a:8545\"]\n");
		let json = write_config(".json", r#"{ "upstream": { "endpoints": ["http://a:8545"] } }"#);
		let yaml = write_config(".yml", "upstream:\n  endpoints: [\"http://a:8545\"]\n");

		for file in [&toml, &json, &yaml] {
			let config = ConfigLoader::from_file(file.path()).unwrap();
			assert_eq!(config.upstream.endpoints, vec!["http://a:8545"]);
		}

		let unknown = write_config(".ini", "");
		assert!(ConfigLoader::from_file(unknown.path()).is_err());
	}
}
