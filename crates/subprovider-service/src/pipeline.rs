//! Builds the middleware pipeline described by the configuration.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use subprovider_config::{Config, WalletConfig};
use subprovider_core::{
	DebugMiddleware, Engine, EngineBuilder, FixedGasEstimateMiddleware, Transport,
};
use subprovider_nonce::NonceTracker;
use subprovider_transport::{Failover, HttpTransport};
use subprovider_wallet::{EmptyWallet, MnemonicWallet, PrivateKeyWallet, WalletMiddleware};
use tracing::info;

/// Failover group over the configured HTTP endpoints.
pub fn build_upstream(config: &Config) -> Result<Failover> {
	let timeout = Duration::from_millis(config.upstream.timeout_ms);
	let transports = config
		.upstream
		.endpoints
		.iter()
		.map(|url| {
			let transport = HttpTransport::new(url, timeout)
				.with_context(|| format!("Failed to create transport for {}", url))?;
			Ok(Arc::new(transport) as Arc<dyn Transport>)
		})
		.collect::<Result<Vec<_>>>()?;

	Ok(Failover::new(transports)?)
}

/// Engine over the configured HTTP endpoints.
pub fn build_engine(config: &Config) -> Result<Arc<Engine>> {
	let upstream = build_upstream(config)?;
	build_engine_with(config, upstream)
}

/// Engine with `terminal` as the last stage.
///
/// Order: debug, nonce tracker, fixed gas estimate, wallet, terminal.
pub fn build_engine_with<T: Transport + 'static>(config: &Config, terminal: T) -> Result<Arc<Engine>> {
	let mut builder = Engine::builder();

	if config.engine.debug_payloads {
		builder = builder.middleware(DebugMiddleware::new("rpc"));
	}
	if config.engine.nonce_tracking {
		builder = builder.middleware(NonceTracker::new());
	}
	if let Some(gas) = config.engine.fixed_gas_estimate {
		builder = builder.middleware(FixedGasEstimateMiddleware::new(gas));
	}

	builder = with_wallet(builder, &config.wallet)?;

	let engine = builder.transport(terminal).build();
	info!("Pipeline: {}", engine.middleware_names().join(" -> "));
	Ok(engine)
}

fn with_wallet(builder: EngineBuilder, wallet: &WalletConfig) -> Result<EngineBuilder> {
	let builder = match wallet {
		WalletConfig::PrivateKey {
			private_key,
			chain_id,
		} => {
			let backend = PrivateKeyWallet::new(private_key, *chain_id)
				.context("Failed to load private key wallet")?;
			info!("Using private key wallet {:?}", backend.address());
			builder.middleware_with(move |emitter| WalletMiddleware::new(backend, emitter))
		}
		WalletConfig::Mnemonic {
			mnemonic,
			base_derivation_path,
			number_of_accounts,
			address_search_limit,
			chain_id,
		} => {
			let backend = MnemonicWallet::new(mnemonic.as_str())
				.context("Failed to load mnemonic wallet")?
				.with_base_path(base_derivation_path.as_str())
				.with_number_of_accounts(*number_of_accounts)
				.with_address_search_limit(*address_search_limit)
				.with_chain_id(*chain_id);
			info!("Using mnemonic wallet at {}", backend.base_path());
			builder.middleware_with(move |emitter| WalletMiddleware::new(backend, emitter))
		}
		WalletConfig::Empty => {
			builder.middleware_with(|emitter| WalletMiddleware::new(EmptyWallet, emitter))
		}
	};
	Ok(builder)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use subprovider_config::ConfigLoader;
	use subprovider_core::testing::ScriptedUpstream;

	const KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";
	const SENDER: &str = "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f";

	fn config(extra: &str) -> Config {
		ConfigLoader::from_toml(&format!(
			"[upstream]\nendpoints = [\"http://127.0.0.1:1\", \"http://127.0.0.1:2\"]\n{}",
			extra
		))
		.unwrap()
	}

	#[test]
	fn test_default_pipeline_order() {
		let engine = build_engine(&config("")).unwrap();
		assert_eq!(
			engine.middleware_names(),
			vec!["nonce_tracker", "wallet", "failover"]
		);
	}

	#[test]
	fn test_all_optional_middlewares() {
		let engine = build_engine(&config(
			"[engine]\ndebug_payloads = true\nfixed_gas_estimate = 21000\n",
		))
		.unwrap();
		assert_eq!(
			engine.middleware_names(),
			vec!["debug", "nonce_tracker", "fixed_gas_estimate", "wallet", "failover"]
		);
	}

	#[test]
	fn test_invalid_wallet_fails_the_build() {
		let config = config("[wallet]\ntype = \"private_key\"\nprivate_key = \"0x12\"\n");
		assert!(build_engine(&config).is_err());
	}

	#[tokio::test]
	async fn test_send_transaction_end_to_end() {
		let upstream = ScriptedUpstream::new();
		upstream
			.always("eth_gasPrice", json!("0x4a817c800"))
			.respond("eth_getTransactionCount", json!("0x9"))
			.always("eth_sendRawTransaction", json!("0x01"));

		let config = config(&format!(
			"[engine]\nfixed_gas_estimate = 21000\n[wallet]\ntype = \"private_key\"\nprivate_key = \"{}\"\n",
			KEY
		));
		let engine = build_engine_with(&config, upstream.clone()).unwrap();

		let tx = json!({
			"from": SENDER,
			"to": "0x3535353535353535353535353535353535353535",
			"value": "0xde0b6b3a7640000"
		});
		engine
			.send("eth_sendTransaction", vec![tx.clone()])
			.await
			.unwrap();
		engine.send("eth_sendTransaction", vec![tx]).await.unwrap();

		assert_eq!(upstream.calls_to("eth_estimateGas"), 0);
		assert_eq!(upstream.calls_to("eth_getTransactionCount"), 1);
		assert_eq!(upstream.calls_to("eth_sendRawTransaction"), 2);

		let pending = engine
			.send("eth_getTransactionCount", vec![json!(SENDER), json!("pending")])
			.await
			.unwrap();
		assert_eq!(pending, json!("0x0b"));
	}
}
