// subprovider-nonce/src/lib.rs

//! Pending-nonce cache.
//!
//! Nodes behind a load balancer do not agree on the pending nonce of an
//! account that just sent a transaction. The tracker answers
//! `eth_getTransactionCount(address, "pending")` from what it has seen
//! instead, and learns from every successful `eth_sendRawTransaction`.

use async_trait::async_trait;
use dashmap::DashMap;
use ethers_core::types::{Address, Transaction, U256};
use ethers_core::utils::rlp::{Decodable, Rlp};
use serde_json::Value;
use std::sync::Arc;
use subprovider_core::{Middleware, Outcome};
use subprovider_types::utils::{decode_hex_data, normalize_address, to_even_hex};
use subprovider_types::{ProviderError, RequestEnvelope, RpcMethod};
use tracing::{debug, warn};

const PENDING_TAG: &str = "pending";

/// Middleware caching the next pending nonce per sender.
///
/// Clones share the cache.
#[derive(Debug, Clone, Default)]
pub struct NonceTracker {
	nonces: Arc<DashMap<String, String>>,
}

impl NonceTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Cached nonce for an address, any case.
	pub fn cached_nonce(&self, address: &str) -> Option<String> {
		self.nonces
			.get(&normalize_address(address))
			.map(|entry| entry.value().clone())
	}

	pub fn len(&self) -> usize {
		self.nonces.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nonces.is_empty()
	}

	fn handle_transaction_count(&self, request: &RequestEnvelope) -> Outcome {
		if request.param_str(1) != Some(PENDING_TAG) {
			return Outcome::Next;
		}
		let Some(address) = request.param_str(0) else {
			return Outcome::Next;
		};

		let key = normalize_address(address);
		if let Some(cached) = self.nonces.get(&key) {
			debug!("Pending nonce for {} served from cache: {}", key, cached.value());
			return Outcome::respond(Value::String(cached.value().clone()));
		}

		let nonces = self.nonces.clone();
		Outcome::then(move |result| {
			if let Ok(Value::String(nonce)) = result {
				debug!("Caching pending nonce {} for {}", nonce, key);
				nonces.insert(key, nonce.clone());
			}
		})
	}

	fn handle_raw_transaction(&self, request: &RequestEnvelope) -> Outcome {
		let Some(raw) = request.param_str(0) else {
			return Outcome::Next;
		};

		let (sender, nonce) = match recover_sender(raw) {
			Ok(decoded) => decoded,
			Err(e) => {
				warn!("Not tracking undecodable raw transaction: {}", e);
				return Outcome::Next;
			}
		};

		let key = normalize_address(&format!("{:?}", sender));
		let nonces = self.nonces.clone();
		Outcome::then(move |result| match result {
			Ok(_) => {
				let next = to_even_hex(nonce.saturating_add(U256::one()));
				debug!("Sent transaction from {}, next pending nonce {}", key, next);
				nonces.insert(key, next);
			}
			Err(error) if error.is_nonce_too_low() => {
				warn!("Nonce too low for {}, dropping cached nonce", key);
				nonces.remove(&key);
			}
			Err(_) => {}
		})
	}
}

/// Decodes a signed transaction and recovers its sender from the signature.
pub fn recover_sender(raw: &str) -> Result<(Address, U256), ProviderError> {
	let bytes = decode_hex_data(raw)?;
	if bytes.is_empty() {
		return Err(ProviderError::Validation("Empty raw transaction".to_string()));
	}

	let transaction = Transaction::decode(&Rlp::new(&bytes))
		.map_err(|e| ProviderError::Validation(format!("Invalid raw transaction: {}", e)))?;
	let sender = transaction
		.recover_from()
		.map_err(|e| ProviderError::Validation(format!("Cannot recover sender: {}", e)))?;

	Ok((sender, transaction.nonce))
}

#[async_trait]
impl Middleware for NonceTracker {
	fn name(&self) -> &str {
		"nonce_tracker"
	}

	async fn handle(&self, request: &RequestEnvelope) -> Outcome {
		match RpcMethod::from_name(request.method()) {
			Some(RpcMethod::GetTransactionCount) => self.handle_transaction_count(request),
			Some(RpcMethod::SendRawTransaction) => self.handle_raw_transaction(request),
			_ => Outcome::Next,
		}
	}
}
