//! Error types for the subprovider engine.

use crate::envelope::JsonRpcError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Upstream messages that mean the sender's nonce is already used.
///
/// The first entry is the Parity/OpenEthereum wording, the second the geth one.
const NONCE_TOO_LOW_SIGNATURES: [&str; 2] = ["Transaction nonce is too low", "nonce too low"];

#[derive(Error, Debug)]
pub enum ProviderError {
	/// Malformed or missing parameter, detected before any I/O.
	#[error("Validation error: {0}")]
	Validation(String),

	/// The signing backend does not control the requested address.
	#[error("Address not found: {0}")]
	AddressNotFound(String),

	#[error("Another device session is already open")]
	DeviceSessionConflict,

	#[error("Device error: {0}")]
	Device(String),

	#[error("Signing failed: {0}")]
	Signing(String),

	#[error("Transport error from {endpoint}: {message}")]
	Transport { endpoint: String, message: String },

	#[error("Request to {endpoint} timed out after {timeout_ms}ms")]
	Timeout { endpoint: String, timeout_ms: u64 },

	/// Error object returned by the node itself.
	#[error("{0}")]
	Rpc(JsonRpcError),

	#[error("No middleware handled method {0}")]
	Unhandled(String),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Engine is no longer running")]
	EngineDropped,

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl ProviderError {
	pub fn transport(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Transport {
			endpoint: endpoint.into(),
			message: message.into(),
		}
	}

	/// Whether the node rejected a transaction because its nonce was already used.
	pub fn is_nonce_too_low(&self) -> bool {
		let message = self.to_string();
		NONCE_TOO_LOW_SIGNATURES
			.iter()
			.any(|signature| message.contains(signature))
	}

	/// Whether the error came from the transport layer rather than the node or the caller.
	pub fn is_transport(&self) -> bool {
		matches!(self, Self::Transport { .. } | Self::Timeout { .. })
	}
}

impl From<&ProviderError> for JsonRpcError {
	fn from(error: &ProviderError) -> Self {
		match error {
			ProviderError::Rpc(inner) => inner.clone(),
			ProviderError::Validation(_) => {
				JsonRpcError::new(JsonRpcError::INVALID_PARAMS, error.to_string())
			}
			ProviderError::Unhandled(_) => {
				JsonRpcError::new(JsonRpcError::METHOD_NOT_FOUND, error.to_string())
			}
			ProviderError::Transport { .. }
			| ProviderError::Timeout { .. }
			| ProviderError::Serialization(_)
			| ProviderError::EngineDropped => {
				JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, error.to_string())
			}
			_ => JsonRpcError::new(JsonRpcError::SERVER_ERROR, error.to_string()),
		}
	}
}

impl From<ProviderError> for JsonRpcError {
	fn from(error: ProviderError) -> Self {
		JsonRpcError::from(&error)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_nonce_too_low_matches_literal_message() {
		let error = ProviderError::Rpc(JsonRpcError::new(
			-32010,
			"Transaction nonce is too low. Try incrementing the nonce.",
		));
		assert!(error.is_nonce_too_low());
	}

	#[test]
	fn test_nonce_too_low_matches_geth_message() {
		let error = ProviderError::Rpc(JsonRpcError::new(-32000, "nonce too low"));
		assert!(error.is_nonce_too_low());
	}

	#[test]
	fn test_other_errors_are_not_nonce_too_low() {
		let error = ProviderError::Rpc(JsonRpcError::new(-32000, "insufficient funds for gas"));
		assert!(!error.is_nonce_too_low());
		assert!(!ProviderError::transport("http://node", "connection refused").is_nonce_too_low());
	}

	#[test]
	fn test_rpc_errors_keep_upstream_code() {
		let upstream = JsonRpcError::new(3, "execution reverted");
		let mapped = JsonRpcError::from(&ProviderError::Rpc(upstream.clone()));
		assert_eq!(mapped, upstream);
	}

	#[test]
	fn test_error_codes() {
		assert_eq!(
			JsonRpcError::from(&ProviderError::Unhandled("eth_foo".into())).code,
			JsonRpcError::METHOD_NOT_FOUND
		);
		assert_eq!(
			JsonRpcError::from(&ProviderError::DeviceSessionConflict).code,
			JsonRpcError::SERVER_ERROR
		);
		assert_eq!(
			JsonRpcError::from(&ProviderError::Timeout {
				endpoint: "http://node".into(),
				timeout_ms: 10
			})
			.code,
			JsonRpcError::INTERNAL_ERROR
		);
	}
}
