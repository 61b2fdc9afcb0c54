//! Hex and address helpers shared by the middlewares.

use crate::errors::ProviderError;
use ethers_core::types::{Address, U256};
use serde_json::Value;

/// Lowercased `0x` form used as the nonce cache key.
pub fn normalize_address(address: &str) -> String {
	address.to_ascii_lowercase()
}

/// Parses a `0x`-prefixed 20-byte hex address, any case.
pub fn parse_address(raw: &str) -> Result<Address, ProviderError> {
	let digits = raw
		.strip_prefix("0x")
		.or_else(|| raw.strip_prefix("0X"))
		.ok_or_else(|| {
			ProviderError::Validation(format!("Address {} is missing the 0x prefix", raw))
		})?;

	if digits.len() != 40 {
		return Err(ProviderError::Validation(format!(
			"Address {} must be 20 bytes",
			raw
		)));
	}

	let bytes = hex::decode(digits)
		.map_err(|_| ProviderError::Validation(format!("Address {} is not valid hex", raw)))?;

	Ok(Address::from_slice(&bytes))
}

/// Parses an address out of a positional JSON-RPC parameter.
pub fn address_param(value: Option<&Value>, name: &str) -> Result<Address, ProviderError> {
	let raw = value
		.and_then(Value::as_str)
		.ok_or_else(|| ProviderError::Validation(format!("Missing {} parameter", name)))?;
	parse_address(raw)
}

/// Decodes `0x`-prefixed hex data. The prefix is required.
pub fn decode_hex_data(raw: &str) -> Result<Vec<u8>, ProviderError> {
	let digits = raw.strip_prefix("0x").ok_or_else(|| {
		ProviderError::Validation("Expected data to be hex with a 0x prefix".to_string())
	})?;

	hex::decode(digits).map_err(|e| ProviderError::Validation(format!("Invalid hex data: {}", e)))
}

/// Reads a quantity returned by a node: a `0x` hex string or a plain JSON number.
pub fn parse_quantity(value: &Value) -> Result<U256, ProviderError> {
	match value {
		Value::String(s) => {
			let digits = s.strip_prefix("0x").ok_or_else(|| {
				ProviderError::Validation(format!("Quantity {} is missing the 0x prefix", s))
			})?;
			if digits.is_empty() {
				return Ok(U256::zero());
			}
			U256::from_str_radix(digits, 16)
				.map_err(|_| ProviderError::Validation(format!("Invalid quantity {}", s)))
		}
		Value::Number(n) => n
			.as_u64()
			.map(U256::from)
			.ok_or_else(|| ProviderError::Validation(format!("Invalid quantity {}", n))),
		other => Err(ProviderError::Validation(format!(
			"Expected a quantity, got {}",
			other
		))),
	}
}

/// `0x`-prefixed hex left-padded to an even number of digits, e.g. `1 -> 0x01`.
pub fn to_even_hex(value: U256) -> String {
	let digits = format!("{:x}", value);
	if digits.len() % 2 == 1 {
		format!("0x0{}", digits)
	} else {
		format!("0x{}", digits)
	}
}
