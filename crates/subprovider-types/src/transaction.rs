//! Typed parameters of `eth_sendTransaction` / `eth_signTransaction`.

use crate::errors::ProviderError;
use crate::utils::{address_param, decode_hex_data, parse_quantity};
use ethers_core::types::{
	transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, U256, U64,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Transaction fields as sent by a dapp. Missing gas, gas price and nonce
/// are filled in by the wallet middleware before signing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxParams {
	pub from: Address,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub to: Option<Address>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value: Option<U256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Bytes>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gas: Option<U256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gas_price: Option<U256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub nonce: Option<U256>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub chain_id: Option<U64>,
}

fn optional_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
	object.get(key).filter(|value| !value.is_null())
}

fn optional_quantity(
	object: &Map<String, Value>,
	key: &str,
) -> Result<Option<U256>, ProviderError> {
	optional_field(object, key).map(parse_quantity).transpose()
}

impl TxParams {
	pub fn new(from: Address) -> Self {
		Self {
			from,
			to: None,
			value: None,
			data: None,
			gas: None,
			gas_price: None,
			nonce: None,
			chain_id: None,
		}
	}

	/// Validates and parses the first parameter of a transaction call.
	pub fn from_value(value: &Value) -> Result<Self, ProviderError> {
		let object = value.as_object().ok_or_else(|| {
			ProviderError::Validation("Transaction params must be an object".to_string())
		})?;

		let from = address_param(object.get("from"), "from")?;
		let to = optional_field(object, "to")
			.map(|to| address_param(Some(to), "to"))
			.transpose()?;

		let data = optional_field(object, "data")
			.or_else(|| optional_field(object, "input"))
			.map(|raw| {
				raw.as_str()
					.ok_or_else(|| ProviderError::Validation("data must be a hex string".into()))
					.and_then(decode_hex_data)
					.map(Bytes::from)
			})
			.transpose()?;

		let chain_id = optional_quantity(object, "chainId")?
			.map(|id| {
				if id > U256::from(u64::MAX) {
					return Err(ProviderError::Validation(format!(
						"chainId {:#x} does not fit in 64 bits",
						id
					)));
				}
				Ok(U64::from(id.as_u64()))
			})
			.transpose()?;

		Ok(Self {
			from,
			to,
			value: optional_quantity(object, "value")?,
			data,
			gas: optional_quantity(object, "gas")?,
			gas_price: optional_quantity(object, "gasPrice")?,
			nonce: optional_quantity(object, "nonce")?,
			chain_id,
		})
	}

	pub fn to_json(&self) -> Result<Value, ProviderError> {
		Ok(serde_json::to_value(self)?)
	}

	/// Legacy (EIP-155) transaction ready for signing.
	pub fn to_typed_transaction(&self, default_chain_id: u64) -> TypedTransaction {
		let mut request = TransactionRequest::new().from(self.from);

		if let Some(to) = self.to {
			request = request.to(to);
		}
		if let Some(value) = self.value {
			request = request.value(value);
		}
		if let Some(data) = &self.data {
			request = request.data(data.clone());
		}
		if let Some(gas) = self.gas {
			request = request.gas(gas);
		}
		if let Some(gas_price) = self.gas_price {
			request = request.gas_price(gas_price);
		}
		if let Some(nonce) = self.nonce {
			request = request.nonce(nonce);
		}

		let chain_id = self
			.chain_id
			.map(|id| id.as_u64())
			.unwrap_or(default_chain_id);
		request = request.chain_id(chain_id);

		TypedTransaction::Legacy(request)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_from_value_parses_all_fields() {
		let params = TxParams::from_value(&json!({
			"from": "0x9D8A62F656A8D1615C1294FD71E9CFB3E4855A4F",
			"to": "0x3535353535353535353535353535353535353535",
			"value": "0xde0b6b3a7640000",
			"gas": "0x5208",
			"gasPrice": "0x4a817c800",
			"nonce": "0x09",
			"chainId": "0x1",
			"data": "0x"
		}))
		.unwrap();

		assert_eq!(params.nonce, Some(U256::from(9)));
		assert_eq!(params.gas, Some(U256::from(21000)));
		assert_eq!(params.gas_price, Some(U256::from(20_000_000_000u64)));
		assert_eq!(params.chain_id, Some(U64::from(1)));
		assert_eq!(params.data, Some(Bytes::default()));
	}

	#[test]
	fn test_missing_fields_stay_empty() {
		let params =
			TxParams::from_value(&json!({ "from": "0x3535353535353535353535353535353535353535" }))
				.unwrap();
		assert!(params.gas.is_none());
		assert!(params.gas_price.is_none());
		assert!(params.nonce.is_none());
		assert!(params.to.is_none());
	}

	#[test]
	fn test_invalid_sender_is_a_validation_error() {
		for bad in [json!({}), json!({ "from": "0x12" }), json!("0xabc"), json!({ "from": 5 })] {
			assert!(matches!(
				TxParams::from_value(&bad),
				Err(ProviderError::Validation(_))
			));
		}
	}

	#[test]
	fn test_oversized_chain_id_is_rejected() {
		let params = TxParams::from_value(&json!({
			"from": "0x3535353535353535353535353535353535353535",
			"chainId": "0xffffffffffffffff"
		}))
		.unwrap();
		assert_eq!(params.chain_id, Some(U64::from(u64::MAX)));

		let result = TxParams::from_value(&json!({
			"from": "0x3535353535353535353535353535353535353535",
			"chainId": "0x10000000000000001"
		}));
		assert!(matches!(result, Err(ProviderError::Validation(_))));
	}

	#[test]
	fn test_serialization_skips_missing_fields() {
		let mut params = TxParams::new(Address::repeat_byte(0x35));
		params.gas_price = Some(U256::from(16));
		let encoded = params.to_json().unwrap();

		assert_eq!(
			encoded,
			json!({
				"from": "0x3535353535353535353535353535353535353535",
				"gasPrice": "0x10"
			})
		);
	}
}
