//! Single private key backend.

use super::sign_locally;
use crate::SigningBackend;
use async_trait::async_trait;
use ethers_core::types::transaction::eip712::TypedData;
use ethers_signers::{LocalWallet, Signer};
use subprovider_types::{Address, Bytes, ProviderError, Signature, TxParams};

pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Backend holding one secp256k1 key in memory.
#[derive(Debug, Clone)]
pub struct PrivateKeyWallet {
	wallet: LocalWallet,
}

impl PrivateKeyWallet {
	/// Creates the wallet from a 64 character hex key, with or without `0x`.
	pub fn new(private_key: &str, chain_id: u64) -> Result<Self, ProviderError> {
		let digits = private_key.strip_prefix("0x").unwrap_or(private_key);
		if digits.len() != 64 {
			return Err(ProviderError::Validation(
				"Private key must be 64 hex characters (32 bytes)".to_string(),
			));
		}

		let wallet = digits
			.parse::<LocalWallet>()
			.map_err(|e| ProviderError::Validation(format!("Invalid private key: {}", e)))?
			.with_chain_id(chain_id);

		Ok(Self { wallet })
	}

	pub fn address(&self) -> Address {
		self.wallet.address()
	}

	pub fn chain_id(&self) -> u64 {
		self.wallet.chain_id()
	}

	fn ensure_owned(&self, address: Address) -> Result<(), ProviderError> {
		if address != self.wallet.address() {
			return Err(ProviderError::AddressNotFound(format!(
				"Address {:?} is not controlled by this wallet",
				address
			)));
		}
		Ok(())
	}
}

#[async_trait]
impl SigningBackend for PrivateKeyWallet {
	async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
		Ok(vec![self.wallet.address()])
	}

	async fn sign_transaction(&self, tx: &TxParams) -> Result<Bytes, ProviderError> {
		self.ensure_owned(tx.from)?;
		sign_locally(&self.wallet, tx)
	}

	async fn sign_personal_message(
		&self,
		message: &[u8],
		address: Address,
	) -> Result<Signature, ProviderError> {
		self.ensure_owned(address)?;
		self.wallet
			.sign_message(message)
			.await
			.map_err(|e| ProviderError::Signing(format!("Failed to sign message: {}", e)))
	}

	async fn sign_typed_data(
		&self,
		address: Address,
		typed_data: &TypedData,
	) -> Result<Signature, ProviderError> {
		self.ensure_owned(address)?;
		self.wallet
			.sign_typed_data(typed_data)
			.await
			.map_err(|e| ProviderError::Signing(format!("Failed to sign typed data: {}", e)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ethers_core::types::transaction::eip712::Eip712;
	use ethers_core::types::{H256, U256, U64};
	use serde_json::json;

	const WEB3_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

	fn eip155_tx() -> TxParams {
		TxParams {
			from: "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f".parse().unwrap(),
			to: Some(Address::repeat_byte(0x35)),
			value: Some(U256::exp10(18)),
			data: None,
			gas: Some(U256::from(21000)),
			gas_price: Some(U256::from(20_000_000_000u64)),
			nonce: Some(U256::from(9)),
			chain_id: Some(U64::from(1)),
		}
	}

	#[test]
	fn test_key_with_and_without_prefix() {
		let bare = PrivateKeyWallet::new(WEB3_KEY, 1).unwrap();
		let prefixed = PrivateKeyWallet::new(&format!("0x{}", WEB3_KEY), 1).unwrap();

		assert_eq!(bare.address(), prefixed.address());
		assert_eq!(
			format!("{:?}", bare.address()),
			"0x2c7536e3605d9c16a7a3d7b1898e529396a65c23"
		);
	}

	#[test]
	fn test_malformed_keys_are_rejected() {
		assert!(matches!(
			PrivateKeyWallet::new("0x1234", 1),
			Err(ProviderError::Validation(_))
		));
		assert!(PrivateKeyWallet::new(&"zz".repeat(32), 1).is_err());
	}

	#[tokio::test]
	async fn test_eip155_vector() {
		let wallet = PrivateKeyWallet::new(&"46".repeat(32), 1).unwrap();
		let raw = wallet.sign_transaction(&eip155_tx()).await.unwrap();

		assert_eq!(
			format!("0x{}", hex::encode(&raw)),
			"0xf86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
		);
	}

	#[tokio::test]
	async fn test_signing_for_another_sender_fails() {
		let wallet = PrivateKeyWallet::new(WEB3_KEY, 1).unwrap();

		let error = wallet.sign_transaction(&eip155_tx()).await.unwrap_err();
		assert!(matches!(error, ProviderError::AddressNotFound(_)));
	}

	#[tokio::test]
	async fn test_personal_message_vector() {
		let wallet = PrivateKeyWallet::new(WEB3_KEY, 1).unwrap();
		let signature = wallet
			.sign_personal_message(b"Some data", wallet.address())
			.await
			.unwrap();

		assert_eq!(signature.v, 28);
		assert_eq!(
			hex::encode(signature.to_vec()),
			"b91467e570a6466aa9e9876cbcd013baba02900b8979d43fe208a4a4f339f5fd6007e74cd82e037b800186422fc2da167c747ef045e5d18a5f5d4300f8e1a0291c"
		);
	}

	#[tokio::test]
	async fn test_typed_data_signature_recovers_signer() {
		let wallet = PrivateKeyWallet::new(WEB3_KEY, 1).unwrap();
		let typed_data: TypedData = serde_json::from_value(json!({
			"types": {
				"EIP712Domain": [
					{ "name": "name", "type": "string" },
					{ "name": "version", "type": "string" },
					{ "name": "chainId", "type": "uint256" }
				],
				"Mail": [
					{ "name": "from", "type": "address" },
					{ "name": "contents", "type": "string" }
				]
			},
			"primaryType": "Mail",
			"domain": { "name": "Ether Mail", "version": "1", "chainId": 1 },
			"message": {
				"from": "0xcd2a3d9f938e13cd947ec05abc7fe734df8dd826",
				"contents": "Hello, Bob!"
			}
		}))
		.unwrap();

		let signature = wallet
			.sign_typed_data(wallet.address(), &typed_data)
			.await
			.unwrap();
		let digest = H256::from(typed_data.encode_eip712().unwrap());

		assert_eq!(signature.recover(digest).unwrap(), wallet.address());
	}
}
