//! BIP-39 / BIP-32 hierarchical deterministic backend.

use super::sign_locally;
use crate::SigningBackend;
use async_trait::async_trait;
use coins_bip32::prelude::{SigningKey as ExtendedSigningKey, XPriv};
use ethers_core::types::transaction::eip712::TypedData;
use ethers_signers::coins_bip39::{English, Mnemonic};
use ethers_signers::{LocalWallet, Signer};
use subprovider_types::{Address, Bytes, ProviderError, Signature, TxParams};
use tokio::sync::RwLock;
use tracing::debug;

pub const DEFAULT_BASE_DERIVATION_PATH: &str = "m/44'/60'/0'/0";
pub const DEFAULT_NUMBER_OF_ACCOUNTS: usize = 10;
pub const DEFAULT_ADDRESS_SEARCH_LIMIT: usize = 1000;

struct DerivedKey {
	address: Address,
	derivation_path: String,
	signer: LocalWallet,
}

/// Backend deriving keys at `base_path/index` from a mnemonic phrase.
///
/// The BIP-39 seed is stretched once, at construction. Keys are derived from
/// the master key lazily, in index order, and kept in memory. Looking up an
/// address derives further keys until it is found or the search limit is hit.
pub struct MnemonicWallet {
	master: XPriv,
	base_path: String,
	number_of_accounts: usize,
	address_search_limit: usize,
	chain_id: u64,
	keys: RwLock<Vec<DerivedKey>>,
}

impl MnemonicWallet {
	pub fn new(phrase: impl Into<String>) -> Result<Self, ProviderError> {
		let phrase = phrase.into();
		if phrase.trim().is_empty() {
			return Err(ProviderError::Validation("Mnemonic must not be empty".to_string()));
		}

		let master = Mnemonic::<English>::new_from_phrase(phrase.trim())
			.and_then(|mnemonic| mnemonic.master_key(None))
			.map_err(|e| ProviderError::Validation(format!("Invalid mnemonic: {}", e)))?;

		let wallet = Self {
			master,
			base_path: DEFAULT_BASE_DERIVATION_PATH.to_string(),
			number_of_accounts: DEFAULT_NUMBER_OF_ACCOUNTS,
			address_search_limit: DEFAULT_ADDRESS_SEARCH_LIMIT,
			chain_id: super::private_key::DEFAULT_CHAIN_ID,
			keys: RwLock::new(Vec::new()),
		};
		Ok(wallet)
	}

	pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
		self.base_path = base_path.into().trim_end_matches('/').to_string();
		self
	}

	pub fn with_number_of_accounts(mut self, number_of_accounts: usize) -> Self {
		self.number_of_accounts = number_of_accounts;
		self
	}

	pub fn with_address_search_limit(mut self, address_search_limit: usize) -> Self {
		self.address_search_limit = address_search_limit;
		self
	}

	pub fn with_chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn base_path(&self) -> &str {
		&self.base_path
	}

	fn derive(&self, index: usize) -> Result<DerivedKey, ProviderError> {
		let derivation_path = format!("{}/{}", self.base_path, index);
		let child = self
			.master
			.derive_path(derivation_path.as_str())
			.map_err(|e| ProviderError::Validation(format!("Invalid derivation path: {}", e)))?;

		let key: &ExtendedSigningKey = child.as_ref();
		let signer = LocalWallet::from_bytes(&key.to_bytes())
			.map_err(|e| ProviderError::Signing(format!("Invalid derived key: {}", e)))?
			.with_chain_id(self.chain_id);

		Ok(DerivedKey {
			address: signer.address(),
			derivation_path,
			signer,
		})
	}

	/// Extends the cache to at least `count` keys.
	async fn derive_up_to(&self, count: usize) -> Result<Vec<Address>, ProviderError> {
		let mut keys = self.keys.write().await;
		while keys.len() < count {
			let key = self.derive(keys.len())?;
			keys.push(key);
		}
		Ok(keys.iter().take(count).map(|key| key.address).collect())
	}

	/// Finds the signer for an address, deriving up to the search limit.
	async fn signer_for(&self, address: Address) -> Result<LocalWallet, ProviderError> {
		{
			let keys = self.keys.read().await;
			if let Some(key) = keys.iter().find(|key| key.address == address) {
				return Ok(key.signer.clone());
			}
		}

		let mut keys = self.keys.write().await;
		if let Some(key) = keys.iter().find(|key| key.address == address) {
			return Ok(key.signer.clone());
		}

		while keys.len() < self.address_search_limit {
			let key = self.derive(keys.len())?;
			let found = key.address == address;
			keys.push(key);
			if found {
				let key = &keys[keys.len() - 1];
				debug!("Found {:?} at {}", address, key.derivation_path);
				return Ok(key.signer.clone());
			}
		}

		Err(ProviderError::AddressNotFound(format!(
			"Address {:?} not found in the first {} keys of {}",
			address, self.address_search_limit, self.base_path
		)))
	}

	/// Derivation path of an address that has already been looked up.
	pub async fn derivation_path_of(&self, address: Address) -> Option<String> {
		self.keys
			.read()
			.await
			.iter()
			.find(|key| key.address == address)
			.map(|key| key.derivation_path.clone())
	}
}

#[async_trait]
impl SigningBackend for MnemonicWallet {
	async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
		self.derive_up_to(self.number_of_accounts).await
	}

	async fn sign_transaction(&self, tx: &TxParams) -> Result<Bytes, ProviderError> {
		let signer = self.signer_for(tx.from).await?;
		sign_locally(&signer, tx)
	}

	async fn sign_personal_message(
		&self,
		message: &[u8],
		address: Address,
	) -> Result<Signature, ProviderError> {
		let signer = self.signer_for(address).await?;
		signer
			.sign_message(message)
			.await
			.map_err(|e| ProviderError::Signing(format!("Failed to sign message: {}", e)))
	}

	async fn sign_typed_data(
		&self,
		address: Address,
		typed_data: &TypedData,
	) -> Result<Signature, ProviderError> {
		let signer = self.signer_for(address).await?;
		signer
			.sign_typed_data(typed_data)
			.await
			.map_err(|e| ProviderError::Signing(format!("Failed to sign typed data: {}", e)))
	}
}
