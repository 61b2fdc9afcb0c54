use crate::SigningBackend;
use async_trait::async_trait;
use ethers_core::types::transaction::eip712::TypedData;
use subprovider_types::{Address, Bytes, ProviderError, Signature, TxParams};

/// Backend with no accounts, for read-only pipelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyWallet;

fn not_found(address: Address) -> ProviderError {
	ProviderError::AddressNotFound(format!("{:?} (wallet has no accounts)", address))
}

#[async_trait]
impl SigningBackend for EmptyWallet {
	async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
		Ok(Vec::new())
	}

	async fn sign_transaction(&self, tx: &TxParams) -> Result<Bytes, ProviderError> {
		Err(not_found(tx.from))
	}

	async fn sign_personal_message(
		&self,
		_message: &[u8],
		address: Address,
	) -> Result<Signature, ProviderError> {
		Err(not_found(address))
	}

	async fn sign_typed_data(
		&self,
		address: Address,
		_typed_data: &TypedData,
	) -> Result<Signature, ProviderError> {
		Err(not_found(address))
	}
}
