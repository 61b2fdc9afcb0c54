//! Signing backends.

pub mod empty;
pub mod hardware;
pub mod mnemonic;
pub mod private_key;

use ethers_core::types::Bytes;
use ethers_signers::{LocalWallet, Signer};
use subprovider_types::{ProviderError, TxParams};

/// Signs a legacy transaction with a local key and returns the signed RLP.
pub(crate) fn sign_locally(
	wallet: &LocalWallet,
	tx: &TxParams,
) -> Result<Bytes, ProviderError> {
	let typed = tx.to_typed_transaction(wallet.chain_id());
	let signature = wallet
		.sign_transaction_sync(&typed)
		.map_err(|e| ProviderError::Signing(format!("Failed to sign transaction: {}", e)))?;
	Ok(typed.rlp_signed(&signature))
}
