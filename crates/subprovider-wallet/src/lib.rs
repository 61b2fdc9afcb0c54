// subprovider-wallet/src/lib.rs

//! Account and signing middleware.
//!
//! [`WalletMiddleware`] answers the account and signing methods locally and
//! delegates key handling to a [`SigningBackend`]. Transactions with missing
//! fields are completed through sub-requests emitted on the owning engine, so
//! other middlewares (the nonce tracker in particular) see them.

pub mod implementations;

pub use implementations::empty::EmptyWallet;
pub use implementations::hardware::{DeviceSession, DeviceSessionFactory, HardwareWallet};
pub use implementations::mnemonic::MnemonicWallet;
pub use implementations::private_key::PrivateKeyWallet;

use async_trait::async_trait;
use ethers_core::types::transaction::eip712::TypedData;
use serde_json::{json, Value};
use std::sync::Arc;
use subprovider_core::{Emitter, Middleware, Outcome};
use subprovider_types::utils::{address_param, decode_hex_data, parse_quantity};
use subprovider_types::{
	Address, Bytes, ProviderError, RequestEnvelope, RpcMethod, Signature, TxParams,
};
use tracing::{debug, info};

/// Key custody behind the wallet middleware.
#[async_trait]
pub trait SigningBackend: Send + Sync {
	async fn accounts(&self) -> Result<Vec<Address>, ProviderError>;

	/// Signs a fully populated transaction and returns the signed RLP.
	async fn sign_transaction(&self, tx: &TxParams) -> Result<Bytes, ProviderError>;

	/// EIP-191 personal message signature, `r || s || v` with `v` in {27, 28}.
	async fn sign_personal_message(
		&self,
		message: &[u8],
		address: Address,
	) -> Result<Signature, ProviderError>;

	async fn sign_typed_data(
		&self,
		address: Address,
		_typed_data: &TypedData,
	) -> Result<Signature, ProviderError> {
		Err(ProviderError::Signing(format!(
			"Typed data signing is not supported for {:?}",
			address
		)))
	}
}

#[async_trait]
impl<B: SigningBackend + ?Sized> SigningBackend for Arc<B> {
	async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
		(**self).accounts().await
	}

	async fn sign_transaction(&self, tx: &TxParams) -> Result<Bytes, ProviderError> {
		(**self).sign_transaction(tx).await
	}

	async fn sign_personal_message(
		&self,
		message: &[u8],
		address: Address,
	) -> Result<Signature, ProviderError> {
		(**self).sign_personal_message(message, address).await
	}

	async fn sign_typed_data(
		&self,
		address: Address,
		typed_data: &TypedData,
	) -> Result<Signature, ProviderError> {
		(**self).sign_typed_data(address, typed_data).await
	}
}

fn signature_hex(signature: &Signature) -> Value {
	Value::String(format!("0x{}", hex::encode(signature.to_vec())))
}

/// Intercepts account and signing methods and declines everything else.
pub struct WalletMiddleware<B> {
	backend: B,
	emitter: Emitter,
}

impl<B: SigningBackend> WalletMiddleware<B> {
	pub fn new(backend: B, emitter: Emitter) -> Self {
		Self { backend, emitter }
	}

	pub fn backend(&self) -> &B {
		&self.backend
	}

	async fn coinbase(&self) -> Result<Value, ProviderError> {
		let accounts = self.backend.accounts().await?;
		let first = accounts.first().ok_or_else(|| {
			ProviderError::AddressNotFound("No accounts available".to_string())
		})?;
		Ok(serde_json::to_value(first)?)
	}

	/// Parses the transaction and fills in gas price, nonce and gas, in that order.
	async fn populate(&self, params: Option<&Value>) -> Result<TxParams, ProviderError> {
		let params = params.ok_or_else(|| {
			ProviderError::Validation("Missing transaction parameter".to_string())
		})?;
		let mut tx = TxParams::from_value(params)?;
		let submitted = tx.to_json()?;

		if tx.gas_price.is_none() {
			let gas_price = self.emitter.emit("eth_gasPrice", vec![]).await?;
			tx.gas_price = Some(parse_quantity(&gas_price)?);
		}

		if tx.nonce.is_none() {
			let nonce = self
				.emitter
				.emit(
					"eth_getTransactionCount",
					vec![json!(format!("{:?}", tx.from)), json!("pending")],
				)
				.await?;
			tx.nonce = Some(parse_quantity(&nonce)?);
		}

		if tx.gas.is_none() {
			let gas = self.emitter.emit("eth_estimateGas", vec![submitted]).await?;
			tx.gas = Some(parse_quantity(&gas)?);
		}

		Ok(tx)
	}

	async fn sign_transaction(&self, params: Option<&Value>) -> Result<Value, ProviderError> {
		let tx = self.populate(params).await?;
		let raw = self.backend.sign_transaction(&tx).await?;
		Ok(serde_json::to_value(raw)?)
	}

	async fn send_transaction(&self, request: &RequestEnvelope) -> Result<Value, ProviderError> {
		let raw = self.sign_transaction(request.param(0)).await?;
		let hash = self.emitter.emit("eth_sendRawTransaction", vec![raw]).await?;
		info!("Submitted transaction {}", hash);
		Ok(hash)
	}

	async fn sign_message(
		&self,
		data: Option<&Value>,
		address: Option<&Value>,
	) -> Result<Value, ProviderError> {
		let data = data
			.and_then(Value::as_str)
			.ok_or_else(|| ProviderError::Validation("Missing data parameter".to_string()))?;
		let message = decode_hex_data(data)?;
		let address = address_param(address, "address")?;

		let signature = self.backend.sign_personal_message(&message, address).await?;
		Ok(signature_hex(&signature))
	}

	async fn sign_typed_data(&self, request: &RequestEnvelope) -> Result<Value, ProviderError> {
		let address = address_param(request.param(0), "address")?;
		let typed_data: TypedData = match request.param(1) {
			Some(Value::String(encoded)) => serde_json::from_str(encoded)
				.map_err(|e| ProviderError::Validation(format!("Invalid typed data: {}", e)))?,
			Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
				.map_err(|e| ProviderError::Validation(format!("Invalid typed data: {}", e)))?,
			_ => {
				return Err(ProviderError::Validation(
					"Missing typed data parameter".to_string(),
				))
			}
		};

		let signature = self.backend.sign_typed_data(address, &typed_data).await?;
		Ok(signature_hex(&signature))
	}

	async fn dispatch(
		&self,
		method: RpcMethod,
		request: &RequestEnvelope,
	) -> Result<Value, ProviderError> {
		match method {
			RpcMethod::Accounts => Ok(serde_json::to_value(self.backend.accounts().await?)?),
			RpcMethod::Coinbase => self.coinbase().await,
			RpcMethod::SendTransaction => self.send_transaction(request).await,
			RpcMethod::SignTransaction => {
				let raw = self.sign_transaction(request.param(0)).await?;
				Ok(json!({
					"raw": raw,
					"tx": request.param(0).cloned().unwrap_or(Value::Null),
				}))
			}
			RpcMethod::Sign => self.sign_message(request.param(1), request.param(0)).await,
			RpcMethod::PersonalSign => self.sign_message(request.param(0), request.param(1)).await,
			RpcMethod::SignTypedData => self.sign_typed_data(request).await,
			RpcMethod::SendRawTransaction
			| RpcMethod::GetTransactionCount
			| RpcMethod::GasPrice
			| RpcMethod::EstimateGas => Err(ProviderError::Unhandled(method.to_string())),
		}
	}
}

#[async_trait]
impl<B: SigningBackend> Middleware for WalletMiddleware<B> {
	fn name(&self) -> &str {
		"wallet"
	}

	async fn handle(&self, request: &RequestEnvelope) -> Outcome {
		let method = match RpcMethod::from_name(request.method()) {
			Some(
				RpcMethod::SendRawTransaction
				| RpcMethod::GetTransactionCount
				| RpcMethod::GasPrice
				| RpcMethod::EstimateGas,
			)
			| None => return Outcome::Next,
			Some(method) => method,
		};

		debug!("Wallet handling {} (id {})", method, request.id());
		Outcome::Respond(self.dispatch(method, request).await)
	}
}
