//! Hardware signer backend over an opaque device transport.
//!
//! The device protocol itself lives behind [`DeviceSessionFactory`] and
//! [`DeviceSession`]; this backend only owns session exclusivity, derivation
//! path bookkeeping and transaction assembly.

use crate::SigningBackend;
use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use std::sync::atomic::{AtomicBool, Ordering};
use subprovider_types::{Address, Bytes, ProviderError, Signature, TxParams};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

pub const DEFAULT_BASE_DERIVATION_PATH: &str = "44'/60'/0'";
pub const DEFAULT_NUMBER_OF_ACCOUNTS: usize = 10;
pub const DEFAULT_ADDRESS_SEARCH_LIMIT: usize = 1000;

/// An open connection to the device.
#[async_trait]
pub trait DeviceSession: Send {
	async fn get_address(&mut self, derivation_path: &str) -> Result<Address, ProviderError>;

	/// Signs the transaction's EIP-155 sighash; `v` must already carry the chain id.
	async fn sign_transaction(
		&mut self,
		derivation_path: &str,
		tx: &TypedTransaction,
	) -> Result<Signature, ProviderError>;

	async fn sign_personal_message(
		&mut self,
		derivation_path: &str,
		message: &[u8],
	) -> Result<Signature, ProviderError>;
}

/// Opens device sessions.
#[async_trait]
pub trait DeviceSessionFactory: Send + Sync {
	async fn open(&self) -> Result<Box<dyn DeviceSession>, ProviderError>;
}

/// Claim on the wallet's open flag, released when dropped.
///
/// Taken before the device is opened, so a caller cancelled while `open()` is
/// pending still releases the session.
struct OpenFlag<'a>(&'a AtomicBool);

impl<'a> OpenFlag<'a> {
	fn claim(flag: &'a AtomicBool) -> Option<Self> {
		if flag.swap(true, Ordering::SeqCst) {
			None
		} else {
			Some(Self(flag))
		}
	}
}

impl Drop for OpenFlag<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

/// Open session; dropping it closes the device and releases the flag.
struct SessionGuard<'a> {
	session: Box<dyn DeviceSession>,
	_flag: OpenFlag<'a>,
}

pub struct HardwareWallet {
	factory: Box<dyn DeviceSessionFactory>,
	base_path: String,
	number_of_accounts: usize,
	address_search_limit: usize,
	chain_id: u64,
	connection_lock: Mutex<()>,
	session_open: AtomicBool,
	signing_lock: Mutex<()>,
	addresses: RwLock<Vec<Address>>,
}

impl HardwareWallet {
	pub fn new<F: DeviceSessionFactory + 'static>(factory: F) -> Self {
		Self {
			factory: Box::new(factory),
			base_path: DEFAULT_BASE_DERIVATION_PATH.to_string(),
			number_of_accounts: DEFAULT_NUMBER_OF_ACCOUNTS,
			address_search_limit: DEFAULT_ADDRESS_SEARCH_LIMIT,
			chain_id: super::private_key::DEFAULT_CHAIN_ID,
			connection_lock: Mutex::new(()),
			session_open: AtomicBool::new(false),
			signing_lock: Mutex::new(()),
			addresses: RwLock::new(Vec::new()),
		}
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

	pub fn is_session_open(&self) -> bool {
		self.session_open.load(Ordering::SeqCst)
	}

	fn path(&self, index: usize) -> String {
		format!("{}/{}", self.base_path, index)
	}

	/// Opens a session, failing fast while another one is open.
	async fn open_session(&self) -> Result<SessionGuard<'_>, ProviderError> {
		let _connection = self.connection_lock.lock().await;

		let Some(flag) = OpenFlag::claim(&self.session_open) else {
			warn!("Refusing to open a second device session");
			return Err(ProviderError::DeviceSessionConflict);
		};

		let session = self.factory.open().await?;
		Ok(SessionGuard {
			session,
			_flag: flag,
		})
	}

	/// Derivation path of `address`, querying the device past the cached addresses.
	async fn find_path(
		&self,
		guard: &mut SessionGuard<'_>,
		address: Address,
	) -> Result<String, ProviderError> {
		let mut addresses = self.addresses.write().await;
		if let Some(index) = addresses.iter().position(|known| *known == address) {
			return Ok(self.path(index));
		}

		while addresses.len() < self.address_search_limit {
			let index = addresses.len();
			let derived = guard.session.get_address(&self.path(index)).await?;
			addresses.push(derived);
			if derived == address {
				return Ok(self.path(index));
			}
		}

		Err(ProviderError::AddressNotFound(format!(
			"Address {:?} not found in the first {} device keys",
			address, self.address_search_limit
		)))
	}
}

#[async_trait]
impl SigningBackend for HardwareWallet {
	async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
		let mut guard = self.open_session().await?;
		let mut addresses = self.addresses.write().await;

		while addresses.len() < self.number_of_accounts {
			let index = addresses.len();
			let address = guard.session.get_address(&self.path(index)).await?;
			addresses.push(address);
		}

		Ok(addresses.iter().take(self.number_of_accounts).copied().collect())
	}

	async fn sign_transaction(&self, tx: &TxParams) -> Result<Bytes, ProviderError> {
		let _signing = self.signing_lock.lock().await;
		let mut guard = self.open_session().await?;

		let path = self.find_path(&mut guard, tx.from).await?;
		let typed = tx.to_typed_transaction(self.chain_id);
		debug!("Signing transaction from {:?} on device at {}", tx.from, path);

		let signature = guard.session.sign_transaction(&path, &typed).await?;
		Ok(typed.rlp_signed(&signature))
	}

	async fn sign_personal_message(
		&self,
		message: &[u8],
		address: Address,
	) -> Result<Signature, ProviderError> {
		let _signing = self.signing_lock.lock().await;
		let mut guard = self.open_session().await?;

		let path = self.find_path(&mut guard, address).await?;
		guard.session.sign_personal_message(&path, message).await
	}
}
