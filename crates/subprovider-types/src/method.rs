//! The JSON-RPC methods the core intercepts.

use std::fmt;

/// Closed set of method names that some middleware in this workspace reacts to.
///
/// Anything else parses to `None` and is declined by every middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
	Accounts,
	Coinbase,
	SendTransaction,
	SignTransaction,
	Sign,
	PersonalSign,
	SignTypedData,
	SendRawTransaction,
	GetTransactionCount,
	GasPrice,
	EstimateGas,
}

impl RpcMethod {
	pub fn from_name(name: &str) -> Option<Self> {
		let method = match name {
			"eth_accounts" => Self::Accounts,
			"eth_coinbase" => Self::Coinbase,
			"eth_sendTransaction" => Self::SendTransaction,
			"eth_signTransaction" => Self::SignTransaction,
			"eth_sign" => Self::Sign,
			"personal_sign" => Self::PersonalSign,
			"eth_signTypedData" | "eth_signTypedData_v4" => Self::SignTypedData,
			"eth_sendRawTransaction" => Self::SendRawTransaction,
			"eth_getTransactionCount" => Self::GetTransactionCount,
			"eth_gasPrice" => Self::GasPrice,
			"eth_estimateGas" => Self::EstimateGas,
			_ => return None,
		};
		Some(method)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Accounts => "eth_accounts",
			Self::Coinbase => "eth_coinbase",
			Self::SendTransaction => "eth_sendTransaction",
			Self::SignTransaction => "eth_signTransaction",
			Self::Sign => "eth_sign",
			Self::PersonalSign => "personal_sign",
			Self::SignTypedData => "eth_signTypedData_v4",
			Self::SendRawTransaction => "eth_sendRawTransaction",
			Self::GetTransactionCount => "eth_getTransactionCount",
			Self::GasPrice => "eth_gasPrice",
			Self::EstimateGas => "eth_estimateGas",
		}
	}
}

impl fmt::Display for RpcMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
