// subprovider-core/src/implementations/fixed_gas.rs

use crate::middleware::{Middleware, Outcome};
use async_trait::async_trait;
use serde_json::Value;
use subprovider_types::{RequestEnvelope, RpcMethod, U256};

/// Answers `eth_estimateGas` with a constant, for dev nodes whose estimates are unreliable.
#[derive(Debug, Clone)]
pub struct FixedGasEstimateMiddleware {
	gas: U256,
}

impl FixedGasEstimateMiddleware {
	pub fn new(gas: impl Into<U256>) -> Self {
		Self { gas: gas.into() }
	}

	pub fn gas(&self) -> U256 {
		self.gas
	}
}

#[async_trait]
impl Middleware for FixedGasEstimateMiddleware {
	fn name(&self) -> &str {
		"fixed_gas_estimate"
	}

	async fn handle(&self, request: &RequestEnvelope) -> Outcome {
		match RpcMethod::from_name(request.method()) {
			Some(RpcMethod::EstimateGas) => {
				Outcome::respond(Value::String(format!("0x{:x}", self.gas)))
			}
			_ => Outcome::Next,
		}
	}
}
