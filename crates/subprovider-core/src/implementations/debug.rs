// subprovider-core/src/implementations/debug.rs

use crate::middleware::{Middleware, Outcome};
use async_trait::async_trait;
use subprovider_types::RequestEnvelope;
use tracing::debug;

/// Logs every request and the result it eventually resolves to.
#[derive(Debug, Clone)]
pub struct DebugMiddleware {
	label: String,
}

impl DebugMiddleware {
	pub fn new(label: impl Into<String>) -> Self {
		Self {
			label: label.into(),
		}
	}
}

impl Default for DebugMiddleware {
	fn default() -> Self {
		Self::new("rpc")
	}
}

#[async_trait]
impl Middleware for DebugMiddleware {
	fn name(&self) -> &str {
		"debug"
	}

	async fn handle(&self, request: &RequestEnvelope) -> Outcome {
		let label = self.label.clone();
		let id = request.id();
		let method = request.method().to_string();

		debug!(
			label = %label,
			id,
			method = %method,
			params = %serde_json::Value::from(request.params().to_vec()),
			"request"
		);

		Outcome::then(move |result| match result {
			Ok(value) => debug!(label = %label, id, method = %method, result = %value, "response"),
			Err(error) => debug!(label = %label, id, method = %method, error = %error, "error"),
		})
	}
}
