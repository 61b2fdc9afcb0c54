// subprovider-transport/src/failover.rs

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use subprovider_core::Transport;
use subprovider_types::{ProviderError, RequestEnvelope};
use tracing::{info, warn};

/// Tries each candidate once, in order, and returns the first success.
///
/// When every candidate fails the last error is returned. A failover group is
/// itself a [`Transport`], so groups nest.
pub struct Failover {
	candidates: Vec<Arc<dyn Transport>>,
}

impl Failover {
	pub fn new(candidates: Vec<Arc<dyn Transport>>) -> Result<Self, ProviderError> {
		if candidates.is_empty() {
			return Err(ProviderError::Config(
				"Failover needs at least one upstream".to_string(),
			));
		}
		Ok(Self { candidates })
	}

	pub fn len(&self) -> usize {
		self.candidates.len()
	}

	pub fn is_empty(&self) -> bool {
		self.candidates.is_empty()
	}

	pub fn endpoints(&self) -> Vec<&str> {
		self.candidates.iter().map(|c| c.endpoint()).collect()
	}
}

#[async_trait]
impl Transport for Failover {
	async fn request(&self, request: &RequestEnvelope) -> Result<Value, ProviderError> {
		let mut last_error = None;

		for (index, candidate) in self.candidates.iter().enumerate() {
			match candidate.request(request).await {
				Ok(value) => {
					if index > 0 {
						info!(
							"{} served by fallback endpoint {} after {} failure(s)",
							request.method(),
							candidate.endpoint(),
							index
						);
					}
					return Ok(value);
				}
				Err(e) => {
					warn!(
						"Endpoint {} failed for {}: {}",
						candidate.endpoint(),
						request.method(),
						e
					);
					last_error = Some(e);
				}
			}
		}

		Err(last_error
			.unwrap_or_else(|| ProviderError::Config("No upstream endpoints configured".to_string())))
	}

	fn endpoint(&self) -> &str {
		"failover"
	}
}
