// subprovider-transport/src/http.rs

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use subprovider_core::Transport;
use subprovider_types::{JsonRpcError, ProviderError, RequestEnvelope};
use tracing::debug;

pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Lenient view of a node's answer; nodes disagree on `jsonrpc` and `id` echoing.
#[derive(Debug, Deserialize)]
struct UpstreamResponse {
	#[serde(default)]
	result: Option<Value>,
	#[serde(default)]
	error: Option<JsonRpcError>,
}

/// JSON-RPC over HTTP POST against a single endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	url: String,
	client: reqwest::Client,
	timeout_ms: u64,
}

impl HttpTransport {
	pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ProviderError::Config(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			url: url.into(),
			client,
			timeout_ms: timeout.as_millis() as u64,
		})
	}

	pub fn with_default_timeout(url: impl Into<String>) -> Result<Self, ProviderError> {
		Self::new(url, Duration::from_millis(DEFAULT_TIMEOUT_MS))
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn timeout_ms(&self) -> u64 {
		self.timeout_ms
	}

	fn request_error(&self, error: reqwest::Error) -> ProviderError {
		if error.is_timeout() {
			ProviderError::Timeout {
				endpoint: self.url.clone(),
				timeout_ms: self.timeout_ms,
			}
		} else if error.is_connect() {
			ProviderError::transport(&self.url, format!("Connection failed: {}", error))
		} else {
			ProviderError::transport(&self.url, format!("HTTP request failed: {}", error))
		}
	}
}

fn status_message(status: StatusCode, body: &str) -> String {
	match status {
		StatusCode::METHOD_NOT_ALLOWED => "Method not allowed (405), the endpoint rejects POST".to_string(),
		StatusCode::TOO_MANY_REQUESTS => "Rate limited (429), too many requests".to_string(),
		StatusCode::GATEWAY_TIMEOUT => "Gateway timeout (504), the node took too long".to_string(),
		_ if body.is_empty() => format!("HTTP request failed with status: {}", status),
		_ => format!("HTTP request failed with status: {}: {}", status, body),
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn request(&self, request: &RequestEnvelope) -> Result<Value, ProviderError> {
		debug!("POST {} {} (id {})", self.url, request.method(), request.id());

		let response = self
			.client
			.post(&self.url)
			.json(request)
			.send()
			.await
			.map_err(|e| self.request_error(e))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(ProviderError::transport(
				&self.url,
				status_message(status, body.trim()),
			));
		}

		let body = response.text().await.map_err(|e| self.request_error(e))?;
		let parsed: UpstreamResponse = serde_json::from_str(&body).map_err(|e| {
			ProviderError::transport(&self.url, format!("Invalid JSON-RPC response: {}", e))
		})?;

		match parsed.error {
			Some(error) => Err(ProviderError::Rpc(error)),
			None => Ok(parsed.result.unwrap_or(Value::Null)),
		}
	}

	fn endpoint(&self) -> &str {
		&self.url
	}
}
