//! JSON-RPC request and response envelopes.

use crate::errors::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

fn default_version() -> String {
	JSONRPC_VERSION.to_string()
}

/// A single JSON-RPC call.
///
/// Envelopes are immutable once built; middlewares that need a different
/// request build a new one through the engine rather than editing this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
	id: u64,
	#[serde(default = "default_version")]
	jsonrpc: String,
	method: String,
	#[serde(default)]
	params: Vec<Value>,
}

impl RequestEnvelope {
	pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
		Self {
			id,
			jsonrpc: JSONRPC_VERSION.to_string(),
			method: method.into(),
			params,
		}
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn jsonrpc(&self) -> &str {
		&self.jsonrpc
	}

	pub fn method(&self) -> &str {
		&self.method
	}

	pub fn params(&self) -> &[Value] {
		&self.params
	}

	/// Positional parameter, `None` when the caller sent fewer params.
	pub fn param(&self, index: usize) -> Option<&Value> {
		self.params.get(index)
	}

	/// Positional parameter as a string slice.
	pub fn param_str(&self, index: usize) -> Option<&str> {
		self.param(index).and_then(Value::as_str)
	}
}

/// Error object as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl JsonRpcError {
	pub const PARSE_ERROR: i64 = -32700;
	pub const INVALID_REQUEST: i64 = -32600;
	pub const METHOD_NOT_FOUND: i64 = -32601;
	pub const INVALID_PARAMS: i64 = -32602;
	pub const INTERNAL_ERROR: i64 = -32603;
	pub const SERVER_ERROR: i64 = -32000;

	pub fn new(code: i64, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			data: None,
		}
	}

	pub fn with_data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}
}

impl fmt::Display for JsonRpcError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} (code {})", self.message, self.code)
	}
}

/// Answer to a [`RequestEnvelope`].
///
/// Only [`ResponseEnvelope::success`] and [`ResponseEnvelope::failure`] build
/// one, so exactly one of `result` / `error` is ever present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
	id: u64,
	jsonrpc: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	error: Option<JsonRpcError>,
}

impl ResponseEnvelope {
	pub fn success(id: u64, result: Value) -> Self {
		Self {
			id,
			jsonrpc: JSONRPC_VERSION.to_string(),
			result: Some(result),
			error: None,
		}
	}

	pub fn failure(id: u64, error: JsonRpcError) -> Self {
		Self {
			id,
			jsonrpc: JSONRPC_VERSION.to_string(),
			result: None,
			error: Some(error),
		}
	}

	/// Builds the envelope for the outcome of a pipeline run.
	pub fn from_result(id: u64, result: Result<Value, ProviderError>) -> Self {
		match result {
			Ok(value) => Self::success(id, value),
			Err(error) => Self::failure(id, JsonRpcError::from(&error)),
		}
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn result(&self) -> Option<&Value> {
		self.result.as_ref()
	}

	pub fn error(&self) -> Option<&JsonRpcError> {
		self.error.as_ref()
	}

	pub fn is_error(&self) -> bool {
		self.error.is_some()
	}

	pub fn into_result(self) -> Result<Value, JsonRpcError> {
		match self.error {
			Some(error) => Err(error),
			None => Ok(self.result.unwrap_or(Value::Null)),
		}
	}
}
