// subprovider-core/src/middleware.rs

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use subprovider_types::{ProviderError, RequestEnvelope};

/// Callback run once the request it was registered for has resolved.
pub type CompletionHook = Box<dyn FnOnce(&Result<Value, ProviderError>) + Send>;

/// What a middleware decided to do with a request.
pub enum Outcome {
	/// Final answer; no later middleware sees the request.
	Respond(Result<Value, ProviderError>),
	/// Pass the request on unchanged.
	Next,
	/// Pass the request on and observe the final result.
	NextThen(CompletionHook),
}

impl Outcome {
	pub fn respond(value: Value) -> Self {
		Self::Respond(Ok(value))
	}

	pub fn fail(error: ProviderError) -> Self {
		Self::Respond(Err(error))
	}

	pub fn then<F>(hook: F) -> Self
	where
		F: FnOnce(&Result<Value, ProviderError>) + Send + 'static,
	{
		Self::NextThen(Box::new(hook))
	}

	pub fn is_respond(&self) -> bool {
		matches!(self, Self::Respond(_))
	}
}

impl From<Result<Value, ProviderError>> for Outcome {
	fn from(result: Result<Value, ProviderError>) -> Self {
		Self::Respond(result)
	}
}

impl fmt::Debug for Outcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Respond(result) => f.debug_tuple("Respond").field(result).finish(),
			Self::Next => f.write_str("Next"),
			Self::NextThen(_) => f.write_str("NextThen(..)"),
		}
	}
}

/// A single stage of the request pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
	/// Short name used in logs.
	fn name(&self) -> &str;

	async fn handle(&self, request: &RequestEnvelope) -> Outcome;
}

/// Terminal backend that actually talks to a node.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn request(&self, request: &RequestEnvelope) -> Result<Value, ProviderError>;

	/// Endpoint label used in logs and error messages.
	fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
	async fn request(&self, request: &RequestEnvelope) -> Result<Value, ProviderError> {
		(**self).request(request).await
	}

	fn endpoint(&self) -> &str {
		(**self).endpoint()
	}
}

/// Adapts a [`Transport`] into a middleware that answers every request.
pub struct TransportMiddleware<T> {
	transport: T,
}

impl<T: Transport> TransportMiddleware<T> {
	pub fn new(transport: T) -> Self {
		Self { transport }
	}

	pub fn transport(&self) -> &T {
		&self.transport
	}
}

#[async_trait]
impl<T: Transport> Middleware for TransportMiddleware<T> {
	fn name(&self) -> &str {
		self.transport.endpoint()
	}

	async fn handle(&self, request: &RequestEnvelope) -> Outcome {
		Outcome::Respond(self.transport.request(request).await)
	}
}
