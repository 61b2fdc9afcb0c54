// subprovider-core/src/engine.rs

use crate::middleware::{CompletionHook, Middleware, Outcome, Transport, TransportMiddleware};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use rand::Rng;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use subprovider_types::{ProviderError, RequestEnvelope, ResponseEnvelope};
use tracing::{debug, trace};

type MiddlewareFactory = Box<dyn FnOnce(Emitter) -> Arc<dyn Middleware> + Send>;

/// Handle through which a middleware re-enters the pipeline of its own engine.
///
/// The back-reference is weak: once the engine is dropped every emit fails
/// with [`ProviderError::EngineDropped`].
#[derive(Clone)]
pub struct Emitter {
	engine: Weak<Engine>,
}

impl Emitter {
	/// An emitter bound to no engine.
	pub fn detached() -> Self {
		Self {
			engine: Weak::new(),
		}
	}

	/// Sends a fresh request through the whole pipeline, from the first middleware.
	pub async fn emit(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError> {
		let engine = self.engine.upgrade().ok_or(ProviderError::EngineDropped)?;
		let request = engine.request(method, params);
		debug!("Emitting {} (id {})", request.method(), request.id());
		engine.dispatch(&request).await
	}
}

impl fmt::Debug for Emitter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Emitter")
			.field("attached", &(self.engine.strong_count() > 0))
			.finish()
	}
}

/// Collects middlewares in pipeline order.
pub struct EngineBuilder {
	label: String,
	factories: Vec<MiddlewareFactory>,
}

impl Default for EngineBuilder {
	fn default() -> Self {
		Self {
			label: DEFAULT_LABEL.to_string(),
			factories: Vec::new(),
		}
	}
}

const DEFAULT_LABEL: &str = "engine";

impl EngineBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Name the engine reports when wrapped in a [`SubPipeline`].
	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = label.into();
		self
	}

	/// Appends a middleware that never emits sub-requests.
	pub fn middleware<M: Middleware + 'static>(self, middleware: M) -> Self {
		self.shared(Arc::new(middleware))
	}

	/// Appends an already shared middleware.
	pub fn shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.factories.push(Box::new(move |_| middleware));
		self
	}

	/// Appends a middleware built from the emitter of the engine being built.
	pub fn middleware_with<F, M>(mut self, factory: F) -> Self
	where
		F: FnOnce(Emitter) -> M + Send + 'static,
		M: Middleware + 'static,
	{
		self.factories.push(Box::new(move |emitter| {
			let middleware: Arc<dyn Middleware> = Arc::new(factory(emitter));
			middleware
		}));
		self
	}

	/// Appends a terminal transport.
	pub fn transport<T: Transport + 'static>(self, transport: T) -> Self {
		self.middleware(TransportMiddleware::new(transport))
	}

	pub fn build(self) -> Arc<Engine> {
		Arc::new_cyclic(|weak| {
			let middlewares = self
				.factories
				.into_iter()
				.map(|factory| {
					factory(Emitter {
						engine: weak.clone(),
					})
				})
				.collect();

			Engine {
				label: self.label,
				middlewares,
				next_id: AtomicU64::new(initial_request_id()),
			}
		})
	}
}

/// Millisecond timestamp times 1000 plus a random offset, so ids from two
/// engines started in the same millisecond are unlikely to collide.
fn initial_request_id() -> u64 {
	let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
	millis * 1000 + rand::thread_rng().gen_range(0..1000)
}

/// Ordered middleware pipeline.
pub struct Engine {
	label: String,
	middlewares: Vec<Arc<dyn Middleware>>,
	next_id: AtomicU64,
}

impl Engine {
	pub fn builder() -> EngineBuilder {
		EngineBuilder::new()
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	/// Next request id of this engine. Ids strictly increase.
	pub fn next_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}

	/// Builds an envelope with a fresh id.
	pub fn request(&self, method: &str, params: Vec<Value>) -> RequestEnvelope {
		RequestEnvelope::new(self.next_id(), method, params)
	}

	pub async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError> {
		let request = self.request(method, params);
		self.dispatch(&request).await
	}

	/// Runs the pipeline and wraps the result in a response carrying the request's id.
	pub async fn handle(&self, request: RequestEnvelope) -> ResponseEnvelope {
		let result = self.dispatch(&request).await;
		ResponseEnvelope::from_result(request.id(), result)
	}

	pub fn middleware_names(&self) -> Vec<&str> {
		self.middlewares.iter().map(|m| m.name()).collect()
	}

	/// Walks the middlewares until one responds, then runs the queued
	/// completion hooks last-registered first.
	pub fn dispatch<'a>(
		&'a self,
		request: &'a RequestEnvelope,
	) -> BoxFuture<'a, Result<Value, ProviderError>> {
		async move {
			let mut hooks: Vec<CompletionHook> = Vec::new();
			let mut resolved = None;

			for middleware in &self.middlewares {
				match middleware.handle(request).await {
					Outcome::Respond(result) => {
						trace!(
							"{} answered by {} (id {})",
							request.method(),
							middleware.name(),
							request.id()
						);
						resolved = Some(result);
						break;
					}
					Outcome::Next => {}
					Outcome::NextThen(hook) => hooks.push(hook),
				}
			}

			let result = resolved
				.unwrap_or_else(|| Err(ProviderError::Unhandled(request.method().to_string())));

			for hook in hooks.into_iter().rev() {
				hook(&result);
			}

			result
		}
		.boxed()
	}
}

/// A whole pipeline standing in for a single upstream, e.g. as one
/// candidate of a failover group.
#[derive(Clone)]
pub struct SubPipeline {
	engine: Arc<Engine>,
}

impl SubPipeline {
	pub fn new(engine: Arc<Engine>) -> Self {
		Self { engine }
	}

	pub fn engine(&self) -> &Arc<Engine> {
		&self.engine
	}
}

#[async_trait]
impl Transport for SubPipeline {
	async fn request(&self, request: &RequestEnvelope) -> Result<Value, ProviderError> {
		self.engine.dispatch(request).await
	}

	fn endpoint(&self) -> &str {
		&self.engine.label
	}
}

impl fmt::Debug for Engine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Engine")
			.field("label", &self.label)
			.field("middlewares", &self.middleware_names())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::ScriptedUpstream;
	use async_trait::async_trait;
	use serde_json::json;
	use std::sync::Mutex;

	type Journal = Arc<Mutex<Vec<String>>>;

	/// Records that it saw the request and then forwards it, with a hook.
	struct Observer {
		label: &'static str,
		journal: Journal,
	}

	#[async_trait]
	impl Middleware for Observer {
		fn name(&self) -> &str {
			self.label
		}

		async fn handle(&self, _request: &RequestEnvelope) -> Outcome {
			self.journal.lock().unwrap().push(format!("{} handle", self.label));
			let journal = self.journal.clone();
			let label = self.label;
			Outcome::then(move |result| {
				let verdict = if result.is_ok() { "ok" } else { "err" };
				journal.lock().unwrap().push(format!("{} hook {}", label, verdict));
			})
		}
	}

	struct Answer(Value);

	#[async_trait]
	impl Middleware for Answer {
		fn name(&self) -> &str {
			"answer"
		}

		async fn handle(&self, _request: &RequestEnvelope) -> Outcome {
			Outcome::respond(self.0.clone())
		}
	}

	/// Answers `outer` by emitting `inner` through its engine.
	struct Relay {
		emitter: Emitter,
	}

	#[async_trait]
	impl Middleware for Relay {
		fn name(&self) -> &str {
			"relay"
		}

		async fn handle(&self, request: &RequestEnvelope) -> Outcome {
			if request.method() != "outer" {
				return Outcome::Next;
			}
			Outcome::Respond(self.emitter.emit("inner", vec![json!(1)]).await)
		}
	}

	#[tokio::test]
	async fn test_first_responder_wins() {
		let upstream = ScriptedUpstream::new();
		let engine = Engine::builder()
			.middleware(Answer(json!("local")))
			.transport(upstream.clone())
			.build();

		let result = engine.send("eth_chainId", vec![]).await.unwrap();

		assert_eq!(result, json!("local"));
		assert!(upstream.calls().is_empty());
	}

	#[tokio::test]
	async fn test_hooks_run_in_reverse_order_after_resolution() {
		let journal: Journal = Arc::default();
		let engine = Engine::builder()
			.middleware(Observer {
				label: "a",
				journal: journal.clone(),
			})
			.middleware(Observer {
				label: "b",
				journal: journal.clone(),
			})
			.middleware(Answer(json!(true)))
			.build();

		engine.send("eth_blockNumber", vec![]).await.unwrap();

		assert_eq!(
			*journal.lock().unwrap(),
			vec!["a handle", "b handle", "b hook ok", "a hook ok"]
		);
	}

	#[tokio::test]
	async fn test_unhandled_request_fails_and_still_runs_hooks() {
		let journal: Journal = Arc::default();
		let engine = Engine::builder()
			.middleware(Observer {
				label: "only",
				journal: journal.clone(),
			})
			.build();

		let result = engine.send("eth_foo", vec![]).await;

		assert!(matches!(result, Err(ProviderError::Unhandled(ref m)) if m == "eth_foo"));
		assert_eq!(journal.lock().unwrap().last().unwrap(), "only hook err");
	}

	#[tokio::test]
	async fn test_emitter_reenters_the_full_pipeline() {
		let upstream = ScriptedUpstream::new();
		upstream.respond("inner", json!("0x2a"));

		let engine = Engine::builder()
			.middleware_with(|emitter| Relay { emitter })
			.transport(upstream.clone())
			.build();

		let result = engine.send("outer", vec![]).await.unwrap();

		assert_eq!(result, json!("0x2a"));
		let calls = upstream.calls();
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].method(), "inner");
		assert_eq!(calls[0].params(), &[json!(1)]);
	}

	#[tokio::test]
	async fn test_emitter_fails_once_engine_is_dropped() {
		let captured: Arc<Mutex<Option<Emitter>>> = Arc::default();
		let slot = captured.clone();
		let engine = Engine::builder()
			.middleware_with(move |emitter| {
				*slot.lock().unwrap() = Some(emitter.clone());
				Relay { emitter }
			})
			.build();
		drop(engine);

		let emitter = captured.lock().unwrap().take().unwrap();
		let result = emitter.emit("eth_accounts", vec![]).await;
		assert!(matches!(result, Err(ProviderError::EngineDropped)));
		assert!(matches!(
			Emitter::detached().emit("eth_accounts", vec![]).await,
			Err(ProviderError::EngineDropped)
		));
	}

	#[tokio::test]
	async fn test_handle_keeps_request_id() {
		let engine = Engine::builder().middleware(Answer(json!("0x1"))).build();

		let response = engine
			.handle(RequestEnvelope::new(42, "eth_chainId", vec![]))
			.await;
		assert_eq!(response.id(), 42);
		assert_eq!(response.result(), Some(&json!("0x1")));

		let failed = Engine::builder()
			.build()
			.handle(RequestEnvelope::new(43, "eth_chainId", vec![]))
			.await;
		assert_eq!(failed.id(), 43);
		assert!(failed.is_error());
	}

	#[test]
	fn test_request_ids_are_unique_and_increasing() {
		let engine = Engine::builder().build();
		let ids: Vec<u64> = (0..100).map(|_| engine.request("x", vec![]).id()).collect();

		assert!(ids.windows(2).all(|pair| pair[1] == pair[0] + 1));
		assert!(ids[0] > 1_000_000_000_000_000);
	}

	#[tokio::test]
	async fn test_sub_pipeline_as_terminal_of_another_engine() {
		let upstream = ScriptedUpstream::new();
		upstream.respond("eth_chainId", json!("0x1"));
		let inner = Engine::builder()
			.label("inner")
			.transport(upstream.clone())
			.build();
		let sub = SubPipeline::new(inner);
		assert_eq!(sub.endpoint(), "inner");

		let outer = Engine::builder().transport(sub).build();

		assert_eq!(outer.middleware_names(), vec!["inner"]);
		assert_eq!(outer.send("eth_chainId", vec![]).await.unwrap(), json!("0x1"));
		assert_eq!(upstream.calls_to("eth_chainId"), 1);
	}
}
