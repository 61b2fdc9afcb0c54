//! Scripted upstream for tests of crates built on the engine.

use crate::middleware::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use subprovider_types::{ProviderError, RequestEnvelope};

type Scripted = Result<Value, ProviderError>;

#[derive(Default)]
struct Script {
	queued: HashMap<String, VecDeque<Scripted>>,
	sticky: HashMap<String, Value>,
	calls: Vec<RequestEnvelope>,
}

/// Terminal transport answering from per-method scripts and recording every call.
///
/// Queued answers are used once, in order. When a method's queue is empty the
/// sticky answer is used, and with neither the call fails as unhandled.
/// Clones share the same script.
#[derive(Clone, Default)]
pub struct ScriptedUpstream {
	script: Arc<Mutex<Script>>,
}

impl ScriptedUpstream {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, Script> {
		self.script
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Queues one successful answer.
	pub fn respond(&self, method: &str, value: Value) -> &Self {
		self.push(method, Ok(value))
	}

	/// Queues one failure.
	pub fn fail(&self, method: &str, error: ProviderError) -> &Self {
		self.push(method, Err(error))
	}

	/// Answer used whenever nothing is queued.
	pub fn always(&self, method: &str, value: Value) -> &Self {
		self.lock().sticky.insert(method.to_string(), value);
		self
	}

	fn push(&self, method: &str, answer: Scripted) -> &Self {
		self.lock()
			.queued
			.entry(method.to_string())
			.or_default()
			.push_back(answer);
		self
	}

	pub fn calls(&self) -> Vec<RequestEnvelope> {
		self.lock().calls.clone()
	}

	pub fn calls_to(&self, method: &str) -> usize {
		self.lock()
			.calls
			.iter()
			.filter(|call| call.method() == method)
			.count()
	}
}

#[async_trait]
impl Transport for ScriptedUpstream {
	async fn request(&self, request: &RequestEnvelope) -> Result<Value, ProviderError> {
		let mut script = self.lock();
		script.calls.push(request.clone());

		if let Some(answer) = script
			.queued
			.get_mut(request.method())
			.and_then(VecDeque::pop_front)
		{
			return answer;
		}

		script
			.sticky
			.get(request.method())
			.cloned()
			.ok_or_else(|| ProviderError::Unhandled(request.method().to_string()))
	}

	fn endpoint(&self) -> &str {
		"scripted"
	}
}
