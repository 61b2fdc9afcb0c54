//! HTTP endpoint for JSON-RPC requests.
//!
//! Accepts a single envelope or a batch on `POST /` and answers each one
//! through the engine. Batch entries run concurrently and keep their order.

use anyhow::{Context, Result};
use axum::{
	body::Bytes,
	extract::State,
	routing::{get, post},
	Json, Router,
};
use futures::future::join_all;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use subprovider_config::ServerConfig;
use subprovider_core::Engine;
use subprovider_types::{JsonRpcError, RequestEnvelope, JSONRPC_VERSION};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
	engine: Arc<Engine>,
}

/// Builds the router serving the engine.
pub fn router(engine: Arc<Engine>, cors: bool) -> Router {
	let router = Router::new()
		.route("/", post(handle_rpc))
		.route("/health", get(health))
		.with_state(AppState { engine })
		.layer(TraceLayer::new_for_http());

	if cors {
		router.layer(CorsLayer::permissive())
	} else {
		router
	}
}

/// Binds the listener and serves until `shutdown` resolves.
pub async fn serve<F>(engine: Arc<Engine>, config: &ServerConfig, shutdown: F) -> Result<()>
where
	F: Future<Output = ()> + Send + 'static,
{
	let listener = TcpListener::bind(&config.listen)
		.await
		.with_context(|| format!("Failed to bind {}", config.listen))?;
	info!("JSON-RPC server listening on {}", listener.local_addr()?);

	axum::serve(listener, router(engine, config.cors))
		.with_graceful_shutdown(shutdown)
		.await
		.context("Server error")?;

	info!("JSON-RPC server stopped");
	Ok(())
}

async fn health() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}

async fn handle_rpc(State(state): State<AppState>, body: Bytes) -> Json<Value> {
	let payload: Value = match serde_json::from_slice(&body) {
		Ok(payload) => payload,
		Err(e) => {
			warn!("Rejecting unparseable request body: {}", e);
			return Json(error_response(
				Value::Null,
				JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("Parse error: {}", e)),
			));
		}
	};

	match payload {
		Value::Array(batch) if batch.is_empty() => Json(error_response(
			Value::Null,
			JsonRpcError::new(JsonRpcError::INVALID_REQUEST, "Empty batch"),
		)),
		Value::Array(batch) => {
			let responses = join_all(batch.into_iter().map(|entry| answer(&state.engine, entry))).await;
			Json(Value::Array(responses))
		}
		single => Json(answer(&state.engine, single).await),
	}
}

async fn answer(engine: &Engine, payload: Value) -> Value {
	let id = payload.get("id").cloned().unwrap_or(Value::Null);

	let request: RequestEnvelope = match serde_json::from_value(payload) {
		Ok(request) => request,
		Err(e) => {
			return error_response(
				id,
				JsonRpcError::new(JsonRpcError::INVALID_REQUEST, format!("Invalid request: {}", e)),
			)
		}
	};

	let response = engine.handle(request).await;
	serde_json::to_value(&response).unwrap_or_else(|e| {
		error_response(
			id,
			JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, format!("Failed to encode response: {}", e)),
		)
	})
}

/// Error envelope for requests that never reached the engine.
fn error_response(id: Value, error: JsonRpcError) -> Value {
	json!({
		"jsonrpc": JSONRPC_VERSION,
		"id": id,
		"error": error,
	})
}
