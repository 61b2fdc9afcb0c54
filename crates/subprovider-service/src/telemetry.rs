use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set. With `json` every event
/// is written as one JSON object per line.
pub fn setup_tracing(level: &str, json: bool) -> Result<()> {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

	let registry = tracing_subscriber::registry().with(env_filter);
	let initialized = if json {
		registry
			.with(fmt::layer().json().with_target(true))
			.try_init()
	} else {
		registry.with(fmt::layer()).try_init()
	};

	initialized.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}
