use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use subprovider_config::{Config, ConfigLoader};
use subprovider_service::{pipeline, server, telemetry};
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rpc-engine")]
#[command(about = "Ethereum JSON-RPC signing middleware", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", env = "CONFIG_FILE", default_value = "config.toml")]
	config: PathBuf,

	/// Overrides `logging.level` from the configuration
	#[arg(long, env = "SUBPROVIDER_LOG_LEVEL")]
	log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
	/// Serve JSON-RPC over HTTP
	Serve,
	/// Validate the configuration file
	Validate,
	/// Print the accounts exposed by the configured wallet
	Accounts,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = ConfigLoader::from_file(&cli.config).context("Failed to load configuration")?;

	let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
	telemetry::setup_tracing(level, config.logging.json)?;

	match &cli.command {
		Some(Commands::Serve) | None => serve(config).await,
		Some(Commands::Validate) => validate(&cli, &config),
		Some(Commands::Accounts) => accounts(&config).await,
	}
}

async fn serve(config: Config) -> Result<()> {
	info!("Starting rpc-engine");
	info!("Wallet: {}", config.wallet.kind());
	info!("Upstream endpoints: {}", config.upstream.endpoints.join(", "));

	let engine = pipeline::build_engine(&config).context("Failed to build engine")?;
	server::serve(engine, &config.server, setup_shutdown_signal()).await
}

fn validate(cli: &Cli, config: &Config) -> Result<()> {
	info!("Configuration {:?} is valid", cli.config);
	info!("  Wallet: {}", config.wallet.kind());
	info!("  Nonce tracking: {}", config.engine.nonce_tracking);
	if let Some(gas) = config.engine.fixed_gas_estimate {
		info!("  Fixed gas estimate: {}", gas);
	}
	for (index, endpoint) in config.upstream.endpoints.iter().enumerate() {
		info!("  Upstream #{}: {}", index + 1, endpoint);
	}
	info!("  Listen: {}", config.server.listen);
	Ok(())
}

async fn accounts(config: &Config) -> Result<()> {
	let engine = pipeline::build_engine(config).context("Failed to build engine")?;
	let accounts = engine
		.send("eth_accounts", vec![])
		.await
		.context("Failed to list accounts")?;

	for account in accounts.as_array().into_iter().flatten() {
		if let Some(address) = account.as_str() {
			println!("{}", address);
		}
	}
	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			warn!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				warn!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	info!("Shutdown signal received");
}
