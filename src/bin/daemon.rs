//! Long-running synchronization daemon: all four pipeline stages on their
//! cadences, until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gridsync::infra::grid_api::http_client;
use gridsync::infra::ledger::{LedgerStore, SqlLedger};
use gridsync::infra::staging::{RedisStaging, StagingQueue};
use gridsync::service::Scheduler;
use gridsync::Config;

#[derive(Debug, Parser)]
#[command(name = "gridsyncd", about = "Grid inventory synchronization daemon", version)]
struct Args {
	/// Env file to load before reading configuration. Without the flag,
	/// `./.env` is loaded when present.
	#[arg(long)]
	env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	match &args.env_file {
		Some(path) => {
			dotenv::from_path(path)?;
		}
		None => {
			dotenv::dotenv().ok();
		}
	}

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("gridsync=info,gridsyncd=info")),
		)
		.init();

	let config = Config::from_env()?;

	let ledger: Arc<dyn LedgerStore> =
		Arc::new(SqlLedger::connect(&config.ledger.url, config.sync.use_timezone).await?);
	let staging: Arc<dyn StagingQueue> =
		Arc::new(RedisStaging::connect(&config.staging.url).await?);
	let client = http_client(&config.api)?;

	info!(
		platform = %config.sync.platform_name,
		read_table = %config.ledger.read_table,
		write_table = %config.ledger.write_table,
		"starting synchronization pipeline"
	);

	let scheduler = Scheduler::new(&config, client, ledger, staging);

	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = scheduler.run() => {}
		() = ctrl_c => info!("received Ctrl+C, shutting down"),
		() = terminate => info!("received SIGTERM, shutting down"),
	}

	Ok(())
}
