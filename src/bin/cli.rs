//! One-shot runs of the individual pipeline tasks, mostly for operations
//! work: draining a queue by hand, checking what a shuttle feed would
//! deliver next, replaying a failed sweep.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use gridsync::infra::grid_api::{http_client, HttpGridApi};
use gridsync::infra::ledger::{LedgerStore, SqlLedger};
use gridsync::infra::staging::{RedisStaging, StagingQueue};
use gridsync::service::{AckSweep, CleanupSweep, ForwardSync, Kicks, ReverseSync};
use gridsync::{Config, Result};

#[derive(Debug, Parser)]
#[command(
	name = "gridsync",
	about = "One-shot runs of the inventory synchronization tasks",
	version
)]
struct Args {
	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Push pending scan rows to the grid API as wheels and wheelstacks.
	Forward,
	/// Flip the mark flag of rows already synchronized forward.
	Ack,
	/// Delete wheel documents orphaned by abandoned wheelstacks.
	Cleanup,
	/// Pull transfer events into the ledger's audit table.
	Reverse,
	/// Print the earliest ready batch of one shuttle feed.
	Ready {
		/// Shuttle to inspect.
		#[arg(long)]
		shuttle: i32,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	dotenv::dotenv().ok();

	// Logs go to stderr; stdout carries only the JSON outcome.
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gridsync=warn")),
		)
		.with_writer(std::io::stderr)
		.init();

	let args = Args::parse();
	let config = Config::from_env()?;

	match args.command {
		Command::Forward => {
			let ledger = connect_ledger(&config).await?;
			let staging = connect_staging(&config).await?;
			let api = login(&config).await?;
			let task = ForwardSync::new(&config, ledger, staging, Kicks::disconnected());
			print_json(&task.run(&api).await?)
		}
		Command::Ack => {
			let ledger = connect_ledger(&config).await?;
			let staging = connect_staging(&config).await?;
			let task = AckSweep::new(&config, ledger, staging);
			print_json(&task.run().await?)
		}
		Command::Cleanup => {
			let staging = connect_staging(&config).await?;
			let api = login(&config).await?;
			let task = CleanupSweep::new(&config, staging);
			print_json(&task.run(&api).await?)
		}
		Command::Reverse => {
			let ledger = connect_ledger(&config).await?;
			let api = login(&config).await?;
			let task = ReverseSync::new(&config, ledger);
			print_json(&task.run(&api).await?)
		}
		Command::Ready { shuttle } => {
			let ledger = connect_ledger(&config).await?;
			let rows = ledger
				.fetch_ready_batch(&config.ledger.read_table, shuttle)
				.await?;
			print_json(&rows)
		}
	}
}

async fn connect_ledger(config: &Config) -> Result<Arc<dyn LedgerStore>> {
	Ok(Arc::new(
		SqlLedger::connect(&config.ledger.url, config.sync.use_timezone).await?,
	))
}

async fn connect_staging(config: &Config) -> Result<Arc<dyn StagingQueue>> {
	Ok(Arc::new(RedisStaging::connect(&config.staging.url).await?))
}

async fn login(config: &Config) -> Result<HttpGridApi> {
	HttpGridApi::login(http_client(&config.api)?, &config.api).await
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}
