//! Periodic execution of the pipeline stages.
//!
//! Each stage runs on its own fixed cadence, sequentially within its own
//! loop, so at most one instance of a stage is ever in flight. Stages
//! overlap each other freely; cross-stage correctness comes from the
//! idempotent store operations, not from locks. A failed run is logged and
//! the loop waits for the next tick, queue durability carries the work over.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{error, info};

use crate::config::{ApiConfig, Cadence, Config};
use crate::infra::grid_api::HttpGridApi;
use crate::infra::ledger::LedgerStore;
use crate::infra::staging::StagingQueue;
use crate::service::ack::AckSweep;
use crate::service::cleanup::CleanupSweep;
use crate::service::forward::ForwardSync;
use crate::service::reverse::ReverseSync;

/// Requests an out-of-schedule run of a downstream stage.
///
/// Kicks are fire-and-forget: when nobody listens (a one-shot run) or a
/// kick is already pending, the send is dropped. The stage's own cadence
/// covers whatever a dropped kick would have triggered.
#[derive(Debug, Clone)]
pub struct Kicks {
	ack: mpsc::Sender<()>,
	cleanup: mpsc::Sender<()>,
}

/// Receiving half of [`Kicks`], consumed by the stage loops.
#[derive(Debug)]
pub struct KickReceivers {
	pub ack: mpsc::Receiver<()>,
	pub cleanup: mpsc::Receiver<()>,
}

impl Kicks {
	pub fn channel() -> (Self, KickReceivers) {
		// Capacity 1: one pending kick already guarantees a sweep.
		let (ack_tx, ack_rx) = mpsc::channel(1);
		let (cleanup_tx, cleanup_rx) = mpsc::channel(1);
		(
			Self {
				ack: ack_tx,
				cleanup: cleanup_tx,
			},
			KickReceivers {
				ack: ack_rx,
				cleanup: cleanup_rx,
			},
		)
	}

	/// A handle whose kicks go nowhere, for one-shot task runs.
	pub fn disconnected() -> Self {
		Self::channel().0
	}

	pub fn kick_ack(&self) {
		let _ = self.ack.try_send(());
	}

	pub fn kick_cleanup(&self) {
		let _ = self.cleanup.try_send(());
	}
}

/// Owns the four tasks and drives them on their cadences.
///
/// The grid API session is established fresh for every run that needs one,
/// matching the per-run login of the one-shot commands. The scan ledger and
/// staging connections are shared and pooled underneath.
pub struct Scheduler {
	client: Client,
	api: ApiConfig,
	cadence: Cadence,
	forward: ForwardSync,
	ack: AckSweep,
	cleanup: CleanupSweep,
	reverse: ReverseSync,
	kicks: KickReceivers,
}

impl Scheduler {
	pub fn new(
		config: &Config,
		client: Client,
		ledger: Arc<dyn LedgerStore>,
		staging: Arc<dyn StagingQueue>,
	) -> Self {
		let (kicks, receivers) = Kicks::channel();
		Self {
			client,
			api: config.api.clone(),
			cadence: config.cadence.clone(),
			forward: ForwardSync::new(config, ledger.clone(), staging.clone(), kicks),
			ack: AckSweep::new(config, ledger.clone(), staging.clone()),
			cleanup: CleanupSweep::new(config, staging),
			reverse: ReverseSync::new(config, ledger),
			kicks: receivers,
		}
	}

	/// Drives all four stage loops until the surrounding task is dropped.
	pub async fn run(self) {
		let Self {
			client,
			api,
			cadence,
			forward,
			ack,
			cleanup,
			reverse,
			kicks,
		} = self;

		tokio::join!(
			forward_loop(&forward, &client, &api, cadence.forward),
			ack_loop(&ack, cadence.ack, kicks.ack),
			cleanup_loop(&cleanup, &client, &api, cadence.cleanup, kicks.cleanup),
			reverse_loop(&reverse, &client, &api, cadence.reverse),
		);
	}
}

async fn forward_loop(task: &ForwardSync, client: &Client, api: &ApiConfig, every: Duration) {
	let mut tick = ticker(every);
	loop {
		tick.tick().await;
		let run = async {
			let session = HttpGridApi::login(client.clone(), api).await?;
			task.run(&session).await
		};
		match run.await {
			Ok(outcome) => {
				if !outcome.created_wheelstacks.is_empty() || !outcome.failed_wheels.is_empty() {
					info!(
						created = outcome.created_wheelstacks.len(),
						failed = outcome.failed_wheels.len(),
						"forward sync finished"
					);
				}
			}
			Err(e) => error!(error = %e, "forward sync failed"),
		}
	}
}

async fn ack_loop(task: &AckSweep, every: Duration, mut kick: mpsc::Receiver<()>) {
	let mut tick = ticker(every);
	loop {
		tokio::select! {
			_ = tick.tick() => {}
			Some(()) = kick.recv() => {}
		}
		match task.run().await {
			Ok(outcome) => {
				if !outcome.acked.is_empty() {
					info!(acked = outcome.acked.len(), "scan rows acknowledged");
				}
			}
			Err(e) => error!(error = %e, "acknowledgment sweep failed"),
		}
	}
}

async fn cleanup_loop(
	task: &CleanupSweep,
	client: &Client,
	api: &ApiConfig,
	every: Duration,
	mut kick: mpsc::Receiver<()>,
) {
	let mut tick = ticker(every);
	loop {
		tokio::select! {
			_ = tick.tick() => {}
			Some(()) = kick.recv() => {}
		}
		let run = async {
			let session = HttpGridApi::login(client.clone(), api).await?;
			task.run(&session).await
		};
		match run.await {
			Ok(outcome) => {
				if !outcome.cleared.is_empty() {
					info!(cleared = outcome.cleared.len(), "orphaned wheels deleted");
				}
			}
			Err(e) => error!(error = %e, "cleanup sweep failed"),
		}
	}
}

async fn reverse_loop(task: &ReverseSync, client: &Client, api: &ApiConfig, every: Duration) {
	let mut tick = ticker(every);
	loop {
		tick.tick().await;
		let run = async {
			let session = HttpGridApi::login(client.clone(), api).await?;
			task.run(&session).await
		};
		match run.await {
			Ok(outcome) => {
				if !outcome.transferred.is_empty() || !outcome.failed.is_empty() {
					info!(
						transferred = outcome.transferred.len(),
						failed = outcome.failed.len(),
						"transfer events synchronized"
					);
				}
			}
			Err(e) => error!(error = %e, "reverse sync failed"),
		}
	}
}

fn ticker(every: Duration) -> Interval {
	let mut tick = interval(every);
	// A run that overshoots its interval must not trigger a catch-up burst.
	tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
	tick
}
