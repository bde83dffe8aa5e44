//! Acknowledgment of synchronized rows in the scan ledger.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::domain::scan::{ScanKey, ScanRow};
use crate::error::Result;
use crate::infra::ledger::LedgerStore;
use crate::infra::staging::StagingQueue;
use crate::util::retry::RetryPolicy;

/// Rows whose `mark` flag was flipped by one sweep.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct AckOutcome {
	pub acked: Vec<ScanRow>,
}

/// Drains the acknowledgment queue into `mark = 1` ledger updates.
///
/// Queue entries survive until the batched update has committed; a sweep cut
/// short by a store outage leaves every entry in place and the next sweep
/// starts over. Marking is conditional on `mark = 0`, so replaying an entry
/// is harmless.
pub struct AckSweep {
	ledger: Arc<dyn LedgerStore>,
	staging: Arc<dyn StagingQueue>,
	read_table: String,
	ack_queue: String,
	retry: RetryPolicy,
}

impl AckSweep {
	pub fn new(
		config: &Config,
		ledger: Arc<dyn LedgerStore>,
		staging: Arc<dyn StagingQueue>,
	) -> Self {
		Self {
			ledger,
			staging,
			read_table: config.ledger.read_table.clone(),
			ack_queue: config.staging.ack_queue.clone(),
			retry: config.retry,
		}
	}

	pub async fn run(&self) -> Result<AckOutcome> {
		let entries = self
			.retry
			.run("acknowledgment queue snapshot", || {
				self.staging.snapshot(&self.ack_queue)
			})
			.await?;
		if entries.is_empty() {
			return Ok(AckOutcome::default());
		}

		// An entry that does not decode is a contract violation; neither a
		// retry nor a partial acknowledgment can be correct, so the sweep
		// aborts whole and leaves the queue for inspection.
		let rows = entries
			.iter()
			.map(|entry| serde_json::from_str::<ScanRow>(entry))
			.collect::<Result<Vec<_>, _>>()?;
		let keys: Vec<ScanKey> = rows.iter().map(ScanRow::key).collect();

		debug!(entries = entries.len(), "acknowledging staged scan rows");
		self.retry
			.run("ledger acknowledgment", || {
				self.ledger.mark_consumed(&self.read_table, &keys)
			})
			.await?;

		// Only now is the update durable; the entries may leave the queue.
		for entry in &entries {
			self.staging.remove(&self.ack_queue, entry).await?;
		}

		Ok(AckOutcome { acked: rows })
	}
}
