//! Reverse synchronization: transfer events from the grid API become rows
//! in the ledger's audit table.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::infra::grid_api::GridApi;
use crate::infra::ledger::LedgerStore;
use crate::util::clock;

/// Wheel ids partitioned by whether their transfer flag was patched. Field
/// names follow the upstream reporting contract.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReverseOutcome {
	#[serde(rename = "transferred_wheels")]
	pub transferred: Vec<String>,
	#[serde(rename = "failed_wheels")]
	pub failed: Vec<String>,
}

/// Pulls pending transfer events and appends audit rows for them.
///
/// The insert is guarded by the natural-key existence check, so re-observing
/// a wheel (after a failed flag patch, say) never writes a second row. A
/// ledger failure aborts the run, while a flag patch failure only records
/// that wheel as failed and moves on.
pub struct ReverseSync {
	ledger: Arc<dyn LedgerStore>,
	write_table: String,
	use_timezone: bool,
}

impl ReverseSync {
	pub fn new(config: &Config, ledger: Arc<dyn LedgerStore>) -> Self {
		Self {
			ledger,
			write_table: config.ledger.write_table.clone(),
			use_timezone: config.sync.use_timezone,
		}
	}

	pub async fn run(&self, api: &dyn GridApi) -> Result<ReverseOutcome> {
		let wheels = api.fetch_pending_transfers().await?;

		let mut outcome = ReverseOutcome::default();
		for wheel in wheels {
			let key = wheel.sql_data.key();
			if self.ledger.exists(&self.write_table, &key).await? {
				debug!(wheel_id = %wheel.id, "audit row already present, insert suppressed");
			} else {
				let stamp = clock::audit_stamp(self.use_timezone);
				self.ledger
					.insert_audit(
						&self.write_table,
						&key,
						&wheel.status,
						wheel.stack_position(),
						&stamp,
					)
					.await?;
			}

			// Inserted or suppressed, the audit row is in place; a patch
			// failure here only makes the next run re-observe this wheel.
			match api.mark_transferred(&wheel.id).await {
				Ok(()) => outcome.transferred.push(wheel.id),
				Err(e) => {
					warn!(wheel_id = %wheel.id, error = %e, "transfer flag patch failed");
					outcome.failed.push(wheel.id);
				}
			}
		}

		Ok(outcome)
	}
}
