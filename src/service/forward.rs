//! Forward synchronization: pending scan rows become wheel and wheelstack
//! documents on the grid side.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{Config, SyncOptions};
use crate::domain::placement::{group_by_placement, GroupKey};
use crate::domain::wheel::{WheelPayload, WheelstackPayload};
use crate::error::Result;
use crate::infra::grid_api::GridApi;
use crate::infra::ledger::LedgerStore;
use crate::infra::staging::StagingQueue;
use crate::service::scheduler::Kicks;
use crate::util::clock;

/// Document ids created and orphaned by one forward run. Field names follow
/// the upstream reporting contract.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardOutcome {
	pub created_wheelstacks: Vec<String>,
	pub failed_wheels: Vec<String>,
}

/// Pushes pending scan rows to the grid API, one wheelstack at a time.
pub struct ForwardSync {
	ledger: Arc<dyn LedgerStore>,
	staging: Arc<dyn StagingQueue>,
	read_table: String,
	ack_queue: String,
	cleanup_queue: String,
	options: SyncOptions,
	kicks: Kicks,
}

impl ForwardSync {
	pub fn new(
		config: &Config,
		ledger: Arc<dyn LedgerStore>,
		staging: Arc<dyn StagingQueue>,
		kicks: Kicks,
	) -> Self {
		Self {
			ledger,
			staging,
			read_table: config.ledger.read_table.clone(),
			ack_queue: config.staging.ack_queue.clone(),
			cleanup_queue: config.staging.cleanup_queue.clone(),
			options: config.sync.clone(),
			kicks,
		}
	}

	/// One synchronization pass over the pending scan rows.
	///
	/// A wheelstack lands whole or not at all: wheels already created for a
	/// stack that then fails are routed to the cleanup queue, and the rows of
	/// the stack stay pending in the ledger for the next run. Rows of a
	/// created wheelstack are staged for ledger acknowledgment. Only a
	/// platform lookup or store failure aborts the run as a whole.
	pub async fn run(&self, api: &dyn GridApi) -> Result<ForwardOutcome> {
		let platform_id = api.resolve_platform(&self.options.platform_name).await?;

		let rows = self.ledger.fetch_pending(&self.read_table).await?;
		if rows.is_empty() {
			return Ok(ForwardOutcome::default());
		}

		let mut groups = group_by_placement(rows, self.options.max_stack_size);
		debug!(groups = groups.len(), "grouped pending scan rows");

		let mut failed_wheels: Vec<String> = Vec::new();

		// Wheel documents, stack by stack. The first failure abandons its
		// stack: wheels created so far become orphans, remaining slots are
		// never attempted.
		let mut abandoned: Vec<GroupKey> = Vec::new();
		'stacks: for (key, group) in groups.iter_mut() {
			for row in group.slots.iter().flatten() {
				let receipt = clock::observation_stamp(self.options.use_timezone);
				let payload =
					WheelPayload::from_row(row, &self.options.placement_status, &receipt);
				match api.create_wheel(&payload).await {
					Ok(wheel_id) => group.wheels.push(wheel_id),
					Err(e) => {
						warn!(
							stack = ?key,
							marked_part_no = row.marked_part_no,
							error = %e,
							"wheel creation failed, abandoning the stack",
						);
						failed_wheels.append(&mut group.wheels);
						abandoned.push(*key);
						continue 'stacks;
					}
				}
			}
		}
		for key in &abandoned {
			groups.remove(key);
		}

		// Stack documents for the intact groups. A rejected stack orphans its
		// wheels the same way; a created one gets its rows staged.
		let mut created_wheelstacks = Vec::new();
		let mut staged = 0usize;
		for (key, group) in &groups {
			let payload = WheelstackPayload {
				placement_id: &platform_id,
				placement_type: &self.options.placement_status,
				row_placement: key.0.to_string(),
				col_placement: key.1.to_string(),
				max_size: self.options.max_stack_size,
				batch_number: group.batch_number(),
				blocked: false,
				status: &self.options.placement_status,
				wheels: &group.wheels,
			};
			match api.create_wheelstack(&payload).await {
				Ok(stack_id) => {
					for row in group.occupied() {
						let entry = serde_json::to_string(row)?;
						self.staging.append(&self.ack_queue, &entry).await?;
						staged += 1;
					}
					created_wheelstacks.push(stack_id);
				}
				Err(e) => {
					warn!(stack = ?key, error = %e, "wheelstack creation failed");
					failed_wheels.extend(group.wheels.iter().cloned());
				}
			}
		}

		for wheel_id in &failed_wheels {
			self.staging.append(&self.cleanup_queue, wheel_id).await?;
		}

		if staged > 0 {
			self.kicks.kick_ack();
		}
		if !failed_wheels.is_empty() {
			self.kicks.kick_cleanup();
		}

		Ok(ForwardOutcome {
			created_wheelstacks,
			failed_wheels,
		})
	}
}
