//! Deletion of wheel documents orphaned by abandoned wheelstacks.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::error::Result;
use crate::infra::grid_api::GridApi;
use crate::infra::staging::StagingQueue;
use crate::util::retry::RetryPolicy;

/// Wheel documents removed from the grid store by one sweep.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct CleanupOutcome {
	pub cleared: Vec<String>,
}

/// Drains the cleanup queue by deleting orphaned wheel documents.
///
/// Orphans are inert, nothing on the grid side references a wheel outside a
/// wheelstack, so deletion is best-effort per id: an entry whose deletion
/// fails stays queued for the next sweep and never blocks the rest of the
/// batch. An entry leaves the queue only once its wheel is confirmed gone.
pub struct CleanupSweep {
	staging: Arc<dyn StagingQueue>,
	cleanup_queue: String,
	retry: RetryPolicy,
}

impl CleanupSweep {
	pub fn new(config: &Config, staging: Arc<dyn StagingQueue>) -> Self {
		Self {
			staging,
			cleanup_queue: config.staging.cleanup_queue.clone(),
			retry: config.retry,
		}
	}

	pub async fn run(&self, api: &dyn GridApi) -> Result<CleanupOutcome> {
		let wheel_ids = self
			.retry
			.run("cleanup queue snapshot", || {
				self.staging.snapshot(&self.cleanup_queue)
			})
			.await?;

		let mut cleared = Vec::new();
		for wheel_id in wheel_ids {
			match api.delete_wheel(&wheel_id).await {
				Ok(()) => {
					self.staging.remove(&self.cleanup_queue, &wheel_id).await?;
					cleared.push(wheel_id);
				}
				Err(e) => {
					warn!(%wheel_id, error = %e, "wheel deletion failed, entry kept");
				}
			}
		}

		Ok(CleanupOutcome { cleared })
	}
}
