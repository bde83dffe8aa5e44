use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// Bounded retry with a fixed pause between attempts.
///
/// Only errors classified retryable by [`SyncError::is_retryable`] are
/// retried; a data violation fails the first time no matter the budget.
///
/// [`SyncError::is_retryable`]: crate::error::SyncError::is_retryable
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	/// Total attempts, the first one included.
	pub max_attempts: u32,
	pub backoff: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			backoff: Duration::from_secs(15),
		}
	}
}

impl RetryPolicy {
	pub fn new(max_attempts: u32, backoff: Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			backoff,
		}
	}

	/// Runs `op` until it succeeds, fails with a non-retryable error or
	/// exhausts the attempt budget. The last error is returned as-is.
	pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempt = 1;
		loop {
			match op().await {
				Ok(value) => return Ok(value),
				Err(e) if e.is_retryable() && attempt < self.max_attempts => {
					warn!(
						error = %e,
						attempt,
						max_attempts = self.max_attempts,
						"{what} failed, backing off",
					);
					tokio::time::sleep(self.backoff).await;
					attempt += 1;
				}
				Err(e) => return Err(e),
			}
		}
	}
}
