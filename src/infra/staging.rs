//! Durable staging queues between pipeline stages.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::Result;

/// Ordered, durable, at-least-once staging store.
///
/// `snapshot` never consumes. An entry leaves a queue only through `remove`,
/// which callers invoke after the downstream effect is durably applied; a
/// crash in between re-delivers the entry on the next sweep.
#[async_trait]
pub trait StagingQueue: Send + Sync {
	/// Appends `value` at the tail of `queue`.
	async fn append(&self, queue: &str, value: &str) -> Result<()>;

	/// The full queue contents, oldest first, left in place.
	async fn snapshot(&self, queue: &str) -> Result<Vec<String>>;

	/// Removes the first occurrence of `value`. Removing an absent value is
	/// a no-op.
	async fn remove(&self, queue: &str, value: &str) -> Result<()>;
}

/// [`StagingQueue`] over Redis lists.
pub struct RedisStaging {
	manager: ConnectionManager,
}

impl RedisStaging {
	/// Connects and verifies the server is reachable; the manager reconnects
	/// on its own afterwards.
	pub async fn connect(url: &str) -> Result<Self> {
		let client = redis::Client::open(url)?;
		let manager = client.get_connection_manager().await?;
		Ok(Self { manager })
	}
}

#[async_trait]
impl StagingQueue for RedisStaging {
	async fn append(&self, queue: &str, value: &str) -> Result<()> {
		let mut conn = self.manager.clone();
		let _: i64 = conn.rpush(queue, value).await?;
		Ok(())
	}

	async fn snapshot(&self, queue: &str) -> Result<Vec<String>> {
		let mut conn = self.manager.clone();
		Ok(conn.lrange(queue, 0, -1).await?)
	}

	async fn remove(&self, queue: &str, value: &str) -> Result<()> {
		let mut conn = self.manager.clone();
		let _: i64 = conn.lrem(queue, 1, value).await?;
		Ok(())
	}
}
