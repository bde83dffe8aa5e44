//! Typed access to the relational scan ledger.
//!
//! Table names come from configuration, so statements are built as raw SQL
//! with bound values rather than through entities. The tables guarantee no
//! uniqueness on the compound natural key; idempotency is this gateway's
//! problem. `exists` must be consulted before every audit insert, and
//! `mark_consumed` only ever flips rows that are still pending.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
	ConnectionTrait, Database, DatabaseConnection, FromQueryResult, Statement, TransactionTrait,
	Value,
};
use tracing::debug;

use crate::domain::scan::{ScanKey, ScanRow};
use crate::domain::status::{batch_status_code, unit_status_code};
use crate::error::Result;
use crate::util::clock;

/// Part number the scan stations write into placeholder slots that carry no
/// wheel. Such rows are never synchronized.
pub const FILLER_PART_NO: i64 = 0;

/// Everything the pipeline needs from the relational ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
	/// All rows still pending forward sync (`mark = 0`), each stamped with
	/// an observation timestamp.
	async fn fetch_pending(&self, table: &str) -> Result<Vec<ScanRow>>;

	/// Pending rows of one shuttle that belong to the earliest ready batch,
	/// oldest submission first. Placeholder slots are excluded.
	async fn fetch_ready_batch(&self, table: &str, shuttle: i32) -> Result<Vec<ScanRow>>;

	/// Point lookup on the compound natural key.
	async fn exists(&self, table: &str, key: &ScanKey) -> Result<bool>;

	/// Inserts one audit row. `stack_position` of `None` records -1, the
	/// marker for a wheel already removed from physical placement. Returns
	/// the number of rows written.
	async fn insert_audit(
		&self,
		table: &str,
		key: &ScanKey,
		status: &str,
		stack_position: Option<i32>,
		stamp: &str,
	) -> Result<u64>;

	/// Flips `mark` from 0 to 1 for every given key, atomically across the
	/// whole batch. Rows already consumed are left untouched, so reapplying
	/// is a no-op. Returns the number of rows actually updated.
	async fn mark_consumed(&self, table: &str, keys: &[ScanKey]) -> Result<u64>;
}

/// [`LedgerStore`] over a live database connection.
pub struct SqlLedger {
	conn: Arc<DatabaseConnection>,
	use_timezone: bool,
}

const PENDING_COLUMNS: &str = "order_no, year, product_ID AS product_id, marked_part_no, \
	 shuttle_number, stack_number, number_in_stack, mark";

#[derive(FromQueryResult)]
struct PendingRecord {
	order_no: i64,
	year: i32,
	product_id: i64,
	marked_part_no: i64,
	shuttle_number: i32,
	stack_number: i32,
	number_in_stack: i32,
	mark: i32,
}

impl PendingRecord {
	fn into_row(self, stamp: &str) -> ScanRow {
		ScanRow {
			order_no: self.order_no,
			year: self.year,
			product_id: self.product_id,
			marked_part_no: self.marked_part_no,
			shuttle_number: self.shuttle_number,
			stack_number: self.stack_number,
			number_in_stack: self.number_in_stack,
			timestamp_submit: stamp.to_string(),
			mark: self.mark,
		}
	}
}

impl SqlLedger {
	pub async fn connect(url: &str, use_timezone: bool) -> Result<Self> {
		let conn = Database::connect(url).await?;
		Ok(Self::new(Arc::new(conn), use_timezone))
	}

	pub fn new(conn: Arc<DatabaseConnection>, use_timezone: bool) -> Self {
		Self { conn, use_timezone }
	}

	fn stmt(&self, sql: String, values: Vec<Value>) -> Statement {
		Statement::from_sql_and_values(self.conn.get_database_backend(), sql, values)
	}
}

#[async_trait]
impl LedgerStore for SqlLedger {
	async fn fetch_pending(&self, table: &str) -> Result<Vec<ScanRow>> {
		let sql = format!("SELECT {PENDING_COLUMNS} FROM {table} WHERE mark = 0");
		let records = PendingRecord::find_by_statement(self.stmt(sql, Vec::new()))
			.all(self.conn.as_ref())
			.await?;

		let stamp = clock::observation_stamp(self.use_timezone);
		Ok(records
			.into_iter()
			.map(|record| record.into_row(&stamp))
			.collect())
	}

	async fn fetch_ready_batch(&self, table: &str, shuttle: i32) -> Result<Vec<ScanRow>> {
		let sql = format!(
			"SELECT {PENDING_COLUMNS} FROM {table} \
			 WHERE mark = 0 AND shuttle_number = ? AND marked_part_no <> ? \
			 AND ready_seq = ( \
				SELECT MIN(ready_seq) FROM {table} \
				WHERE mark = 0 AND shuttle_number = ? AND marked_part_no <> ? \
			 ) \
			 ORDER BY timestamp_submit ASC"
		);
		let records = PendingRecord::find_by_statement(self.stmt(
			sql,
			vec![
				shuttle.into(),
				FILLER_PART_NO.into(),
				shuttle.into(),
				FILLER_PART_NO.into(),
			],
		))
		.all(self.conn.as_ref())
		.await?;

		let stamp = clock::observation_stamp(self.use_timezone);
		Ok(records
			.into_iter()
			.map(|record| record.into_row(&stamp))
			.collect())
	}

	async fn exists(&self, table: &str, key: &ScanKey) -> Result<bool> {
		let sql = format!(
			"SELECT order_no FROM {table} \
			 WHERE order_no = ? AND year = ? AND product_ID = ? AND marked_part_no = ?"
		);
		let found = self
			.conn
			.query_one(self.stmt(
				sql,
				vec![
					key.order_no.into(),
					key.year.into(),
					key.product_id.into(),
					key.marked_part_no.into(),
				],
			))
			.await?;

		Ok(found.is_some())
	}

	async fn insert_audit(
		&self,
		table: &str,
		key: &ScanKey,
		status: &str,
		stack_position: Option<i32>,
		stamp: &str,
	) -> Result<u64> {
		// Both translations must succeed before anything is written.
		let order_status = batch_status_code(status)?;
		let product_state = unit_status_code(status)?;

		let sql = format!(
			"INSERT INTO {table} (order_no, year, product_ID, marked_part_no, \
			 number_virtual_position, number_in_stack, timestamp_submit, order_status, \
			 product_state, RW_Recipe_ID, mark) \
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
		);
		let result = self
			.conn
			.execute(self.stmt(
				sql,
				vec![
					key.order_no.into(),
					key.year.into(),
					key.product_id.into(),
					key.marked_part_no.into(),
					0i32.into(),
					stack_position.unwrap_or(-1).into(),
					stamp.into(),
					order_status.into(),
					product_state.into(),
					0i32.into(),
					0i32.into(),
				],
			))
			.await?;

		Ok(result.rows_affected())
	}

	async fn mark_consumed(&self, table: &str, keys: &[ScanKey]) -> Result<u64> {
		if keys.is_empty() {
			return Ok(0);
		}

		let sql = format!(
			"UPDATE {table} SET mark = 1 \
			 WHERE order_no = ? AND year = ? AND product_ID = ? AND marked_part_no = ? \
			 AND mark = 0"
		);

		// One transaction for the whole batch: the queue entries behind these
		// keys are only removed after every flip is durable.
		let txn = self.conn.begin().await?;
		let mut updated = 0;
		for key in keys {
			let stmt = Statement::from_sql_and_values(
				self.conn.get_database_backend(),
				sql.clone(),
				vec![
					key.order_no.into(),
					key.year.into(),
					key.product_id.into(),
					key.marked_part_no.into(),
				],
			);
			updated += txn.execute(stmt).await?.rows_affected();
		}
		txn.commit().await?;

		debug!(requested = keys.len(), updated, "marked scan rows consumed");
		Ok(updated)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::SyncError;
	use pretty_assertions::assert_eq;
	use tempfile::TempDir;

	const READ_TABLE: &str = "wheel_scans";
	const WRITE_TABLE: &str = "wheel_transfers";

	async fn ledger() -> (TempDir, Arc<DatabaseConnection>, SqlLedger) {
		let dir = tempfile::tempdir().unwrap();
		let url = format!(
			"sqlite://{}?mode=rwc",
			dir.path().join("ledger.db").display()
		);
		let conn = Arc::new(Database::connect(&url).await.unwrap());

		conn.execute_unprepared(
			"CREATE TABLE wheel_scans (
				order_no INTEGER NOT NULL,
				year INTEGER NOT NULL,
				product_ID INTEGER NOT NULL,
				marked_part_no INTEGER NOT NULL,
				shuttle_number INTEGER NOT NULL,
				stack_number INTEGER NOT NULL,
				number_in_stack INTEGER NOT NULL,
				timestamp_submit TEXT NOT NULL,
				ready_seq INTEGER NOT NULL DEFAULT 0,
				mark INTEGER NOT NULL DEFAULT 0
			)",
		)
		.await
		.unwrap();

		conn.execute_unprepared(
			"CREATE TABLE wheel_transfers (
				order_no INTEGER NOT NULL,
				year INTEGER NOT NULL,
				product_ID INTEGER NOT NULL,
				marked_part_no INTEGER NOT NULL,
				number_virtual_position INTEGER NOT NULL,
				number_in_stack INTEGER NOT NULL,
				timestamp_submit TEXT NOT NULL,
				order_status INTEGER NOT NULL,
				product_state INTEGER NOT NULL,
				RW_Recipe_ID INTEGER NOT NULL,
				mark INTEGER NOT NULL
			)",
		)
		.await
		.unwrap();

		let ledger = SqlLedger::new(conn.clone(), true);
		(dir, conn, ledger)
	}

	#[allow(clippy::too_many_arguments)]
	async fn seed_scan(
		conn: &DatabaseConnection,
		order_no: i64,
		part: i64,
		shuttle: i32,
		stack: i32,
		slot: i32,
		ready_seq: i64,
		submitted: &str,
		mark: i32,
	) {
		let stmt = Statement::from_sql_and_values(
			conn.get_database_backend(),
			format!(
				"INSERT INTO {READ_TABLE} (order_no, year, product_ID, marked_part_no, \
				 shuttle_number, stack_number, number_in_stack, timestamp_submit, ready_seq, \
				 mark) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
			),
			vec![
				order_no.into(),
				2025i32.into(),
				77i64.into(),
				part.into(),
				shuttle.into(),
				stack.into(),
				slot.into(),
				submitted.into(),
				ready_seq.into(),
				mark.into(),
			],
		);
		conn.execute(stmt).await.unwrap();
	}

	fn key(order_no: i64, part: i64) -> ScanKey {
		ScanKey {
			order_no,
			year: 2025,
			product_id: 77,
			marked_part_no: part,
		}
	}

	#[tokio::test]
	async fn fetch_pending_skips_consumed_rows_and_restamps() {
		let (_dir, conn, ledger) = ledger().await;
		seed_scan(&conn, 555, 1001, 1, 0, 0, 1, "2025-06-01T08:00:00", 0).await;
		seed_scan(&conn, 555, 1002, 1, 0, 1, 1, "2025-06-01T08:00:01", 0).await;
		seed_scan(&conn, 554, 1000, 1, 0, 0, 1, "2025-05-31T07:00:00", 1).await;

		let rows = ledger.fetch_pending(READ_TABLE).await.unwrap();

		assert_eq!(rows.len(), 2);
		for row in &rows {
			assert_eq!(row.mark, 0);
			// The stored stamp is replaced with the observation time.
			assert_ne!(row.timestamp_submit, "2025-06-01T08:00:00");
			chrono::DateTime::parse_from_rfc3339(&row.timestamp_submit).unwrap();
		}
	}

	#[tokio::test]
	async fn ready_batch_is_earliest_sequence_of_one_shuttle() {
		let (_dir, conn, ledger) = ledger().await;
		// Earliest ready batch on shuttle 1, submitted out of order.
		seed_scan(&conn, 555, 1002, 1, 0, 1, 3, "2025-06-01T08:00:05", 0).await;
		seed_scan(&conn, 555, 1001, 1, 0, 0, 3, "2025-06-01T08:00:01", 0).await;
		// Later batch on the same shuttle.
		seed_scan(&conn, 556, 1003, 1, 1, 0, 7, "2025-06-01T09:00:00", 0).await;
		// Placeholder slot with an even earlier sequence; must not win.
		seed_scan(&conn, 555, FILLER_PART_NO, 1, 0, 2, 1, "2025-06-01T08:00:00", 0).await;
		// Other shuttle entirely.
		seed_scan(&conn, 900, 2001, 2, 0, 0, 1, "2025-06-01T07:00:00", 0).await;
		// Consumed row from an older sequence.
		seed_scan(&conn, 500, 1999, 1, 0, 0, 2, "2025-05-01T08:00:00", 1).await;

		let rows = ledger.fetch_ready_batch(READ_TABLE, 1).await.unwrap();

		assert_eq!(
			rows.iter()
				.map(|row| row.marked_part_no)
				.collect::<Vec<_>>(),
			vec![1001, 1002],
		);
	}

	#[tokio::test]
	async fn audit_inserts_are_guarded_by_existence() {
		let (_dir, conn, ledger) = ledger().await;
		let key = key(555, 1001);

		assert!(!ledger.exists(WRITE_TABLE, &key).await.unwrap());

		let written = ledger
			.insert_audit(WRITE_TABLE, &key, "laboratory", Some(2), "2025-06-01T08:00:00")
			.await
			.unwrap();
		assert_eq!(written, 1);
		assert!(ledger.exists(WRITE_TABLE, &key).await.unwrap());

		let stored = conn
			.query_one(Statement::from_string(
				conn.get_database_backend(),
				format!(
					"SELECT order_status, product_state, number_in_stack, \
					 number_virtual_position, RW_Recipe_ID, mark FROM {WRITE_TABLE}"
				),
			))
			.await
			.unwrap()
			.unwrap();

		assert_eq!(stored.try_get::<i32>("", "order_status").unwrap(), 0);
		assert_eq!(stored.try_get::<i32>("", "product_state").unwrap(), 1);
		assert_eq!(stored.try_get::<i32>("", "number_in_stack").unwrap(), 2);
		assert_eq!(
			stored.try_get::<i32>("", "number_virtual_position").unwrap(),
			0
		);
		assert_eq!(stored.try_get::<i32>("", "RW_Recipe_ID").unwrap(), 0);
		assert_eq!(stored.try_get::<i32>("", "mark").unwrap(), 0);
	}

	#[tokio::test]
	async fn missing_stack_membership_is_recorded_as_minus_one() {
		let (_dir, conn, ledger) = ledger().await;
		ledger
			.insert_audit(
				WRITE_TABLE,
				&key(555, 1001),
				"shipped",
				None,
				"2025-06-01T08:00:00",
			)
			.await
			.unwrap();

		let stored = conn
			.query_one(Statement::from_string(
				conn.get_database_backend(),
				format!("SELECT number_in_stack FROM {WRITE_TABLE}"),
			))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(stored.try_get::<i32>("", "number_in_stack").unwrap(), -1);
	}

	#[tokio::test]
	async fn unknown_status_writes_nothing() {
		let (_dir, _conn, ledger) = ledger().await;
		let key = key(555, 1001);

		let result = ledger
			.insert_audit(WRITE_TABLE, &key, "melted", Some(0), "2025-06-01T08:00:00")
			.await;

		assert!(matches!(result, Err(SyncError::UnknownStatus(_))));
		assert!(!ledger.exists(WRITE_TABLE, &key).await.unwrap());
	}

	#[tokio::test]
	async fn mark_consumed_flips_each_row_at_most_once() {
		let (_dir, conn, ledger) = ledger().await;
		seed_scan(&conn, 555, 1001, 1, 0, 0, 1, "2025-06-01T08:00:00", 0).await;
		seed_scan(&conn, 555, 1002, 1, 0, 1, 1, "2025-06-01T08:00:01", 0).await;
		let keys = vec![key(555, 1001), key(555, 1002)];

		assert_eq!(ledger.mark_consumed(READ_TABLE, &keys).await.unwrap(), 2);
		// Reapplying the same acknowledgment touches nothing.
		assert_eq!(ledger.mark_consumed(READ_TABLE, &keys).await.unwrap(), 0);
		assert!(ledger.fetch_pending(READ_TABLE).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn mark_consumed_ignores_unknown_keys() {
		let (_dir, conn, ledger) = ledger().await;
		seed_scan(&conn, 555, 1001, 1, 0, 0, 1, "2025-06-01T08:00:00", 0).await;

		let keys = vec![key(555, 1001), key(999, 9999)];
		assert_eq!(ledger.mark_consumed(READ_TABLE, &keys).await.unwrap(), 1);
		assert_eq!(ledger.mark_consumed(READ_TABLE, &[]).await.unwrap(), 0);
	}
}
