//! Deterministic in-memory doubles of the pipeline's three stores.
//!
//! The tasks only ever talk to [`LedgerStore`], [`GridApi`] and
//! [`StagingQueue`], so these fakes are enough to drive whole runs without a
//! database, a Redis server or a grid deployment. Each fake records what was
//! asked of it and can script failures: content-based for the grid API
//! (reject this part, fail that deletion) and call-counted outages for the
//! two stores.
//!
//! [`LedgerStore`]: crate::infra::ledger::LedgerStore
//! [`GridApi`]: crate::infra::grid_api::GridApi
//! [`StagingQueue`]: crate::infra::staging::StagingQueue

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::{ApiConfig, Cadence, Config, LedgerConfig, StagingConfig, SyncOptions};
use crate::domain::scan::{ScanKey, ScanRow};
use crate::domain::status::{batch_status_code, unit_status_code};
use crate::domain::wheel::{StackRef, TransferWheel, WheelPayload, WheelstackPayload};
use crate::error::{Result, SyncError};
use crate::infra::grid_api::GridApi;
use crate::infra::ledger::{LedgerStore, FILLER_PART_NO};
use crate::infra::staging::StagingQueue;
use crate::util::retry::RetryPolicy;

/// Configuration used by the task tests: canonical table and queue names,
/// six-wheel stacks, offset-aware stamps and the default retry budget.
pub fn config() -> Config {
	Config {
		ledger: LedgerConfig {
			url: "sqlite::memory:".into(),
			read_table: "wheel_scans".into(),
			write_table: "wheel_transfers".into(),
		},
		staging: StagingConfig {
			url: "redis://127.0.0.1:6379".into(),
			ack_queue: "correct_wheels_list".into(),
			cleanup_queue: "failed_wheels_list".into(),
		},
		api: ApiConfig {
			base_url: "http://grid.local/api".into(),
			auth_address: "http://grid.local/auth".into(),
			auth_login: "sync".into(),
			auth_password: "secret".into(),
			timeout: Duration::from_secs(15),
		},
		sync: SyncOptions {
			platform_name: "pmkBase1".into(),
			placement_status: "basePlatform".into(),
			max_stack_size: 6,
			use_timezone: true,
		},
		cadence: Cadence {
			forward: Duration::from_secs(10),
			ack: Duration::from_secs(30),
			cleanup: Duration::from_secs(30),
			reverse: Duration::from_secs(30),
		},
		retry: RetryPolicy::default(),
	}
}

/// A pending scan row with the test suite's standard batch fields.
pub fn scan_row(order_no: i64, part: i64, shuttle: i32, stack: i32, slot: i32) -> ScanRow {
	ScanRow {
		order_no,
		year: 2025,
		product_id: 77,
		marked_part_no: part,
		shuttle_number: shuttle,
		stack_number: stack,
		number_in_stack: slot,
		timestamp_submit: "2025-06-01T08:00:00.000000+00:00".into(),
		mark: 0,
	}
}

/// A transfer event as the grid API would report it.
pub fn transfer_wheel(
	id: &str,
	status: &str,
	sql_data: ScanRow,
	stack_position: Option<i32>,
) -> TransferWheel {
	TransferWheel {
		id: id.to_string(),
		status: status.to_string(),
		sql_data,
		wheel_stack: stack_position.map(|position| StackRef { position }),
	}
}

fn staging_offline() -> SyncError {
	SyncError::Staging(redis::RedisError::from((
		redis::ErrorKind::IoError,
		"staging store offline",
	)))
}

fn ledger_offline() -> SyncError {
	SyncError::Ledger(sea_orm::DbErr::Custom("ledger offline".into()))
}

fn rejected(body: &str) -> SyncError {
	SyncError::RemoteRejected {
		status: StatusCode::UNPROCESSABLE_ENTITY,
		body: body.to_string(),
	}
}

/// [`StagingQueue`] over in-memory lists.
#[derive(Default)]
pub struct MemoryStaging {
	queues: Mutex<HashMap<String, Vec<String>>>,
	outage: Mutex<u32>,
}

impl MemoryStaging {
	pub fn new() -> Self {
		Self::default()
	}

	/// The next `calls` staging operations fail as if the store were down.
	pub fn fail_next(&self, calls: u32) {
		*self.outage.lock().unwrap() = calls;
	}

	/// Current contents of `queue`, oldest first.
	pub fn contents(&self, queue: &str) -> Vec<String> {
		self.queues
			.lock()
			.unwrap()
			.get(queue)
			.cloned()
			.unwrap_or_default()
	}

	fn check_outage(&self) -> Result<()> {
		let mut outage = self.outage.lock().unwrap();
		if *outage > 0 {
			*outage -= 1;
			return Err(staging_offline());
		}
		Ok(())
	}
}

#[async_trait]
impl StagingQueue for MemoryStaging {
	async fn append(&self, queue: &str, value: &str) -> Result<()> {
		self.check_outage()?;
		self.queues
			.lock()
			.unwrap()
			.entry(queue.to_string())
			.or_default()
			.push(value.to_string());
		Ok(())
	}

	async fn snapshot(&self, queue: &str) -> Result<Vec<String>> {
		self.check_outage()?;
		Ok(self.contents(queue))
	}

	async fn remove(&self, queue: &str, value: &str) -> Result<()> {
		self.check_outage()?;
		let mut queues = self.queues.lock().unwrap();
		if let Some(values) = queues.get_mut(queue) {
			// First occurrence only, like LREM with count 1.
			if let Some(index) = values.iter().position(|v| v == value) {
				values.remove(index);
			}
		}
		Ok(())
	}
}

/// Audit row as recorded by [`FakeLedger`], status strings already
/// translated to their numeric codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
	pub key: ScanKey,
	pub number_in_stack: i32,
	pub order_status: i32,
	pub product_state: i32,
	pub timestamp_submit: String,
}

/// [`LedgerStore`] over in-memory rows.
///
/// Holds one read table and one write table and ignores the table names
/// passed in. `fetch_ready_batch` filters and orders but knows nothing about
/// readiness sequences; that policy is covered by the live gateway's tests.
#[derive(Default)]
pub struct FakeLedger {
	scans: Mutex<Vec<ScanRow>>,
	audits: Mutex<Vec<AuditRecord>>,
	outage: Mutex<u32>,
}

impl FakeLedger {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn seed(&self, rows: Vec<ScanRow>) {
		self.scans.lock().unwrap().extend(rows);
	}

	/// The next `calls` ledger operations fail as if the store were down.
	pub fn fail_next(&self, calls: u32) {
		*self.outage.lock().unwrap() = calls;
	}

	pub fn scan_rows(&self) -> Vec<ScanRow> {
		self.scans.lock().unwrap().clone()
	}

	pub fn audit_rows(&self) -> Vec<AuditRecord> {
		self.audits.lock().unwrap().clone()
	}

	fn check_outage(&self) -> Result<()> {
		let mut outage = self.outage.lock().unwrap();
		if *outage > 0 {
			*outage -= 1;
			return Err(ledger_offline());
		}
		Ok(())
	}
}

#[async_trait]
impl LedgerStore for FakeLedger {
	async fn fetch_pending(&self, _table: &str) -> Result<Vec<ScanRow>> {
		self.check_outage()?;
		Ok(self
			.scans
			.lock()
			.unwrap()
			.iter()
			.filter(|row| row.mark == 0)
			.cloned()
			.collect())
	}

	async fn fetch_ready_batch(&self, _table: &str, shuttle: i32) -> Result<Vec<ScanRow>> {
		self.check_outage()?;
		let mut rows: Vec<ScanRow> = self
			.scans
			.lock()
			.unwrap()
			.iter()
			.filter(|row| {
				row.mark == 0
					&& row.shuttle_number == shuttle
					&& row.marked_part_no != FILLER_PART_NO
			})
			.cloned()
			.collect();
		rows.sort_by(|a, b| a.timestamp_submit.cmp(&b.timestamp_submit));
		Ok(rows)
	}

	async fn exists(&self, _table: &str, key: &ScanKey) -> Result<bool> {
		self.check_outage()?;
		Ok(self
			.audits
			.lock()
			.unwrap()
			.iter()
			.any(|record| record.key == *key))
	}

	async fn insert_audit(
		&self,
		_table: &str,
		key: &ScanKey,
		status: &str,
		stack_position: Option<i32>,
		stamp: &str,
	) -> Result<u64> {
		self.check_outage()?;
		let order_status = batch_status_code(status)?;
		let product_state = unit_status_code(status)?;
		self.audits.lock().unwrap().push(AuditRecord {
			key: *key,
			number_in_stack: stack_position.unwrap_or(-1),
			order_status,
			product_state,
			timestamp_submit: stamp.to_string(),
		});
		Ok(1)
	}

	async fn mark_consumed(&self, _table: &str, keys: &[ScanKey]) -> Result<u64> {
		self.check_outage()?;
		let mut scans = self.scans.lock().unwrap();
		let mut updated = 0;
		for key in keys {
			for row in scans.iter_mut() {
				if row.key() == *key && row.mark == 0 {
					row.mark = 1;
					updated += 1;
				}
			}
		}
		Ok(updated)
	}
}

/// Wheel document created through [`FakeGridApi`], payload captured owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWheel {
	pub id: String,
	pub wheel_id: String,
	pub batch_number: String,
	pub receipt_date: String,
	pub status: String,
	pub sql_data: ScanRow,
}

/// Wheelstack document created through [`FakeGridApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedStack {
	pub id: String,
	pub placement_id: String,
	pub row_placement: String,
	pub col_placement: String,
	pub max_size: usize,
	pub batch_number: String,
	pub status: String,
	pub wheels: Vec<String>,
}

#[derive(Default)]
struct GridState {
	platforms: HashMap<String, String>,
	wheels: Vec<CreatedWheel>,
	stacks: Vec<CreatedStack>,
	deleted: Vec<String>,
	patched: Vec<String>,
	transfers: Vec<TransferWheel>,
	rejected_parts: HashSet<i64>,
	rejected_stacks: HashSet<(String, String)>,
	failing_deletes: HashSet<String>,
	failing_patches: HashSet<String>,
	wheels_minted: u32,
	stacks_minted: u32,
}

/// [`GridApi`] over in-memory documents, with content-scripted failures.
///
/// Created documents get sequential ids (`wheel-1`, `stack-1`, ...) in
/// creation order, which the tests rely on.
#[derive(Default)]
pub struct FakeGridApi {
	state: Mutex<GridState>,
}

impl FakeGridApi {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a resolvable platform.
	pub fn add_platform(&self, name: &str, id: &str) {
		self.state
			.lock()
			.unwrap()
			.platforms
			.insert(name.to_string(), id.to_string());
	}

	/// Wheel creation for this part number will be rejected.
	pub fn reject_part(&self, marked_part_no: i64) {
		self.state
			.lock()
			.unwrap()
			.rejected_parts
			.insert(marked_part_no);
	}

	/// Wheelstack creation at these placement coordinates will be rejected.
	pub fn reject_stack(&self, row: i32, col: i32) {
		self.state
			.lock()
			.unwrap()
			.rejected_stacks
			.insert((row.to_string(), col.to_string()));
	}

	/// Deleting this wheel document will fail.
	pub fn fail_delete(&self, wheel_id: &str) {
		self.state
			.lock()
			.unwrap()
			.failing_deletes
			.insert(wheel_id.to_string());
	}

	/// Patching this wheel's transfer flag will fail.
	pub fn fail_patch(&self, wheel_id: &str) {
		self.state
			.lock()
			.unwrap()
			.failing_patches
			.insert(wheel_id.to_string());
	}

	/// Queues a transfer event for `fetch_pending_transfers`.
	pub fn push_transfer(&self, wheel: TransferWheel) {
		self.state.lock().unwrap().transfers.push(wheel);
	}

	pub fn created_wheels(&self) -> Vec<CreatedWheel> {
		self.state.lock().unwrap().wheels.clone()
	}

	pub fn created_stacks(&self) -> Vec<CreatedStack> {
		self.state.lock().unwrap().stacks.clone()
	}

	pub fn deleted_wheels(&self) -> Vec<String> {
		self.state.lock().unwrap().deleted.clone()
	}

	pub fn patched_wheels(&self) -> Vec<String> {
		self.state.lock().unwrap().patched.clone()
	}
}

#[async_trait]
impl GridApi for FakeGridApi {
	async fn resolve_platform(&self, name: &str) -> Result<String> {
		self.state
			.lock()
			.unwrap()
			.platforms
			.get(name)
			.cloned()
			.ok_or_else(|| SyncError::PlatformNotFound(name.to_string()))
	}

	async fn create_wheel(&self, payload: &WheelPayload<'_>) -> Result<String> {
		let mut state = self.state.lock().unwrap();
		if state
			.rejected_parts
			.contains(&payload.sql_data.marked_part_no)
		{
			return Err(rejected("wheel document rejected"));
		}
		state.wheels_minted += 1;
		let id = format!("wheel-{}", state.wheels_minted);
		state.wheels.push(CreatedWheel {
			id: id.clone(),
			wheel_id: payload.wheel_id.clone(),
			batch_number: payload.batch_number.clone(),
			receipt_date: payload.receipt_date.to_string(),
			status: payload.status.to_string(),
			sql_data: payload.sql_data.clone(),
		});
		Ok(id)
	}

	async fn create_wheelstack(&self, payload: &WheelstackPayload<'_>) -> Result<String> {
		let mut state = self.state.lock().unwrap();
		let coords = (payload.row_placement.clone(), payload.col_placement.clone());
		if state.rejected_stacks.contains(&coords) {
			return Err(rejected("wheelstack document rejected"));
		}
		state.stacks_minted += 1;
		let id = format!("stack-{}", state.stacks_minted);
		state.stacks.push(CreatedStack {
			id: id.clone(),
			placement_id: payload.placement_id.to_string(),
			row_placement: payload.row_placement.clone(),
			col_placement: payload.col_placement.clone(),
			max_size: payload.max_size,
			batch_number: payload.batch_number.clone(),
			status: payload.status.to_string(),
			wheels: payload.wheels.to_vec(),
		});
		Ok(id)
	}

	async fn mark_transferred(&self, wheel_id: &str) -> Result<()> {
		let mut state = self.state.lock().unwrap();
		if state.failing_patches.contains(wheel_id) {
			return Err(rejected("transfer flag patch rejected"));
		}
		state.patched.push(wheel_id.to_string());
		// A flagged wheel no longer matches the pending-transfer filter.
		state.transfers.retain(|wheel| wheel.id != wheel_id);
		Ok(())
	}

	async fn delete_wheel(&self, wheel_id: &str) -> Result<()> {
		let mut state = self.state.lock().unwrap();
		if state.failing_deletes.contains(wheel_id) {
			return Err(rejected("wheel deletion rejected"));
		}
		state.deleted.push(wheel_id.to_string());
		Ok(())
	}

	async fn fetch_pending_transfers(&self) -> Result<Vec<TransferWheel>> {
		Ok(self.state.lock().unwrap().transfers.clone())
	}
}
