//! Request and response bodies exchanged with the grid API.

use serde::{Deserialize, Serialize};

use super::scan::ScanRow;

/// The scan feed carries no diameter, but the wheel document requires one.
/// The grid side replaces this placeholder once the wheel gets measured.
pub const DEFAULT_WHEEL_DIAMETER: i64 = 10_000;

/// Body of `POST /wheels`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelPayload<'a> {
	pub wheel_id: String,
	pub batch_number: String,
	pub wheel_diameter: i64,
	pub receipt_date: &'a str,
	pub status: &'a str,
	pub sql_data: &'a ScanRow,
}

impl<'a> WheelPayload<'a> {
	pub fn from_row(row: &'a ScanRow, status: &'a str, receipt_date: &'a str) -> Self {
		Self {
			wheel_id: row.marked_part_no.to_string(),
			batch_number: row.order_no.to_string(),
			wheel_diameter: DEFAULT_WHEEL_DIAMETER,
			receipt_date,
			status,
			sql_data: row,
		}
	}
}

/// Body of `POST /wheelstacks`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelstackPayload<'a> {
	pub placement_id: &'a str,
	pub placement_type: &'a str,
	pub row_placement: String,
	pub col_placement: String,
	pub max_size: usize,
	pub batch_number: String,
	pub blocked: bool,
	pub status: &'a str,
	pub wheels: &'a [String],
}

/// Wheel returned by `GET /wheels/transfer/all` with `include_data=true`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferWheel {
	#[serde(rename = "_id")]
	pub id: String,
	pub status: String,
	#[serde(rename = "sqlData")]
	pub sql_data: ScanRow,
	#[serde(rename = "wheelStack", default)]
	pub wheel_stack: Option<StackRef>,
}

/// Wheelstack membership of a transfer wheel. Absent once the wheel left
/// physical placement.
#[derive(Debug, Clone, Deserialize)]
pub struct StackRef {
	#[serde(rename = "wheelStackPosition")]
	pub position: i32,
}

impl TransferWheel {
	pub fn stack_position(&self) -> Option<i32> {
		self.wheel_stack.as_ref().map(|stack| stack.position)
	}
}
