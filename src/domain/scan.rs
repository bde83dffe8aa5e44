use serde::{Deserialize, Serialize};

/// One physical scan event from the ledger's read table.
///
/// The serialized form is a wire contract twice over: it is embedded as
/// `sqlData` in wheel documents and it is what gets staged in the
/// acknowledgment queue, so the field names (including the `product_ID`
/// casing) must not drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRow {
	pub order_no: i64,
	pub year: i32,
	#[serde(rename = "product_ID")]
	pub product_id: i64,
	pub marked_part_no: i64,
	pub shuttle_number: i32,
	pub stack_number: i32,
	pub number_in_stack: i32,
	/// Stamped by the pipeline at read time; the ledger column carries no
	/// offset and its value is not trusted.
	pub timestamp_submit: String,
	/// 0 while pending, 1 once consumed. Flips exactly once and never back.
	pub mark: i32,
}

impl ScanRow {
	pub fn key(&self) -> ScanKey {
		ScanKey {
			order_no: self.order_no,
			year: self.year,
			product_id: self.product_id,
			marked_part_no: self.marked_part_no,
		}
	}
}

/// Compound natural key of a scan event.
///
/// Neither ledger table enforces uniqueness on it, so every write path must
/// guard with an existence check or a `mark` condition keyed on all four
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanKey {
	pub order_no: i64,
	pub year: i32,
	pub product_id: i64,
	pub marked_part_no: i64,
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use serde_json::json;

	#[test]
	fn wire_names_are_stable() {
		let row = ScanRow {
			order_no: 555,
			year: 2025,
			product_id: 77,
			marked_part_no: 1001,
			shuttle_number: 1,
			stack_number: 0,
			number_in_stack: 2,
			timestamp_submit: "2025-06-01T08:00:00.000000+00:00".into(),
			mark: 0,
		};

		let value = serde_json::to_value(&row).unwrap();
		assert_eq!(
			value,
			json!({
				"order_no": 555,
				"year": 2025,
				"product_ID": 77,
				"marked_part_no": 1001,
				"shuttle_number": 1,
				"stack_number": 0,
				"number_in_stack": 2,
				"timestamp_submit": "2025-06-01T08:00:00.000000+00:00",
				"mark": 0,
			})
		);

		let back: ScanRow = serde_json::from_value(value).unwrap();
		assert_eq!(back, row);
	}
}
