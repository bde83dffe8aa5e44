//! Translation of grid-side status strings into ledger status codes.
//!
//! The two code spaces are independent: the same string maps to different
//! numbers depending on the target column, and not every batch status has a
//! unit counterpart. An unmapped status is a data violation and must abort
//! the write, never default.

use crate::error::{Result, SyncError};

/// Code written to the audit table's `order_status` column.
pub fn batch_status_code(status: &str) -> Result<i32> {
	Ok(match status {
		"laboratory" => 0,
		"shipped" => 1,
		"pto" => 2,
		"rejected" => 3,
		other => return Err(SyncError::UnknownStatus(other.to_string())),
	})
}

/// Code written to the audit table's `product_state` column.
pub fn unit_status_code(status: &str) -> Result<i32> {
	Ok(match status {
		"shipped" => 0,
		"laboratory" => 1,
		"rejected" => 2,
		other => return Err(SyncError::UnknownStatus(other.to_string())),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn code_spaces_differ_for_the_same_status() {
		assert_eq!(batch_status_code("shipped").unwrap(), 1);
		assert_eq!(unit_status_code("shipped").unwrap(), 0);
		assert_eq!(batch_status_code("laboratory").unwrap(), 0);
		assert_eq!(unit_status_code("laboratory").unwrap(), 1);
		assert_eq!(batch_status_code("rejected").unwrap(), 3);
		assert_eq!(unit_status_code("rejected").unwrap(), 2);
	}

	#[test]
	fn pto_exists_only_at_batch_level() {
		assert_eq!(batch_status_code("pto").unwrap(), 2);
		assert!(matches!(
			unit_status_code("pto"),
			Err(SyncError::UnknownStatus(s)) if s == "pto"
		));
	}

	#[test]
	fn unmapped_status_is_rejected() {
		assert!(matches!(
			batch_status_code("melted"),
			Err(SyncError::UnknownStatus(_))
		));
		assert!(matches!(
			unit_status_code(""),
			Err(SyncError::UnknownStatus(_))
		));
	}
}
