//! Grouping of scan rows into physical wheelstack placements.

use std::collections::BTreeMap;

use tracing::warn;

use super::scan::ScanRow;

/// Placement coordinates of a wheelstack: (shuttle row, stack column).
pub type GroupKey = (i32, i32);

/// The rows of one wheelstack, slotted by `number_in_stack`, together with
/// the wheel document ids created for them so far.
#[derive(Debug, Clone)]
pub struct PlacementGroup {
	/// Fixed capacity, sparse. A `None` slot simply was not scanned yet.
	pub slots: Vec<Option<ScanRow>>,
	/// Document ids in slot order, filled in as wheels are created.
	pub wheels: Vec<String>,
}

impl PlacementGroup {
	fn with_capacity(capacity: usize) -> Self {
		Self {
			slots: vec![None; capacity],
			wheels: Vec::new(),
		}
	}

	/// Batch identifier of the stack, taken from the first occupied slot.
	pub fn batch_number(&self) -> String {
		self.occupied()
			.next()
			.map(|row| row.order_no.to_string())
			.unwrap_or_default()
	}

	/// Occupied slots in ascending slot order.
	pub fn occupied(&self) -> impl Iterator<Item = &ScanRow> {
		self.slots.iter().flatten()
	}
}

/// Partitions pending rows into placement groups keyed by (shuttle, stack).
///
/// A row whose slot index falls outside `0..capacity` cannot be placed; it
/// is skipped with a warning and stays pending in the ledger for a later run
/// (typically after the capacity misconfiguration is fixed).
pub fn group_by_placement(
	rows: Vec<ScanRow>,
	capacity: usize,
) -> BTreeMap<GroupKey, PlacementGroup> {
	let mut groups: BTreeMap<GroupKey, PlacementGroup> = BTreeMap::new();

	for row in rows {
		let slot = row.number_in_stack;
		if slot < 0 || slot as usize >= capacity {
			warn!(
				order_no = row.order_no,
				marked_part_no = row.marked_part_no,
				slot,
				capacity,
				"slot index out of range, row left pending",
			);
			continue;
		}

		let key = (row.shuttle_number, row.stack_number);
		groups
			.entry(key)
			.or_insert_with(|| PlacementGroup::with_capacity(capacity))
			.slots[slot as usize] = Some(row);
	}

	groups
}
