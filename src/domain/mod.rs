pub mod placement;
pub mod scan;
pub mod status;
pub mod wheel;

pub use placement::{group_by_placement, GroupKey, PlacementGroup};
pub use scan::{ScanKey, ScanRow};
pub use wheel::{StackRef, TransferWheel, WheelPayload, WheelstackPayload};
