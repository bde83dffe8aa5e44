pub mod grid_api;
pub mod ledger;
pub mod staging;
