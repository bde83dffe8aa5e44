//! Synchronization pipeline between the plant's relational scan ledger and
//! the grid inventory API.
//!
//! Four periodic tasks move data across the store boundary:
//!
//! - [`service::forward::ForwardSync`] turns pending scan rows into wheel and
//!   wheelstack documents and stages the synchronized rows for
//!   acknowledgment.
//! - [`service::ack::AckSweep`] flips the `mark` flag of staged rows so they
//!   are never picked up again.
//! - [`service::cleanup::CleanupSweep`] deletes wheel documents orphaned by
//!   aborted wheelstacks.
//! - [`service::reverse::ReverseSync`] pulls outbound transfer events back
//!   into the ledger's audit table.
//!
//! Store access goes through the traits in [`infra`]; tasks only ever see
//! those, which is what makes the pipeline testable without live stores.

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod service;
pub mod testing;
pub mod util;

pub use config::Config;
pub use error::{Result, SyncError};
