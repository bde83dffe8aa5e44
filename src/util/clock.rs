//! Timestamp formatting for ledger rows.
//!
//! The ledger's timestamp columns are plain text and the scan stations write
//! them without an offset, so the pipeline stamps rows itself at observation
//! time. `use_timezone` selects between UTC with an explicit offset and the
//! naive local wall clock the legacy consumers expect.

use chrono::{Local, SecondsFormat, Utc};

/// Microsecond-precision stamp applied to scan rows when they are read and
/// to wheel documents when they are created.
pub fn observation_stamp(use_timezone: bool) -> String {
	if use_timezone {
		Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
	} else {
		Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
	}
}

/// Second-precision stamp written into audit rows.
pub fn audit_stamp(use_timezone: bool) -> String {
	if use_timezone {
		Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
	} else {
		Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
	}
}
