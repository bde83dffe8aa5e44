//! Process configuration.
//!
//! Everything the pipeline needs is read from the environment once at
//! startup (the binaries load a `.env` file first) and handed to gateways
//! and tasks as an immutable [`Config`]. Missing required values abort the
//! process before any store is touched.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::util::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
	pub ledger: LedgerConfig,
	pub staging: StagingConfig,
	pub api: ApiConfig,
	pub sync: SyncOptions,
	pub cadence: Cadence,
	pub retry: RetryPolicy,
}

/// Relational scan ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
	/// Connection URL, e.g. `sqlite:///var/lib/gridsync/ledger.db`.
	pub url: String,
	/// Table the forward path reads scan rows from.
	pub read_table: String,
	/// Table the reverse path writes audit rows to.
	pub write_table: String,
}

/// Redis staging store between pipeline stages.
#[derive(Debug, Clone)]
pub struct StagingConfig {
	pub url: String,
	/// Rows synchronized forward, awaiting ledger acknowledgment.
	pub ack_queue: String,
	/// Wheel document ids orphaned by an aborted wheelstack.
	pub cleanup_queue: String,
}

/// Grid API and its identity endpoint.
#[derive(Debug, Clone)]
pub struct ApiConfig {
	pub base_url: String,
	pub auth_address: String,
	pub auth_login: String,
	pub auth_password: String,
	pub timeout: Duration,
}

/// Knobs of the synchronization itself.
#[derive(Debug, Clone)]
pub struct SyncOptions {
	/// Name of the base platform new wheelstacks are placed on.
	pub platform_name: String,
	/// Status assigned to freshly placed wheels and wheelstacks.
	pub placement_status: String,
	/// Wheels per wheelstack; also the valid slot index range.
	pub max_stack_size: usize,
	/// Stamp timestamps in UTC with an offset instead of naive local time.
	pub use_timezone: bool,
}

/// How often each task runs when the daemon drives the pipeline.
#[derive(Debug, Clone)]
pub struct Cadence {
	pub forward: Duration,
	pub ack: Duration,
	pub cleanup: Duration,
	pub reverse: Duration,
}

impl Config {
	pub fn from_env() -> Result<Self> {
		Ok(Self {
			ledger: LedgerConfig {
				url: require("LEDGER_URL")?,
				read_table: identifier("LEDGER_READ_TABLE")?,
				write_table: identifier("LEDGER_WRITE_TABLE")?,
			},
			staging: StagingConfig {
				url: require("STAGING_URL")?,
				ack_queue: optional("ACK_QUEUE", "correct_wheels_list"),
				cleanup_queue: optional("CLEANUP_QUEUE", "failed_wheels_list"),
			},
			api: ApiConfig {
				base_url: require("API_ADDRESS")?,
				auth_address: require("AUTH_ADDRESS")?,
				auth_login: require("AUTH_LOGIN")?,
				auth_password: require("AUTH_PASSWORD")?,
				timeout: Duration::from_secs(parse("API_TIMEOUT_SECS", 15)?),
			},
			sync: SyncOptions {
				platform_name: optional("PLATFORM_NAME", "pmkBase1"),
				placement_status: optional("PLACEMENT_STATUS", "basePlatform"),
				max_stack_size: positive("STACK_MAX_SIZE", 6)?,
				use_timezone: flag("USE_TIMEZONE", false)?,
			},
			cadence: Cadence {
				forward: Duration::from_secs(parse("FORWARD_CADENCE_SECS", 10)?),
				ack: Duration::from_secs(parse("ACK_CADENCE_SECS", 30)?),
				cleanup: Duration::from_secs(parse("CLEANUP_CADENCE_SECS", 30)?),
				reverse: Duration::from_secs(parse("REVERSE_CADENCE_SECS", 30)?),
			},
			retry: RetryPolicy::new(
				parse("RETRY_MAX_ATTEMPTS", 3)?,
				Duration::from_secs(parse("RETRY_BACKOFF_SECS", 15)?),
			),
		})
	}
}

fn require(name: &'static str) -> Result<String> {
	env::var(name)
		.ok()
		.filter(|value| !value.is_empty())
		.ok_or(SyncError::ConfigMissing(name))
}

fn optional(name: &str, default: &str) -> String {
	env::var(name)
		.ok()
		.filter(|value| !value.is_empty())
		.unwrap_or_else(|| default.to_string())
}

fn parse<T>(name: &'static str, default: T) -> Result<T>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match env::var(name) {
		Ok(raw) if !raw.is_empty() => raw.parse().map_err(|e: T::Err| SyncError::ConfigInvalid {
			name,
			reason: e.to_string(),
		}),
		_ => Ok(default),
	}
}

/// Slot indexes range over `0..capacity`, so a capacity of zero would leave
/// every scanned row unplaceable. Reject it before the first run.
fn positive(name: &'static str, default: usize) -> Result<usize> {
	match parse(name, default)? {
		0 => Err(SyncError::ConfigInvalid {
			name,
			reason: "0 is not a valid capacity".to_string(),
		}),
		value => Ok(value),
	}
}

fn flag(name: &'static str, default: bool) -> Result<bool> {
	match env::var(name) {
		Ok(raw) if !raw.is_empty() => match raw.to_ascii_lowercase().as_str() {
			"1" | "true" | "yes" => Ok(true),
			"0" | "false" | "no" => Ok(false),
			other => Err(SyncError::ConfigInvalid {
				name,
				reason: format!("{other:?} is not a boolean"),
			}),
		},
		_ => Ok(default),
	}
}

/// Table names get spliced into SQL statements and must stay bare
/// identifiers, never quoted or qualified.
fn identifier(name: &'static str) -> Result<String> {
	let value = require(name)?;
	let valid = !value.starts_with(|c: char| c.is_ascii_digit())
		&& value
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '_');
	if valid {
		Ok(value)
	} else {
		Err(SyncError::ConfigInvalid {
			name,
			reason: format!("{value:?} is not a bare SQL identifier"),
		})
	}
}
