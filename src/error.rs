use reqwest::StatusCode;
use thiserror::Error;

/// Pipeline-wide error taxonomy.
///
/// Store outages (`Ledger`, `Staging`) are the only retryable class; a
/// bounded retry with fixed backoff may recover them. Everything else either
/// aborts the invoking run or is a data violation that no retry can fix.
#[derive(Debug, Error)]
pub enum SyncError {
	#[error("missing configuration: {0}")]
	ConfigMissing(&'static str),

	#[error("invalid configuration for {name}: {reason}")]
	ConfigInvalid { name: &'static str, reason: String },

	#[error("authentication against the identity endpoint failed: {0}")]
	AuthFailed(String),

	#[error("scan ledger unavailable: {0}")]
	Ledger(#[from] sea_orm::DbErr),

	#[error("staging store unavailable: {0}")]
	Staging(#[from] redis::RedisError),

	#[error("grid API unreachable: {0}")]
	RemoteUnavailable(#[from] reqwest::Error),

	#[error("grid API rejected the request ({status}): {body}")]
	RemoteRejected { status: StatusCode, body: String },

	#[error("platform {0:?} not found on the grid side")]
	PlatformNotFound(String),

	#[error("wheel status {0:?} has no ledger status code")]
	UnknownStatus(String),

	#[error("malformed staging payload: {0}")]
	Payload(#[from] serde_json::Error),
}

impl SyncError {
	/// Whether a bounded retry makes sense for this error.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Ledger(_) | Self::Staging(_))
	}
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
