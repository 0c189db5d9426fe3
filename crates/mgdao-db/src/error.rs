//! Error types for registry, handle and DAO operations
//!
//! Store failures seen through a [`Dao`](crate::dao::Dao) are logged with
//! their original text and surfaced as one of the generic
//! `Write`/`Delete`/`Update`/`Query` variants.

use std::fmt;

/// Result type for mgdao operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
	/// Missing collection name, missing or unknown database tag, bad settings
	Configuration(String),

	/// No live connection could be obtained, or dialing failed
	Connection(String),

	/// Insert failed after a connection was obtained
	Write,

	/// Delete failed after a connection was obtained
	Delete,

	/// Update failed after a connection was obtained
	Update,

	/// Query failed after a connection was obtained
	Query,

	/// A single-document write matched nothing
	NotFound,

	/// The handle's context was cancelled
	Cancelled,

	/// The handle's context deadline passed
	DeadlineExceeded,

	/// A fixed time budget ran out (health-check ping)
	Timeout(String),

	/// Document (de)serialization error
	Serialization(String),

	/// Store-level execution error (contains the original error message)
	Execution(String),

	/// Operation the store rejects outright
	InvalidOperation(String),
}

impl Error {
	/// Whether the error came from the caller's context rather than the store
	pub fn is_context_error(&self) -> bool {
		matches!(self, Error::Cancelled | Error::DeadlineExceeded)
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Error::NotFound)
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
			Error::Connection(msg) => write!(f, "Connection error: {}", msg),
			Error::Write => write!(f, "database insert failed"),
			Error::Delete => write!(f, "database delete failed"),
			Error::Update => write!(f, "database update failed"),
			Error::Query => write!(f, "database query failed"),
			Error::NotFound => write!(f, "no such document"),
			Error::Cancelled => write!(f, "context canceled"),
			Error::DeadlineExceeded => write!(f, "context deadline exceeded"),
			Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
			Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
			Error::Execution(msg) => write!(f, "Execution error: {}", msg),
			Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

// In bson v3.x, serialization and deserialization share bson::error::Error
impl From<bson::error::Error> for Error {
	fn from(err: bson::error::Error) -> Self {
		Error::Serialization(err.to_string())
	}
}

impl From<mgdao_conf::ConfigError> for Error {
	fn from(err: mgdao_conf::ConfigError) -> Self {
		Error::Configuration(err.to_string())
	}
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for Error {
	fn from(err: mongodb::error::Error) -> Self {
		use mongodb::error::ErrorKind;

		match *err.kind {
			ErrorKind::Authentication { .. }
			| ErrorKind::Io(_)
			| ErrorKind::ServerSelection { .. }
			| ErrorKind::ConnectionPoolCleared { .. } => Error::Connection(err.to_string()),
			ErrorKind::InvalidArgument { .. } => Error::InvalidOperation(err.to_string()),
			_ => Error::Execution(err.to_string()),
		}
	}
}
