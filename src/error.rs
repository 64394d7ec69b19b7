//! Error types for the search sync subsystem.
//!
//! Every fallible library operation returns [`Result`], whose error side is
//! [`SyncError`]. The variants keep apart the conditions callers must be able
//! to tell from each other: a query that timed out, an index that could not
//! be reached, and a request that was malformed before any I/O happened.
//!
//! An unconfigured index is deliberately *not* represented here; it degrades
//! to no-ops and empty results instead of failing.

use thiserror::Error;

/// The main error type for search sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Caller supplied arguments that can never succeed (bad page, empty query).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The index did not answer within the bounded timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The index was unreachable or answered with an error status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A commit could not be applied to the primary store.
    #[error("Commit conflict: {0}")]
    Conflict(String),

    /// A requested row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No searchable type is registered under the given index name.
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client errors that are neither timeouts nor status failures.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
}

/// Result type alias for operations that may fail with [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        SyncError::InvalidArgument(msg.into())
    }

    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        SyncError::Timeout(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        SyncError::Transport(msg.into())
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        SyncError::Conflict(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        SyncError::NotFound(msg.into())
    }

    pub fn unknown_index<S: Into<String>>(msg: S) -> Self {
        SyncError::UnknownIndex(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::Timeout(_))
    }

    /// True for failures caused by the index being unavailable.
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Http(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_status() {
            SyncError::Transport(err.to_string())
        } else {
            SyncError::Http(err)
        }
    }
}
