// Error taxonomy for board, queue, and store operations

use thiserror::Error;

/// Errors surfaced by board, queue, and store operations.
///
/// Store unavailability is always a distinct variant from "no due job" or
/// "empty queue" (those are `Ok` empty results), so callers can tell
/// "nothing to do" from "system broken" and back off only in the latter case.
#[derive(Error, Debug)]
pub enum BoardError {
    #[error("job already exists: {0}")]
    AlreadyExists(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("unsupported payload format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl BoardError {
    /// True for transport/backend failures where retrying with backoff is
    /// appropriate; false for caller errors and definitive outcomes.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, BoardError::StoreUnavailable(_))
    }
}

impl From<redis::RedisError> for BoardError {
    fn from(err: redis::RedisError) -> Self {
        BoardError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(err: serde_json::Error) -> Self {
        BoardError::Malformed(err.to_string())
    }
}
