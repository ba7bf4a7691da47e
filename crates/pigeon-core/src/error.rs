//! Error types for the Pigeon ingestion core.
//!
//! No error escapes a batch: per-message failures become exception rows,
//! per-phase failures are logged and the next phase still runs.

use thiserror::Error;

/// Core error type for ingestion operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed message body; the message is skipped and processing continues.
    #[error("decode error: {0}")]
    Decode(String),

    /// The classifier found an existing row that fully covers the inbound
    /// message. Routed to the exception table, never surfaced to listeners.
    #[error("duplicate arrival: {0}")]
    Duplicate(String),

    /// Local store operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A revocation or read receipt refers to a message that does not exist
    /// locally.
    #[error("missing target message: {0}")]
    MissingTarget(String),

    /// Serialization of a payload or snapshot failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Metadata cache lookup failed (including remote fall-back).
    #[error("cache error: {0}")]
    Cache(String),

    /// The batch context was cancelled between commit phases.
    #[error("batch cancelled")]
    Cancelled,
}

/// Result type alias using the core error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
