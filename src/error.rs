use thiserror::Error;

/// Custom Result type for emudb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for emudb
///
/// Every variant ends up as the `message` of a failed query result, so the
/// display strings are written for the person typing the SQL.
#[derive(Error, Debug)]
pub enum Error {
    /// Syntax error: missing clause, malformed statement, unsupported command or type
    #[error("Syntax error: {0}")]
    Parse(String),

    /// Unknown database, table or column
    #[error("{0}")]
    Reference(String),

    /// NOT NULL, UNIQUE or FOREIGN KEY violation
    #[error("Integrity constraint violation: {0}")]
    Integrity(String),

    /// Name collision on create
    #[error("{0}")]
    Duplicate(String),

    /// Internal error (storage, serialization, etc.)
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<std::num::ParseIntError> for Error {
    fn from(value: std::num::ParseIntError) -> Self {
        Error::Parse(value.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(value: std::num::ParseFloatError) -> Self {
        Error::Parse(value.to_string())
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(value: tempfile::PersistError) -> Self {
        Error::Io(value.error)
    }
}
