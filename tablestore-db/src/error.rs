//! Error types for the database layer.

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors reported by executors and dialects.
#[derive(Debug, Error)]
pub enum DbError {
    /// The connection could not be opened or is no longer usable.
    #[error("connection error: {0}")]
    Connection(String),

    /// The driver rejected or failed a statement.
    ///
    /// `code` is the backend's native error code rendered as a string
    /// (SQLite extended result code, MySQL error number, Postgres SQLSTATE).
    #[error("database error{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Driver {
        code: Option<String>,
        message: String,
    },

    /// The statement was interrupted before completing.
    #[error("statement interrupted")]
    Interrupted,

    /// The dialect cannot express the requested construct.
    #[error("unsupported by {dialect}: {what}")]
    Unsupported { dialect: &'static str, what: String },

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding of a bound value failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    /// Native error code, if the driver reported one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Driver { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Backend-independent classification of a driver error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    UniqueViolation,
    NotNullViolation,
    ForeignKeyViolation,
    DatabaseExists,
    Other,
}
