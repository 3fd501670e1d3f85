//! Error types for the storage engine.

use tablestore_db::{DbError, Dialect, ErrorClass};
use tablestore_model::{ModelError, ScanError};
use thiserror::Error;
use tracing::warn;

use crate::patch::PatchError;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Domain errors returned to callers.
///
/// Messages carry the resource and object name but never bound values,
/// SQL text or credentials.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{resource} {name:?} not found")]
    NotFound { resource: String, name: String },

    #[error("{resource} {name:?} already exists")]
    AlreadyExists { resource: String, name: String },

    /// Malformed input: empty names, unknown fields, bad patches, missing
    /// required columns.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("type {0} is not registered")]
    NotRegistered(&'static str),

    /// Unclassified driver failure during an operation.
    #[error("storage error on {resource}: {source}")]
    Storage {
        resource: String,
        #[source]
        source: DbError,
    },

    /// Driver failure outside any resource, e.g. while opening.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }
}

impl From<ModelError> for StoreError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Scan(e) => Self::Scan(e),
            ModelError::Serialization(e) => Self::Serialization(e),
            e @ (ModelError::TypeMismatch { .. }
            | ModelError::OutOfRange { .. }
            | ModelError::InvalidTimestamp { .. }
            | ModelError::NotAnObject) => Self::BadRequest(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<PatchError> for StoreError {
    fn from(err: PatchError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<tablestore_types::Error> for StoreError {
    fn from(err: tablestore_types::Error) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Maps a driver error from `operation` on one object into the domain
/// taxonomy.
pub(crate) fn map_db_error(
    err: DbError,
    dialect: &dyn Dialect,
    operation: &'static str,
    resource: &str,
    name: &str,
) -> StoreError {
    let class = err.code().map_or(ErrorClass::Other, |code| dialect.classify_error(code));
    match class {
        ErrorClass::UniqueViolation => StoreError::AlreadyExists {
            resource: resource.to_string(),
            name: name.to_string(),
        },
        ErrorClass::NotNullViolation => {
            StoreError::BadRequest(format!("{resource} {name:?}: a required field is missing"))
        }
        // a missing referenced scope
        ErrorClass::ForeignKeyViolation => StoreError::not_found(resource, name),
        ErrorClass::DatabaseExists | ErrorClass::Other => {
            warn!(operation, resource = %resource, name = %name, error = %err, "Unclassified storage error");
            StoreError::Storage {
                resource: resource.to_string(),
                source: err,
            }
        }
    }
}
