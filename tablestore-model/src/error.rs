use thiserror::Error;

use crate::scan::ScanError;

/// Errors raised while mapping objects to and from rows.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("field {field:?}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field {field:?}: integer out of range")]
    OutOfRange { field: String },

    #[error("field {field:?}: invalid timestamp")]
    InvalidTimestamp { field: String },

    #[error("object does not serialize to a JSON object")]
    NotAnObject,

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid resource name: {0:?}")]
    InvalidResource(String),

    #[error("resource {resource:?} is already registered for {existing}")]
    DuplicateResource {
        resource: String,
        existing: &'static str,
    },

    #[error("{type_name} is already registered as {resource:?}")]
    TypeAlreadyRegistered {
        type_name: &'static str,
        resource: String,
    },

    #[error("schema for {0} has no string name field")]
    MissingNameField(&'static str),
}

pub type ModelResult<T> = Result<T, ModelError>;
