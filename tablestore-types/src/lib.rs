//! Core type definitions for tablestore.
//!
//! This crate defines the backend-agnostic vocabulary every storage call is
//! expressed in:
//! - [`Scope`] tenancy path segments (`project=foo`, `namespace=bar`)
//! - [`Requirement`] selectors over columns or label maps
//! - [`SortField`] ordering directives
//! - per-call option structs for get, list, update, patch and delete
//!
//! Nothing here knows about SQL. The storage engine compiles these values
//! into dialect-specific statements.

mod options;
mod scope;
mod selector;
mod sort;

pub use options::{DeleteOptions, GetOptions, ListOptions, PatchOptions, PatchType, UpdateOptions};
pub use scope::Scope;
pub use selector::{Operator, Requirement};
pub use sort::{SortDirection, SortField};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing or parsing request types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid requirement on {key:?}: {reason}")]
    InvalidRequirement { key: String, reason: String },

    #[error("invalid operator: {0:?}")]
    InvalidOperator(String),

    #[error("invalid sort field: {0:?}")]
    InvalidSort(String),

    #[error("invalid scope: {0:?}")]
    InvalidScope(String),

    #[error("unknown patch type: {0:?}")]
    UnknownPatchType(String),
}
