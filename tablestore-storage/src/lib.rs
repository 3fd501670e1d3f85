//! Relational storage engine for tablestore objects.
//!
//! Maps registered [`Object`](tablestore_model::Object) types onto one table
//! each and provides scoped CRUD, selector-based listing with pagination,
//! and JSON Patch / Merge Patch updates compiled to dialect-native SQL.
//!
//! # Architecture
//!
//! - [`Store`] resolves the table from the [`ResourceRegistry`](tablestore_model::ResourceRegistry),
//!   builds parameterized statements and runs them through an
//!   [`Executor`](tablestore_db::Executor)
//! - [`patch`] reduces patch documents to per-column updates before any SQL
//!   is built
//! - driver errors are normalized into [`StoreError`] by dialect error code
//! - [`ScopedStore`] is a handle bound to one scope chain
//!
//! There are no multi-statement transactions, migrations or watches.

mod error;
pub mod patch;
mod query;
mod scoped;
mod store;

pub use error::{StoreError, StoreResult};
pub use patch::{PatchError, UpdateMap};
pub use scoped::ScopedStore;
pub use store::{IMMUTABLE_FIELDS, STATUS_FIELDS, Store, WriteMode};
