//! Database connection management for tablestore.
//!
//! This crate is the only place that knows which relational backend is in
//! use. It provides:
//! - [`DatabaseConfig`], the driver configuration and DSN builder
//! - the [`Dialect`] trait with MySQL, Postgres and SQLite implementations
//! - [`DriverValue`] / [`SqlValue`], the values bound into and read out of
//!   statements
//! - the [`Executor`] trait the storage engine runs statements through, and
//!   [`SqliteExecutor`], its rusqlite implementation
//! - [`ensure_database`], the idempotent startup bootstrap

mod config;
mod dialect;
mod error;
mod executor;
mod sqlite;
mod value;

pub use config::{DatabaseConfig, DialectKind};
pub use dialect::{Dialect, JsonContainer, JsonEdit, JsonPathSegment, MySql, Postgres, Sqlite, escape_like};
pub use error::{DbError, DbResult, ErrorClass};
pub use executor::{Executor, ensure_database};
pub use sqlite::SqliteExecutor;
pub use value::{DriverValue, SqlValue};
