//! Statement execution.

use tracing::{debug, info};

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult, ErrorClass};
use crate::value::{DriverValue, SqlValue};

/// Runs single statements against one backend.
///
/// Implementations own connection handling; the storage engine only ever
/// issues one statement per call and never opens transactions.
pub trait Executor: Send + Sync {
    /// The dialect statements for this executor must be written in.
    fn dialect(&self) -> &'static dyn Dialect;

    /// Executes a statement and returns the number of affected rows.
    fn execute(&self, sql: &str, args: &[DriverValue]) -> DbResult<u64>;

    /// Executes a query and returns every row, columns in select order.
    fn query(&self, sql: &str, args: &[DriverValue]) -> DbResult<Vec<Vec<SqlValue>>>;
}

/// Creates database `name` through a server-level executor.
///
/// Idempotent: a backend reporting that the database already exists is
/// treated as success. Backends without databases (SQLite) are a no-op.
pub fn ensure_database(server: &dyn Executor, name: &str) -> DbResult<()> {
    let dialect = server.dialect();
    let Some(sql) = dialect.create_database(name) else {
        return Ok(());
    };
    match server.execute(&sql, &[]) {
        Ok(_) => {
            info!(database = %name, dialect = %dialect.kind(), "Database ready");
            Ok(())
        }
        Err(e) if is_database_exists(dialect, &e) => {
            debug!(database = %name, "Database already exists");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn is_database_exists(dialect: &dyn Dialect, err: &DbError) -> bool {
    err.code()
        .is_some_and(|code| dialect.classify_error(code) == ErrorClass::DatabaseExists)
}
