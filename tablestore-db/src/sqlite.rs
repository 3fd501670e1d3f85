//! SQLite executor backed by rusqlite.

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ErrorCode, InterruptHandle, OpenFlags, params_from_iter};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{DatabaseConfig, DialectKind};
use crate::dialect::{Dialect, Sqlite};
use crate::error::{DbError, DbResult};
use crate::executor::Executor;
use crate::value::{DriverValue, SqlValue};

/// Executor over a single SQLite connection.
///
/// `rusqlite::Connection` is not `Sync`, so the connection sits behind a
/// mutex and statements are serialized.
pub struct SqliteExecutor {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteExecutor {
    /// Opens (or creates) the database described by `config`.
    ///
    /// Missing parent directories are created, so opening doubles as the
    /// startup bootstrap. Foreign keys are enforced on every connection;
    /// a `busy_timeout` parameter (milliseconds) is applied if present.
    pub fn open(config: &DatabaseConfig) -> DbResult<Self> {
        if config.dialect != DialectKind::Sqlite {
            return Err(DbError::Connection(format!(
                "sqlite executor cannot open a {} database",
                config.dialect
            )));
        }

        let conn = match config.database.as_str() {
            "" | ":memory:" => Connection::open_in_memory(),
            path => {
                if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open_with_flags(config.dsn(), OpenFlags::default())
            }
        }
        .map_err(|e| DbError::Connection(format!("failed to open {}: {e}", config.database)))?;

        let executor = Self::with_connection(Arc::new(Mutex::new(conn)));
        executor.configure(config)?;
        info!(database = %config.database, "SQLite database opened");
        Ok(executor)
    }

    /// Opens a private in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(&DatabaseConfig::default())
    }

    /// Wraps an already-open connection.
    pub fn with_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Runs a batch of statements, typically table definitions.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.lock()?.execute_batch(sql).map_err(map_error)
    }

    /// Handle that aborts the statement currently running on this
    /// connection. Obtain it before issuing the statement to cancel.
    pub fn interrupt_handle(&self) -> DbResult<InterruptHandle> {
        Ok(self.lock()?.get_interrupt_handle())
    }

    fn configure(&self, config: &DatabaseConfig) -> DbResult<()> {
        let conn = self.lock()?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(map_error)?;
        if let Some(ms) = config.params.get("busy_timeout") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| DbError::Connection(format!("invalid busy_timeout: {ms:?}")))?;
            conn.busy_timeout(Duration::from_millis(ms)).map_err(map_error)?;
        }
        Ok(())
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DbError::Connection("connection lock poisoned".to_string()))
    }
}

impl Executor for SqliteExecutor {
    fn dialect(&self) -> &'static dyn Dialect {
        &Sqlite
    }

    fn execute(&self, sql: &str, args: &[DriverValue]) -> DbResult<u64> {
        debug!(sql, args = args.len(), "Executing statement");
        let conn = self.lock()?;
        let affected = conn.execute(sql, params_from_iter(args)).map_err(map_error)?;
        Ok(affected as u64)
    }

    fn query(&self, sql: &str, args: &[DriverValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        debug!(sql, args = args.len(), "Running query");
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(map_error)?;
        let width = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(args)).map_err(map_error)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_error)? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(SqlValue::from(row.get_ref(i).map_err(map_error)?));
            }
            out.push(values);
        }
        Ok(out)
    }
}

impl ToSql for DriverValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Self::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            Self::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            Self::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Self::Json(v) => {
                let text = serde_json::to_string(v)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                ToSqlOutput::Owned(Value::Text(text))
            }
        })
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(f) => Self::Real(f),
            ValueRef::Text(t) => Self::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Self::Blob(b.to_vec()),
        }
    }
}

fn map_error(err: rusqlite::Error) -> DbError {
    match err {
        rusqlite::Error::SqliteFailure(e, message) => {
            if e.code == ErrorCode::OperationInterrupted {
                return DbError::Interrupted;
            }
            DbError::Driver {
                code: Some(e.extended_code.to_string()),
                message: message.unwrap_or_else(|| e.to_string()),
            }
        }
        other => DbError::Driver {
            code: None,
            message: other.to_string(),
        },
    }
}
