//! Driver configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::dialect::{self, Dialect};
use crate::error::DbError;

/// Supported relational backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Sqlite,
    Mysql,
    Postgres,
}

impl DialectKind {
    /// The dialect implementation for this backend.
    #[must_use]
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            Self::Sqlite => &dialect::Sqlite,
            Self::Mysql => &dialect::MySql,
            Self::Postgres => &dialect::Postgres,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DialectKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(DbError::Connection(format!("unknown dialect: {other}"))),
        }
    }
}

/// Connection parameters for the backing database.
///
/// For SQLite, `database` is the file path (`:memory:` for a private
/// in-memory database) and `address`/credentials are ignored. For MySQL
/// and Postgres, `address` is `host:port`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub dialect: DialectKind,
    pub address: String,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Driver parameters appended to the connection string.
    pub params: BTreeMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::Sqlite,
            address: String::new(),
            username: String::new(),
            password: String::new(),
            database: ":memory:".to_string(),
            params: BTreeMap::new(),
        }
    }
}

impl DatabaseConfig {
    /// SQLite database at `path`.
    #[must_use]
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            database: path.into(),
            ..Self::default()
        }
    }

    /// Server backend at `address` using `database`.
    #[must_use]
    pub fn server(dialect: DialectKind, address: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            dialect,
            address: address.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect.dialect()
    }

    /// Connection string for the configured database.
    #[must_use]
    pub fn dsn(&self) -> String {
        self.dialect().build_dsn(self, true)
    }

    /// Connection string for the server without selecting the database,
    /// used to create the database at startup.
    #[must_use]
    pub fn server_dsn(&self) -> String {
        self.dialect().build_dsn(self, false)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("dialect", &self.dialect)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("database", &self.database)
            .field("params", &self.params)
            .finish()
    }
}
