//! Values crossing the driver boundary.

use serde_json::Value;

/// A value bound into a statement.
///
/// This is the closed set every backend accepts natively. Anything without a
/// native mapping travels as [`DriverValue::Json`] and is encoded as JSON
/// text by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Json(Value),
}

impl DriverValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

impl From<&str> for DriverValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for DriverValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for DriverValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for DriverValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A column value read back from a row, in the storage classes drivers
/// actually return.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Storage class name, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    /// Interprets the value as a row count.
    #[must_use]
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Integer(i) => u64::try_from(*i).ok(),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}
