//! Read-side adapters turning driver values back into serialized fields.

use chrono::DateTime;
use serde_json::{Map, Number, Value};
use tablestore_db::SqlValue;
use thiserror::Error;

use crate::mapper::{format_timestamp, parse_timestamp};
use crate::schema::{FieldDef, FieldKind};

/// A column value that cannot be read into its field. Aborts the row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot scan column {column:?}: {reason}")]
pub struct ScanError {
    column: String,
    reason: String,
}

impl ScanError {
    pub fn new(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

/// How one column is read, chosen from the field's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTarget {
    /// Non-null timestamp.
    Time,
    /// Timestamp where NULL reads as null.
    NullableTime,
    /// JSON document; NULL, empty text and `null` read as the kind's zero.
    Json { kind: FieldKind, nullable: bool },
    /// Boolean stored as an integer, text or single-byte bitmap.
    Bool { nullable: bool },
    /// String where NULL reads as `""` unless the field is nullable.
    NullString { nullable: bool },
    /// Integers, floats and bytes.
    Direct { kind: FieldKind, nullable: bool },
}

impl ScanTarget {
    pub fn for_field(field: &FieldDef) -> Self {
        let nullable = field.is_nullable();
        match field.kind() {
            FieldKind::Timestamp if nullable => Self::NullableTime,
            FieldKind::Timestamp => Self::Time,
            kind if kind.is_json() => Self::Json { kind, nullable },
            FieldKind::Bool => Self::Bool { nullable },
            FieldKind::String => Self::NullString { nullable },
            kind => Self::Direct { kind, nullable },
        }
    }

    pub fn scan(&self, column: &str, value: SqlValue) -> Result<Value, ScanError> {
        let fail = |reason: String| ScanError::new(column, reason);
        match *self {
            Self::NullableTime if value.is_null() => Ok(Value::Null),
            Self::Time | Self::NullableTime => scan_time(value).map_err(fail),
            Self::Json { kind, nullable } => scan_json(kind, nullable, value).map_err(fail),
            Self::Bool { nullable } => scan_bool(nullable, value).map_err(fail),
            Self::NullString { nullable } => scan_string(nullable, value).map_err(fail),
            Self::Direct { kind, nullable } => scan_direct(kind, nullable, value).map_err(fail),
        }
    }
}

fn scan_time(value: SqlValue) -> Result<Value, String> {
    let ts = match value {
        SqlValue::Text(text) => parse_timestamp(&text),
        SqlValue::Integer(secs) => DateTime::from_timestamp(secs, 0),
        other => return Err(format!("cannot read {} as timestamp", other.type_name())),
    };
    ts.map(|ts| Value::String(format_timestamp(&ts)))
        .ok_or_else(|| "invalid timestamp".to_string())
}

fn json_zero(kind: FieldKind, nullable: bool) -> Value {
    match kind {
        _ if nullable => Value::Null,
        FieldKind::Map => Value::Object(Map::new()),
        FieldKind::List => Value::Array(Vec::new()),
        _ => Value::Null,
    }
}

fn scan_json(kind: FieldKind, nullable: bool, value: SqlValue) -> Result<Value, String> {
    let text = match value {
        SqlValue::Null => return Ok(json_zero(kind, nullable)),
        SqlValue::Text(text) => text,
        SqlValue::Blob(bytes) => String::from_utf8(bytes).map_err(|e| e.to_string())?,
        SqlValue::Integer(i) if kind == FieldKind::Json => return Ok(Value::from(i)),
        SqlValue::Real(f) if kind == FieldKind::Json => return real(f),
        other => return Err(format!("cannot decode {} as JSON {kind}", other.type_name())),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(json_zero(kind, nullable));
    }
    serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON: {e}"))
}

fn scan_bool(nullable: bool, value: SqlValue) -> Result<Value, String> {
    let b = match value {
        SqlValue::Null if nullable => return Ok(Value::Null),
        SqlValue::Null => false,
        SqlValue::Integer(i) => i != 0,
        SqlValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => true,
            "0" | "false" => false,
            other => return Err(format!("invalid boolean text {other:?}")),
        },
        SqlValue::Blob(bytes) => match bytes.as_slice() {
            [0] | [b'0'] => false,
            [1] | [b'1'] => true,
            _ => return Err(format!("invalid boolean bitmap of {} bytes", bytes.len())),
        },
        SqlValue::Real(_) => return Err("cannot read real as bool".to_string()),
    };
    Ok(Value::Bool(b))
}

fn scan_string(nullable: bool, value: SqlValue) -> Result<Value, String> {
    Ok(match value {
        SqlValue::Null if nullable => Value::Null,
        SqlValue::Null => Value::String(String::new()),
        SqlValue::Text(text) => Value::String(text),
        SqlValue::Integer(i) => Value::String(i.to_string()),
        SqlValue::Real(f) => Value::String(f.to_string()),
        SqlValue::Blob(bytes) => Value::String(String::from_utf8(bytes).map_err(|e| e.to_string())?),
    })
}

fn scan_direct(kind: FieldKind, nullable: bool, value: SqlValue) -> Result<Value, String> {
    if value.is_null() {
        return if nullable {
            Ok(Value::Null)
        } else {
            Err(format!("NULL in non-nullable {kind} column"))
        };
    }
    let type_name = value.type_name();
    match (kind, value) {
        (FieldKind::Integer, SqlValue::Integer(i)) => Ok(Value::from(i)),
        (FieldKind::Integer, SqlValue::Real(f)) if f.fract() == 0.0 => Ok(Value::from(f as i64)),
        (FieldKind::Integer, SqlValue::Text(t)) => t
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("invalid integer text: {e}")),
        (FieldKind::Float, SqlValue::Real(f)) => real(f),
        (FieldKind::Float, SqlValue::Integer(i)) => real(i as f64),
        (FieldKind::Float, SqlValue::Text(t)) => real(t.trim().parse().map_err(|e| format!("invalid float text: {e}"))?),
        (FieldKind::Bytes, SqlValue::Blob(bytes)) => Ok(bytes_value(bytes)),
        (FieldKind::Bytes, SqlValue::Text(t)) => Ok(bytes_value(t.into_bytes())),
        (kind, _) => Err(format!("cannot read {type_name} as {kind}")),
    }
}

fn real(f: f64) -> Result<Value, String> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| "non-finite float".to_string())
}

fn bytes_value(bytes: Vec<u8>) -> Value {
    Value::Array(bytes.into_iter().map(Value::from).collect())
}
