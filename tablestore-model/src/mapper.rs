//! Binding objects to fields and converting field values for the driver.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tablestore_db::{DriverValue, SqlValue};

use crate::error::{ModelError, ModelResult};
use crate::scan::ScanTarget;
use crate::schema::{FieldDef, FieldKind, ObjectSchema};

/// Fields of one live value, each paired with its serialized form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(FieldDef, Value)>,
}

impl FieldMap {
    /// Binds every schema field to `value`. Keys the value does not
    /// serialize (skipped `None`s) bind to null.
    pub fn from_object<T: Serialize + ?Sized>(schema: &ObjectSchema, value: &T) -> ModelResult<Self> {
        let Value::Object(mut object) = serde_json::to_value(value)? else {
            return Err(ModelError::NotAnObject);
        };
        let entries = schema
            .fields()
            .iter()
            .map(|field| {
                let value = object.remove(field.key()).unwrap_or(Value::Null);
                (field.clone(), value)
            })
            .collect();
        Ok(Self { entries })
    }

    /// Maps every present key of a dynamic map. Keys known to `schema` use
    /// the declared field; the rest get a kind inferred from their value.
    pub fn from_map(map: &Map<String, Value>, schema: Option<&ObjectSchema>) -> Self {
        let entries = map
            .iter()
            .map(|(key, value)| {
                let field = schema
                    .and_then(|s| s.field(key))
                    .cloned()
                    .unwrap_or_else(|| FieldDef::inferred(key.as_str(), infer_kind(value)));
                (field, value.clone())
            })
            .collect();
        Self { entries }
    }

    /// Reads one row into `T`. `row` holds the values of `fields`, in order.
    pub fn scan_row<T: DeserializeOwned>(fields: &[&FieldDef], row: Vec<SqlValue>) -> ModelResult<T> {
        if fields.len() != row.len() {
            return Err(ModelError::Scan(crate::scan::ScanError::new(
                "*",
                format!("expected {} columns, got {}", fields.len(), row.len()),
            )));
        }
        let mut object = Map::with_capacity(fields.len());
        for (field, value) in fields.iter().zip(row) {
            let value = ScanTarget::for_field(field).scan(field.column(), value)?;
            object.insert(field.key().to_string(), value);
        }
        Ok(serde_json::from_value(Value::Object(object))?)
    }

    /// Like [`scan_row`](Self::scan_row) for a projection: schema fields
    /// missing from `fields` read as their zero value.
    pub fn scan_projection<T: DeserializeOwned>(
        schema: &ObjectSchema,
        fields: &[&FieldDef],
        row: Vec<SqlValue>,
    ) -> ModelResult<T> {
        if fields.len() == schema.len() {
            return Self::scan_row(fields, row);
        }
        let mut object: Map<String, Value> = schema
            .fields()
            .iter()
            .map(|f| (f.key().to_string(), f.zero_value()))
            .collect();
        let Value::Object(scanned) = Self::scan_row::<Value>(fields, row)? else {
            return Err(ModelError::NotAnObject);
        };
        object.extend(scanned);
        Ok(serde_json::from_value(Value::Object(object))?)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&FieldDef) -> bool) {
        self.entries.retain(|(field, _)| keep(field));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(f, _)| f.key() == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldDef, &Value)> {
        self.entries.iter().map(|(f, v)| (f, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(f, _)| f.key())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Column name and driver value for every field, in field order.
    pub fn to_driver_values(&self) -> ModelResult<Vec<(String, DriverValue)>> {
        self.entries
            .iter()
            .map(|(field, value)| Ok((field.column().to_string(), to_driver_value(field, value)?)))
            .collect()
    }
}

/// Converts one serialized field value into a value the driver binds
/// natively. JSON-kinded fields are passed through as opaque JSON once
/// maps are objects and lists are arrays.
pub fn to_driver_value(field: &FieldDef, value: &Value) -> ModelResult<DriverValue> {
    if value.is_null() {
        return Ok(DriverValue::Null);
    }
    let mismatch = |expected: &'static str| ModelError::TypeMismatch {
        field: field.key().to_string(),
        expected,
        found: json_type(value),
    };

    Ok(match field.kind() {
        FieldKind::String => DriverValue::Text(value.as_str().ok_or_else(|| mismatch("string"))?.to_string()),
        FieldKind::Integer => match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => DriverValue::Integer(i),
                None if n.is_u64() => {
                    return Err(ModelError::OutOfRange {
                        field: field.key().to_string(),
                    });
                }
                None => return Err(mismatch("integer")),
            },
            _ => return Err(mismatch("integer")),
        },
        FieldKind::Float => DriverValue::Real(value.as_f64().ok_or_else(|| mismatch("float"))?),
        FieldKind::Bool => DriverValue::Bool(value.as_bool().ok_or_else(|| mismatch("bool"))?),
        FieldKind::Bytes => {
            let items = value.as_array().ok_or_else(|| mismatch("bytes"))?;
            let bytes = items
                .iter()
                .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| mismatch("bytes"))?;
            DriverValue::Bytes(bytes)
        }
        FieldKind::Timestamp => {
            let text = value.as_str().ok_or_else(|| mismatch("timestamp"))?;
            let ts = parse_timestamp(text).ok_or_else(|| ModelError::InvalidTimestamp {
                field: field.key().to_string(),
            })?;
            DriverValue::Text(format_timestamp(&ts))
        }
        FieldKind::Map if !value.is_object() => return Err(mismatch("object")),
        FieldKind::List if !value.is_array() => return Err(mismatch("array")),
        FieldKind::Map | FieldKind::List | FieldKind::Json => DriverValue::Json(value.clone()),
    })
}

/// Kind of a dynamic value, for maps without a declared schema.
pub fn infer_kind(value: &Value) -> FieldKind {
    match value {
        Value::Null => FieldKind::Json,
        Value::Bool(_) => FieldKind::Bool,
        Value::Number(n) if n.is_f64() => FieldKind::Float,
        Value::Number(_) => FieldKind::Integer,
        Value::String(_) => FieldKind::String,
        Value::Array(_) => FieldKind::List,
        Value::Object(_) => FieldKind::Map,
    }
}

/// Storage form of a timestamp: RFC 3339, UTC, microsecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses RFC 3339, or the `YYYY-MM-DD HH:MM:SS[.f]` form SQL defaults
/// produce (read as UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
