//! Statement building.
//!
//! Everything here renders through the executor's [`Dialect`]; no backend
//! is named. Bound arguments are numbered in the order they are registered,
//! and every helper registers them in the order their placeholders appear
//! in the text, so positional (`?`) and numbered (`?N`, `$N`) placeholders
//! both line up.

use serde_json::{Value, json};
use tablestore_db::{Dialect, DriverValue, JsonContainer, JsonEdit, JsonPathSegment, escape_like};
use tablestore_model::{FieldDef, FieldKind, ObjectSchema, format_timestamp, parse_timestamp, to_driver_value};
use tablestore_types::{Operator, Requirement, Scope, SortDirection, SortField};

use crate::error::{StoreError, StoreResult};
use crate::patch::{ColumnUpdate, EditKind};

/// A SQL statement under construction together with its arguments.
pub(crate) struct SqlBuilder {
    dialect: &'static dyn Dialect,
    sql: String,
    args: Vec<DriverValue>,
    has_where: bool,
}

impl SqlBuilder {
    pub fn new(dialect: &'static dyn Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            args: Vec::new(),
            has_where: false,
        }
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub fn push_identifier(&mut self, ident: &str) -> &mut Self {
        let quoted = self.dialect.quote_identifier(ident);
        self.push(&quoted)
    }

    /// Registers an argument and returns its placeholder without writing it.
    pub fn bind(&mut self, value: DriverValue) -> String {
        self.args.push(value);
        self.dialect.placeholder(self.args.len())
    }

    pub fn push_bind(&mut self, value: DriverValue) -> &mut Self {
        let placeholder = self.bind(value);
        self.push(&placeholder)
    }

    /// Writes `(p1, p2, ...)`.
    pub fn push_bind_list(&mut self, values: Vec<DriverValue>) -> &mut Self {
        self.push("(");
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_bind(value);
        }
        self.push(")")
    }

    /// Starts the next `WHERE` conjunct.
    pub fn and_where(&mut self) -> &mut Self {
        let keyword = if self.has_where { " AND " } else { " WHERE " };
        self.has_where = true;
        self.push(keyword)
    }

    pub fn finish(self) -> (String, Vec<DriverValue>) {
        (self.sql, self.args)
    }
}

pub(crate) fn lookup<'s>(schema: &'s ObjectSchema, key: &str, context: &str) -> StoreResult<&'s FieldDef> {
    schema
        .field(key)
        .ok_or_else(|| StoreError::BadRequest(format!("unknown field {key:?} in {context}")))
}

/// Fields to select: the explicit projection without repeats, or every
/// mapped field.
pub(crate) fn projection<'s>(schema: &'s ObjectSchema, keys: &[String]) -> StoreResult<Vec<&'s FieldDef>> {
    if keys.is_empty() {
        return Ok(schema.fields().iter().collect());
    }
    let mut fields: Vec<&FieldDef> = Vec::with_capacity(keys.len());
    for key in keys {
        let field = lookup(schema, key, "projection")?;
        if !fields.iter().any(|f| f.key() == field.key()) {
            fields.push(field);
        }
    }
    Ok(fields)
}

pub(crate) fn push_columns(b: &mut SqlBuilder, fields: &[&FieldDef]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.push_identifier(field.column());
    }
}

pub(crate) fn push_scopes(b: &mut SqlBuilder, scopes: &[Scope]) {
    for scope in scopes {
        b.and_where()
            .push_identifier(scope.resource())
            .push(" = ")
            .push_bind(DriverValue::Text(scope.name().to_string()));
    }
}

pub(crate) fn push_name(b: &mut SqlBuilder, schema: &ObjectSchema, name: &str) -> StoreResult<()> {
    let field = lookup(schema, "name", "schema")?;
    b.and_where()
        .push_identifier(field.column())
        .push(" = ")
        .push_bind(DriverValue::Text(name.to_string()));
    Ok(())
}

pub(crate) fn push_selectors(
    b: &mut SqlBuilder,
    schema: &ObjectSchema,
    field_selector: &[Requirement],
    label_selector: &[Requirement],
) -> StoreResult<()> {
    for requirement in field_selector {
        push_field_requirement(b, schema, requirement)?;
    }
    for requirement in label_selector {
        push_label_requirement(b, schema, requirement)?;
    }
    Ok(())
}

fn push_field_requirement(b: &mut SqlBuilder, schema: &ObjectSchema, requirement: &Requirement) -> StoreResult<()> {
    let field = lookup(schema, requirement.key(), "field selector")?;
    if field.kind().is_json() && requirement.operator().takes_values() {
        return Err(StoreError::BadRequest(format!(
            "field {:?} holds a JSON document and only supports exists checks",
            field.key()
        )));
    }
    let column = b.dialect().quote_identifier(field.column());
    push_requirement(b, &column, requirement, |raw| selector_value(field, raw))
}

fn push_label_requirement(b: &mut SqlBuilder, schema: &ObjectSchema, requirement: &Requirement) -> StoreResult<()> {
    let labels = lookup(schema, "labels", "schema")?;
    let dialect = b.dialect();
    let extracted = dialect.json_extract_text(&dialect.quote_identifier(labels.column()), requirement.key());
    if requirement.operator().is_ordering() {
        let numeric = dialect.cast_numeric(&extracted);
        return push_requirement(b, &numeric, requirement, |raw| {
            raw.trim()
                .parse::<f64>()
                .map(DriverValue::Real)
                .map_err(|_| invalid_value("numeric", requirement.key()))
        });
    }
    push_requirement(b, &extracted, requirement, |raw| Ok(DriverValue::Text(raw.to_string())))
}

/// Renders one requirement against `expr`. `!=` and `notin` also match
/// rows where `expr` is NULL.
fn push_requirement(
    b: &mut SqlBuilder,
    expr: &str,
    requirement: &Requirement,
    convert: impl Fn(&str) -> StoreResult<DriverValue>,
) -> StoreResult<()> {
    let single = || {
        requirement
            .value()
            .ok_or_else(|| StoreError::BadRequest(format!("selector on {:?} needs a value", requirement.key())))
    };
    let operator = requirement.operator();
    match operator {
        Operator::Exists => {
            b.and_where().push(expr).push(" IS NOT NULL");
        }
        Operator::DoesNotExist => {
            b.and_where().push(expr).push(" IS NULL");
        }
        Operator::Equals => {
            let value = convert(single()?)?;
            b.and_where().push(expr).push(" = ").push_bind(value);
        }
        Operator::NotEquals => {
            let value = convert(single()?)?;
            b.and_where()
                .push("(")
                .push(expr)
                .push(" <> ")
                .push_bind(value)
                .push(" OR ")
                .push(expr)
                .push(" IS NULL)");
        }
        Operator::In | Operator::NotIn => {
            let values = requirement
                .values()
                .iter()
                .map(|raw| convert(raw))
                .collect::<StoreResult<Vec<_>>>()?;
            if operator == Operator::In {
                b.and_where().push(expr).push(" IN ").push_bind_list(values);
            } else {
                b.and_where()
                    .push("(")
                    .push(expr)
                    .push(" NOT IN ")
                    .push_bind_list(values)
                    .push(" OR ")
                    .push(expr)
                    .push(" IS NULL)");
            }
        }
        Operator::Like => {
            let pattern = format!("%{}%", escape_like(single()?));
            let placeholder = b.bind(DriverValue::Text(pattern));
            let like = b.dialect().like(expr, &placeholder);
            b.and_where().push(&like);
        }
        Operator::GreaterThan | Operator::GreaterThanOrEqual | Operator::LessThan | Operator::LessThanOrEqual => {
            let value = convert(single()?)?;
            let symbol = format!(" {} ", operator.symbol());
            b.and_where().push(expr).push(&symbol).push_bind(value);
        }
    }
    Ok(())
}

fn invalid_value(kind: &str, key: &str) -> StoreError {
    StoreError::BadRequest(format!("invalid {kind} value in selector on {key:?}"))
}

/// Converts a selector value according to the column kind.
fn selector_value(field: &FieldDef, raw: &str) -> StoreResult<DriverValue> {
    let invalid = || invalid_value(field.kind().as_str(), field.key());
    Ok(match field.kind() {
        FieldKind::String => DriverValue::Text(raw.to_string()),
        FieldKind::Integer => DriverValue::Integer(raw.trim().parse().map_err(|_| invalid())?),
        FieldKind::Float => DriverValue::Real(raw.trim().parse().map_err(|_| invalid())?),
        FieldKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => DriverValue::Bool(true),
            "false" | "0" => DriverValue::Bool(false),
            _ => return Err(invalid()),
        },
        FieldKind::Timestamp => {
            let ts = parse_timestamp(raw.trim()).ok_or_else(invalid)?;
            DriverValue::Text(format_timestamp(&ts))
        }
        FieldKind::Bytes => DriverValue::Bytes(raw.as_bytes().to_vec()),
        FieldKind::Map | FieldKind::List | FieldKind::Json => return Err(invalid()),
    })
}

/// `OR`-ed substring match of `search` over `keys`, or over the name when
/// no keys are given.
pub(crate) fn push_search(b: &mut SqlBuilder, schema: &ObjectSchema, search: &str, keys: &[String]) -> StoreResult<()> {
    if search.is_empty() {
        return Ok(());
    }
    let fields = if keys.is_empty() {
        vec![lookup(schema, "name", "schema")?]
    } else {
        keys.iter()
            .map(|key| lookup(schema, key, "search fields"))
            .collect::<StoreResult<Vec<_>>>()?
    };

    let pattern = format!("%{}%", escape_like(search));
    let dialect = b.dialect();
    b.and_where().push("(");
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            b.push(" OR ");
        }
        let placeholder = b.bind(DriverValue::Text(pattern.clone()));
        let like = dialect.like(&dialect.quote_identifier(field.column()), &placeholder);
        b.push(&like);
    }
    b.push(")");
    Ok(())
}

/// `ORDER BY` the requested fields, then by name so pages are stable.
pub(crate) fn push_order(b: &mut SqlBuilder, schema: &ObjectSchema, sort: &[SortField]) -> StoreResult<()> {
    let name = lookup(schema, "name", "schema")?;
    let mut by_name = false;
    b.push(" ORDER BY ");
    for (i, directive) in sort.iter().enumerate() {
        let field = lookup(schema, &directive.field, "sort")?;
        by_name |= field.key() == name.key();
        if i > 0 {
            b.push(", ");
        }
        b.push_identifier(field.column()).push(match directive.direction {
            SortDirection::Ascending => " ASC",
            SortDirection::Descending => " DESC",
        });
    }
    if !by_name {
        if !sort.is_empty() {
            b.push(", ");
        }
        b.push_identifier(name.column()).push(" ASC");
    }
    Ok(())
}

/// `LIMIT`/`OFFSET` are signed 64-bit in every backend.
pub(crate) fn push_page(b: &mut SqlBuilder, size: u64, offset: Option<u64>) {
    const MAX: u64 = i64::MAX as u64;
    if let Some(offset) = offset {
        b.push(&format!(" LIMIT {} OFFSET {}", size.min(MAX), offset.min(MAX)));
    }
}

/// Writes `column = <expr>` for one patched field.
pub(crate) fn push_assignment(b: &mut SqlBuilder, field: &FieldDef, update: &ColumnUpdate) -> StoreResult<()> {
    let dialect = b.dialect();
    let column = dialect.quote_identifier(field.column());
    b.push(&column).push(" = ");

    match update {
        ColumnUpdate::Merge(patch) if matches!(field.kind(), FieldKind::Map | FieldKind::Json) => {
            let placeholder = b.bind(DriverValue::Json(patch.clone()));
            let merged = dialect.json_merge_patch(
                &dialect.json_or_empty(&column, JsonContainer::Object),
                &dialect.json_value(&placeholder),
            );
            b.push(&merged);
        }
        ColumnUpdate::Value(value) | ColumnUpdate::Merge(value) => {
            b.push_bind(to_driver_value(field, value)?);
        }
        ColumnUpdate::Edit { base, edits } => {
            if !field.kind().is_json() {
                return Err(StoreError::BadRequest(format!(
                    "field {:?} is not a JSON document; nested paths are not supported",
                    field.key()
                )));
            }
            let paths = edits
                .iter()
                .map(|edit| json_path(field, &edit.path))
                .collect::<StoreResult<Vec<_>>>()?;
            let empty = container_of(field, paths.first().and_then(|p| p.first()));
            let mut expr = match base {
                None => dialect.json_or_empty(&column, empty),
                // cleared earlier in the same document
                Some(Value::Null) => {
                    let empty = match empty {
                        JsonContainer::Object => json!({}),
                        JsonContainer::Array => json!([]),
                    };
                    dialect.json_value(&b.bind(DriverValue::Json(empty)))
                }
                Some(value) => {
                    let bound = to_driver_value(field, value)?;
                    dialect.json_value(&b.bind(bound))
                }
            };
            for (edit, path) in edits.iter().zip(&paths) {
                let value = edit
                    .value
                    .as_ref()
                    .map(|v| dialect.json_value(&b.bind(DriverValue::Json(v.clone()))));
                let json_edit = match (edit.kind, value.as_deref()) {
                    (EditKind::Remove, _) => JsonEdit::Remove,
                    (EditKind::Set, Some(v)) => JsonEdit::Set(v),
                    (EditKind::Replace, Some(v)) => JsonEdit::Replace(v),
                    (_, None) => {
                        return Err(StoreError::Internal(format!("edit on {:?} lost its value", field.key())));
                    }
                };
                expr = dialect
                    .json_edit(&expr, json_edit, path)
                    .map_err(|e| StoreError::BadRequest(format!("field {:?}: {e}", field.key())))?;
            }
            b.push(&expr);
        }
    }
    Ok(())
}

/// Resolves pointer segments below `field`. The kind fixes what the first
/// segment addresses; deeper segments are read by their shape.
fn json_path(field: &FieldDef, path: &[String]) -> StoreResult<Vec<JsonPathSegment>> {
    let mut segments: Vec<JsonPathSegment> = path.iter().map(|s| JsonPathSegment::infer(s)).collect();
    match (field.kind(), segments.first_mut(), path.first()) {
        (FieldKind::Map, Some(first), Some(raw)) => *first = JsonPathSegment::Key(raw.clone()),
        (FieldKind::List, Some(JsonPathSegment::Key(key)), _) => {
            return Err(StoreError::BadRequest(format!(
                "field {:?} is a list and has no member {key:?}",
                field.key()
            )));
        }
        _ => {}
    }
    Ok(segments)
}

/// Document a NULL `field` stands for when edited at `first`.
fn container_of(field: &FieldDef, first: Option<&JsonPathSegment>) -> JsonContainer {
    match (field.kind(), first) {
        (FieldKind::Map, _) => JsonContainer::Object,
        (FieldKind::List, _) | (_, Some(JsonPathSegment::Index(_) | JsonPathSegment::End)) => JsonContainer::Array,
        _ => JsonContainer::Object,
    }
}
