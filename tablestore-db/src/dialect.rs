//! SQL dialects.
//!
//! Every backend difference the storage engine cares about lives behind the
//! [`Dialect`] trait: identifier quoting, placeholders, connection strings,
//! JSON extraction and mutation, LIKE escaping, numeric casts, database
//! creation and error-code classification. Query building elsewhere is
//! dialect-agnostic.

use std::fmt;

use crate::config::{DatabaseConfig, DialectKind};
use crate::error::{DbError, DbResult, ErrorClass};

/// One mutation applied to a JSON document at a path.
///
/// Values are SQL expressions (usually a placeholder already wrapped by
/// [`Dialect::json_value`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonEdit<'a> {
    /// Create or overwrite the path. A trailing `-` segment appends.
    Set(&'a str),
    /// Delete the path.
    Remove,
    /// Overwrite the path only if it already exists.
    Replace(&'a str),
}

/// One step of a path below a JSON column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JsonPathSegment {
    /// Object member.
    Key(String),
    /// Array element.
    Index(u64),
    /// Past the last array element. Only valid as the final segment of a
    /// [`JsonEdit::Set`].
    End,
}

impl JsonPathSegment {
    /// Reads an RFC 6901 segment without knowing the container it
    /// addresses: canonical non-negative integers index arrays and `-` is
    /// the array end. Callers that know the container is an object use
    /// [`JsonPathSegment::Key`] directly.
    #[must_use]
    pub fn infer(segment: &str) -> Self {
        if segment == "-" {
            return Self::End;
        }
        if is_index(segment)
            && let Ok(index) = segment.parse()
        {
            return Self::Index(index);
        }
        Self::Key(segment.to_string())
    }
}

/// Shape of the document a NULL JSON column stands for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum JsonContainer {
    #[default]
    Object,
    Array,
}

/// Backend-specific SQL rendering.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn kind(&self) -> DialectKind;

    /// Quotes a table or column name.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Placeholder for the `index`-th (1-based) bound argument.
    fn placeholder(&self, index: usize) -> String;

    /// Connection string; `with_database = false` targets the server only.
    fn build_dsn(&self, config: &DatabaseConfig, with_database: bool) -> String;

    /// Text value of `key` inside the JSON object stored in `column`
    /// (already quoted).
    fn json_extract_text(&self, column: &str, key: &str) -> String;

    /// Wraps a bound JSON text argument so the backend treats it as JSON.
    fn json_value(&self, placeholder: &str) -> String;

    /// `column`, or an empty document of shape `empty` when the column is
    /// NULL.
    fn json_or_empty(&self, column: &str, empty: JsonContainer) -> String;

    /// RFC 7396 merge of `patch` into `target`.
    fn json_merge_patch(&self, target: &str, patch: &str) -> String;

    /// Applies `edit` at `path` (below the column) to the JSON expression
    /// `target`.
    fn json_edit(&self, target: &str, edit: JsonEdit<'_>, path: &[JsonPathSegment]) -> DbResult<String>;

    /// Substring match of `expr` against a pattern escaped with
    /// [`escape_like`].
    fn like(&self, expr: &str, pattern: &str) -> String;

    /// Casts `expr` to a numeric type for ordering comparisons.
    fn cast_numeric(&self, expr: &str) -> String;

    /// Statement creating database `name`, if the backend has databases.
    fn create_database(&self, name: &str) -> Option<String>;

    /// Classifies a native error code.
    fn classify_error(&self, code: &str) -> ErrorClass;
}

/// Escapes `%`, `_` and `\` so `s` matches literally inside a LIKE pattern
/// using `\` as the escape character.
#[must_use]
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn quote_with(ident: &str, quote: char) -> String {
    let mut out = String::with_capacity(ident.len() + 2);
    out.push(quote);
    for c in ident.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// Standard SQL string literal.
fn string_literal(s: &str) -> String {
    quote_with(s, '\'')
}

/// MySQL string literal; backslash is an escape character there.
fn mysql_string_literal(s: &str) -> String {
    quote_with(&s.replace('\\', "\\\\"), '\'')
}

/// Canonical array index: digits only, no leading zero.
fn is_index(segment: &str) -> bool {
    !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'))
}

/// Checks where an end marker sits in `path` and returns whether it is the
/// trailing one. Only [`JsonEdit::Set`] may append.
fn check_end(dialect: &'static str, edit: JsonEdit<'_>, path: &[JsonPathSegment]) -> DbResult<bool> {
    let unsupported = |what: &str| DbError::Unsupported {
        dialect,
        what: what.to_string(),
    };
    let (body, append) = match path.split_last() {
        Some((JsonPathSegment::End, parent)) => (parent, true),
        _ => (path, false),
    };
    if body.contains(&JsonPathSegment::End) {
        return Err(unsupported("array end marker before the last segment"));
    }
    if append && !matches!(edit, JsonEdit::Set(_)) {
        return Err(unsupported("array end marker outside of add"));
    }
    Ok(append)
}

/// `$."a"[0]."b"` path syntax shared by MySQL and SQLite. `end` renders
/// the array end marker.
fn dollar_path(path: &[JsonPathSegment], end: &str) -> String {
    let mut out = String::from("$");
    for segment in path {
        match segment {
            JsonPathSegment::Key(key) => {
                out.push('.');
                out.push_str(&json_key(key));
            }
            JsonPathSegment::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
            JsonPathSegment::End => out.push_str(end),
        }
    }
    out
}

/// Double-quoted object member name for `$` paths.
fn json_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 2);
    out.push('"');
    for c in key.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// `{a,0,b}` text-array path for Postgres jsonb functions. jsonb resolves
/// each element against the container it meets, and `-1` is the last
/// array element.
fn pg_path(path: &[JsonPathSegment]) -> String {
    let elements: Vec<String> = path
        .iter()
        .map(|segment| {
            let text = match segment {
                JsonPathSegment::Key(key) => key.replace('\\', "\\\\").replace('"', "\\\""),
                JsonPathSegment::Index(index) => index.to_string(),
                JsonPathSegment::End => "-1".to_string(),
            };
            format!("\"{text}\"")
        })
        .collect();
    string_literal(&format!("{{{}}}", elements.join(",")))
}

fn url_credentials(config: &DatabaseConfig) -> String {
    if config.username.is_empty() {
        return String::new();
    }
    let mut out = urlencoding::encode(&config.username).into_owned();
    if !config.password.is_empty() {
        out.push(':');
        out.push_str(&urlencoding::encode(&config.password));
    }
    out.push('@');
    out
}

fn url_params(config: &DatabaseConfig) -> String {
    if config.params.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = config
        .params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    format!("?{}", pairs.join("&"))
}

fn server_url(scheme: &str, config: &DatabaseConfig, database: &str) -> String {
    format!(
        "{scheme}://{}{}/{}{}",
        url_credentials(config),
        config.address,
        urlencoding::encode(database),
        url_params(config)
    )
}

// ── SQLite ───────────────────────────────────────────────────────

/// SQLite 3.38+ (JSON `->>` operator).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_with(ident, '"')
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{index}")
    }

    fn build_dsn(&self, config: &DatabaseConfig, _with_database: bool) -> String {
        let path = match config.database.as_str() {
            "" | ":memory:" => ":memory:".to_string(),
            p => p.replace('%', "%25").replace('?', "%3f").replace('#', "%23"),
        };
        format!("file:{path}{}", url_params(config))
    }

    fn json_extract_text(&self, column: &str, key: &str) -> String {
        format!("{column} ->> {}", string_literal(&format!("$.{}", json_key(key))))
    }

    fn json_value(&self, placeholder: &str) -> String {
        format!("json({placeholder})")
    }

    fn json_or_empty(&self, column: &str, empty: JsonContainer) -> String {
        match empty {
            JsonContainer::Object => format!("COALESCE({column}, '{{}}')"),
            JsonContainer::Array => format!("COALESCE({column}, '[]')"),
        }
    }

    fn json_merge_patch(&self, target: &str, patch: &str) -> String {
        format!("json_patch({target}, {patch})")
    }

    fn json_edit(&self, target: &str, edit: JsonEdit<'_>, path: &[JsonPathSegment]) -> DbResult<String> {
        check_end("sqlite", edit, path)?;
        let path = string_literal(&dollar_path(path, "[#]"));
        Ok(match edit {
            JsonEdit::Set(value) => format!("json_set({target}, {path}, {value})"),
            JsonEdit::Remove => format!("json_remove({target}, {path})"),
            JsonEdit::Replace(value) => format!("json_replace({target}, {path}, {value})"),
        })
    }

    fn like(&self, expr: &str, pattern: &str) -> String {
        format!("{expr} LIKE {pattern} ESCAPE '\\'")
    }

    fn cast_numeric(&self, expr: &str) -> String {
        format!("CAST({expr} AS REAL)")
    }

    fn create_database(&self, _name: &str) -> Option<String> {
        None
    }

    fn classify_error(&self, code: &str) -> ErrorClass {
        match code {
            // SQLITE_CONSTRAINT_UNIQUE, SQLITE_CONSTRAINT_PRIMARYKEY
            "2067" | "1555" => ErrorClass::UniqueViolation,
            // SQLITE_CONSTRAINT_NOTNULL
            "1299" => ErrorClass::NotNullViolation,
            // SQLITE_CONSTRAINT_FOREIGNKEY
            "787" => ErrorClass::ForeignKeyViolation,
            _ => ErrorClass::Other,
        }
    }
}

// ── MySQL ────────────────────────────────────────────────────────

/// MySQL 8.0.17+.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_with(ident, '`')
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn build_dsn(&self, config: &DatabaseConfig, with_database: bool) -> String {
        let database = if with_database { config.database.as_str() } else { "" };
        server_url("mysql", config, database)
    }

    fn json_extract_text(&self, column: &str, key: &str) -> String {
        format!("{column} ->> {}", mysql_string_literal(&format!("$.{}", json_key(key))))
    }

    fn json_value(&self, placeholder: &str) -> String {
        format!("CAST({placeholder} AS JSON)")
    }

    fn json_or_empty(&self, column: &str, empty: JsonContainer) -> String {
        match empty {
            JsonContainer::Object => format!("COALESCE({column}, JSON_OBJECT())"),
            JsonContainer::Array => format!("COALESCE({column}, JSON_ARRAY())"),
        }
    }

    fn json_merge_patch(&self, target: &str, patch: &str) -> String {
        format!("JSON_MERGE_PATCH({target}, {patch})")
    }

    fn json_edit(&self, target: &str, edit: JsonEdit<'_>, path: &[JsonPathSegment]) -> DbResult<String> {
        if check_end("mysql", edit, path)?
            && let (JsonEdit::Set(value), Some((_, parent))) = (edit, path.split_last())
        {
            let parent = mysql_string_literal(&dollar_path(parent, ""));
            return Ok(format!("JSON_ARRAY_APPEND({target}, {parent}, {value})"));
        }
        let path = mysql_string_literal(&dollar_path(path, ""));
        Ok(match edit {
            JsonEdit::Set(value) => format!("JSON_SET({target}, {path}, {value})"),
            JsonEdit::Remove => format!("JSON_REMOVE({target}, {path})"),
            JsonEdit::Replace(value) => format!("JSON_REPLACE({target}, {path}, {value})"),
        })
    }

    fn like(&self, expr: &str, pattern: &str) -> String {
        format!("{expr} LIKE {pattern} ESCAPE '\\\\'")
    }

    fn cast_numeric(&self, expr: &str) -> String {
        format!("CAST({expr} AS DOUBLE)")
    }

    fn create_database(&self, name: &str) -> Option<String> {
        Some(format!("CREATE DATABASE IF NOT EXISTS {}", self.quote_identifier(name)))
    }

    fn classify_error(&self, code: &str) -> ErrorClass {
        match code {
            "1062" => ErrorClass::UniqueViolation,
            "1048" => ErrorClass::NotNullViolation,
            "1452" | "1216" => ErrorClass::ForeignKeyViolation,
            "1007" => ErrorClass::DatabaseExists,
            _ => ErrorClass::Other,
        }
    }
}

// ── Postgres ─────────────────────────────────────────────────────

/// PostgreSQL with `jsonb` columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_with(ident, '"')
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn build_dsn(&self, config: &DatabaseConfig, with_database: bool) -> String {
        let database = if with_database { config.database.as_str() } else { "postgres" };
        server_url("postgres", config, database)
    }

    fn json_extract_text(&self, column: &str, key: &str) -> String {
        format!("{column} ->> {}", string_literal(key))
    }

    fn json_value(&self, placeholder: &str) -> String {
        format!("CAST({placeholder} AS jsonb)")
    }

    fn json_or_empty(&self, column: &str, empty: JsonContainer) -> String {
        match empty {
            JsonContainer::Object => format!("COALESCE({column}, '{{}}'::jsonb)"),
            JsonContainer::Array => format!("COALESCE({column}, '[]'::jsonb)"),
        }
    }

    /// Top-level merge only: `||` does not recurse into nested objects.
    fn json_merge_patch(&self, target: &str, patch: &str) -> String {
        format!("({target} || {patch})")
    }

    fn json_edit(&self, target: &str, edit: JsonEdit<'_>, path: &[JsonPathSegment]) -> DbResult<String> {
        if check_end("postgres", edit, path)?
            && let JsonEdit::Set(value) = edit
        {
            return Ok(format!("jsonb_insert({target}, {}, {value}, true)", pg_path(path)));
        }
        let path = pg_path(path);
        Ok(match edit {
            JsonEdit::Set(value) => format!("jsonb_set({target}, {path}, {value}, true)"),
            JsonEdit::Remove => format!("({target} #- {path})"),
            JsonEdit::Replace(value) => format!("jsonb_set({target}, {path}, {value}, false)"),
        })
    }

    fn like(&self, expr: &str, pattern: &str) -> String {
        format!("CAST({expr} AS TEXT) LIKE {pattern} ESCAPE '\\'")
    }

    fn cast_numeric(&self, expr: &str) -> String {
        format!("CAST({expr} AS NUMERIC)")
    }

    fn create_database(&self, name: &str) -> Option<String> {
        Some(format!("CREATE DATABASE {}", self.quote_identifier(name)))
    }

    fn classify_error(&self, code: &str) -> ErrorClass {
        match code {
            "23505" => ErrorClass::UniqueViolation,
            "23502" => ErrorClass::NotNullViolation,
            "23503" => ErrorClass::ForeignKeyViolation,
            "42P04" => ErrorClass::DatabaseExists,
            _ => ErrorClass::Other,
        }
    }
}
