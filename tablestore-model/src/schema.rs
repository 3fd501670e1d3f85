use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};

/// Storage kind of a field, which decides how it is written and scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    /// Signed 64-bit; narrower integer types widen into it.
    Integer,
    Float,
    Bool,
    Bytes,
    /// RFC 3339 instant, stored as UTC text.
    Timestamp,
    /// JSON object column.
    Map,
    /// JSON array column.
    List,
    /// Any JSON value.
    Json,
}

impl FieldKind {
    /// Whether the column holds a JSON document.
    pub fn is_json(self) -> bool {
        matches!(self, Self::Map | Self::List | Self::Json)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
            Self::Timestamp => "timestamp",
            Self::Map => "map",
            Self::List => "list",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One visible field: its serialized key, its column and its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    key: String,
    column: String,
    kind: FieldKind,
    nullable: bool,
    renamed: bool,
}

impl FieldDef {
    pub fn new(key: impl Into<String>, kind: FieldKind) -> Self {
        let key = key.into();
        Self {
            column: key.clone(),
            key,
            kind,
            nullable: false,
            renamed: false,
        }
    }

    /// A field discovered on a dynamic map rather than declared up front.
    pub fn inferred(key: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            nullable: true,
            ..Self::new(key, kind)
        }
    }

    /// Key in the object's serialized form.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Column name in the backing table.
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Whether NULL round-trips as JSON null (an `Option` field).
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Serialized value of a field that was not read.
    pub fn zero_value(&self) -> Value {
        if self.nullable {
            return Value::Null;
        }
        match self.kind {
            FieldKind::String => Value::String(String::new()),
            FieldKind::Integer => Value::from(0),
            FieldKind::Float => Value::from(0.0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Bytes | FieldKind::List => Value::Array(Vec::new()),
            FieldKind::Timestamp => Value::String("1970-01-01T00:00:00Z".to_string()),
            FieldKind::Map => Value::Object(Map::new()),
            FieldKind::Json => Value::Null,
        }
    }
}

/// Casing applied to field keys to derive column names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameTransform {
    #[default]
    Identity,
    SnakeCase,
    CamelCase,
    Lowercase,
}

impl NameTransform {
    pub fn apply(self, name: &str) -> String {
        match self {
            Self::Identity => name.to_string(),
            Self::Lowercase => name.to_lowercase(),
            Self::SnakeCase => snake_case(name),
            Self::CamelCase => camel_case(name),
        }
    }
}

fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                // end of an acronym: "HTTPPort" -> "http_port"
                Some(p) => p.is_uppercase() && next.is_some_and(char::is_lowercase),
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' || c == '-' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else if out.is_empty() {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Per-type field descriptor, built once and reused for every call.
///
/// Field order is declaration order with embedded fields following the
/// fields declared directly on the type. Keys and columns are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSchema {
    fields: Vec<FieldDef>,
}

impl ObjectSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Visible column names, used as the default projection.
    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(FieldDef::column).collect()
    }

    pub fn keys(&self) -> BTreeSet<&str> {
        self.fields.iter().map(FieldDef::key).collect()
    }

    pub fn field(&self, key: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn field_by_column(&self, column: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for [`ObjectSchema`].
///
/// ```
/// use tablestore_model::{FieldKind, NameTransform, ObjectMeta, ObjectSchema};
///
/// let schema = ObjectSchema::builder()
///     .field("replicas", FieldKind::Integer)
///     .renamed("displayName", "title", FieldKind::String)
///     .embed(ObjectMeta::schema())
///     .ignore("finalizers")
///     .transform(NameTransform::SnakeCase)
///     .build();
///
/// assert_eq!(schema.field("creationTimestamp").unwrap().column(), "creation_timestamp");
/// assert_eq!(schema.field("displayName").unwrap().column(), "title");
/// assert!(!schema.contains("finalizers"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldDef>,
    embedded: Vec<ObjectSchema>,
    ignored: HashSet<String>,
    transform: NameTransform,
}

impl SchemaBuilder {
    /// Declares a non-nullable field whose column follows the transform.
    pub fn field(mut self, key: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef::new(key, kind));
        self
    }

    /// Declares a field that may be NULL (an `Option` in the Rust type).
    pub fn nullable(mut self, key: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            nullable: true,
            ..FieldDef::new(key, kind)
        });
        self
    }

    /// Declares a field stored under an explicit column name.
    pub fn renamed(mut self, key: impl Into<String>, column: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            column: column.into(),
            renamed: true,
            ..FieldDef::new(key, kind)
        });
        self
    }

    /// Flattens another schema's fields into this one.
    pub fn embed(mut self, schema: ObjectSchema) -> Self {
        self.embedded.push(schema);
        self
    }

    /// Excludes a key, including one contributed by an embedded schema.
    pub fn ignore(mut self, key: impl Into<String>) -> Self {
        self.ignored.insert(key.into());
        self
    }

    pub fn transform(mut self, transform: NameTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn build(self) -> ObjectSchema {
        let mut keys = HashSet::new();
        let mut columns = HashSet::new();
        let mut fields = Vec::new();

        let inherited = self.embedded.into_iter().flat_map(|s| s.fields);
        for mut field in self.fields.into_iter().chain(inherited) {
            if self.ignored.contains(&field.key) {
                continue;
            }
            if !field.renamed {
                field.column = self.transform.apply(&field.key);
            }
            // outermost mapping wins
            if keys.contains(&field.key) || columns.contains(&field.column) {
                continue;
            }
            keys.insert(field.key.clone());
            columns.insert(field.column.clone());
            fields.push(field);
        }
        ObjectSchema { fields }
    }
}
