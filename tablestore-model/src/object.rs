use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{FieldKind, ObjectSchema};

/// Reference from an object to the object that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub resource: String,
    pub name: String,
    #[serde(default)]
    pub controller: bool,
}

/// Metadata every stored object carries. Flatten it into the object type:
///
/// ```
/// # use serde::{Deserialize, Serialize};
/// # use tablestore_model::ObjectMeta;
/// #[derive(Serialize, Deserialize)]
/// struct Widget {
///     #[serde(flatten)]
///     meta: ObjectMeta,
///     size: i64,
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub finalizers: Vec<String>,
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Schema of the metadata columns, for embedding into object schemas.
    pub fn schema() -> ObjectSchema {
        ObjectSchema::builder()
            .field("name", FieldKind::String)
            .nullable("creationTimestamp", FieldKind::Timestamp)
            .field("labels", FieldKind::Map)
            .field("annotations", FieldKind::Map)
            .field("finalizers", FieldKind::List)
            .field("ownerReferences", FieldKind::List)
            .build()
    }
}

/// A storable object.
///
/// Implementors serialize to a JSON object whose keys match their
/// [`schema`](Object::schema); metadata comes from an embedded
/// [`ObjectMeta`].
pub trait Object: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Field descriptor, computed once at registration.
    fn schema() -> ObjectSchema;

    fn meta(&self) -> &ObjectMeta;

    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn set_name(&mut self, name: impl Into<String>) {
        self.meta_mut().name = name.into();
    }

    fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.meta().creation_timestamp
    }

    fn set_creation_timestamp(&mut self, ts: DateTime<Utc>) {
        self.meta_mut().creation_timestamp = Some(ts);
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.meta().labels
    }

    fn annotations(&self) -> &BTreeMap<String, String> {
        &self.meta().annotations
    }

    fn set_annotations(&mut self, annotations: BTreeMap<String, String>) {
        self.meta_mut().annotations = annotations;
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectList<T> {
    pub resource: String,
    /// Matches before pagination.
    pub total: u64,
    pub page: u64,
    pub size: u64,
    pub items: Vec<T>,
}

impl<T> Default for ObjectList<T> {
    fn default() -> Self {
        Self {
            resource: String::new(),
            total: 0,
            page: 0,
            size: 0,
            items: Vec::new(),
        }
    }
}

impl<T> ObjectList<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: Object> ObjectList<T> {
    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(Object::name).collect()
    }
}

impl<T> IntoIterator for ObjectList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
