//! Shared fixtures for storage tests.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tablestore_db::SqliteExecutor;
use tablestore_model::{FieldKind, Object, ObjectMeta, ObjectSchema, ResourceRegistry};
use tablestore_storage::Store;
use tracing_subscriber::EnvFilter;

/// Table layout for [`Widget`], scoped by an optional `project` column.
pub const WIDGETS_DDL: &str = r#"
    CREATE TABLE projects (name TEXT PRIMARY KEY);
    INSERT INTO projects (name) VALUES ('apollo'), ('gemini');
    CREATE TABLE widgets (
        project TEXT REFERENCES projects(name),
        name TEXT NOT NULL,
        "creationTimestamp" TEXT,
        labels TEXT,
        annotations TEXT,
        finalizers TEXT,
        "ownerReferences" TEXT,
        value INTEGER NOT NULL,
        spec TEXT,
        status TEXT
    );
    CREATE UNIQUE INDEX widgets_identity ON widgets (COALESCE(project, ''), name);
"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    #[serde(flatten)]
    pub meta: ObjectMeta,
    pub value: i64,
    pub spec: BTreeMap<String, Value>,
    pub status: BTreeMap<String, Value>,
}

impl Widget {
    pub fn new(name: &str, value: i64) -> Self {
        Self {
            meta: ObjectMeta::named(name),
            value,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.meta.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_spec(mut self, key: &str, value: Value) -> Self {
        self.spec.insert(key.to_string(), value);
        self
    }
}

impl Object for Widget {
    fn schema() -> ObjectSchema {
        ObjectSchema::builder()
            .field("value", FieldKind::Integer)
            .field("spec", FieldKind::Map)
            .field("status", FieldKind::Map)
            .embed(ObjectMeta::schema())
            .build()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// A registered type with no table behind it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gadget {
    #[serde(flatten)]
    pub meta: ObjectMeta,
}

impl Object for Gadget {
    fn schema() -> ObjectSchema {
        ObjectMeta::schema()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn registry() -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();
    registry.register::<Widget>("widgets").unwrap();
    registry
}

/// In-memory store with the widgets table.
pub fn store() -> Store {
    init_tracing();
    let executor = SqliteExecutor::open_in_memory().unwrap();
    executor.execute_batch(WIDGETS_DDL).unwrap();
    Store::new(Arc::new(executor), Arc::new(registry()))
}
