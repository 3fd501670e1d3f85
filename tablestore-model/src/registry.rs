//! Type to resource-name registry, populated once at startup.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::object::Object;
use crate::schema::{FieldKind, ObjectSchema};

/// What the engine knows about one registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    name: String,
    type_name: &'static str,
    schema: ObjectSchema,
}

impl ResourceInfo {
    /// Resource name, which is also the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }
}

/// Maps each object type to exactly one resource and back.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    by_type: HashMap<TypeId, Arc<ResourceInfo>>,
    by_name: HashMap<String, TypeId>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under `resource`, building its schema.
    ///
    /// Re-registering the same pair is a no-op. A name already bound to a
    /// different type, or a type already bound to a different name, is an
    /// error.
    pub fn register<T: Object>(&mut self, resource: impl Into<String>) -> ModelResult<Arc<ResourceInfo>> {
        let resource = resource.into();
        if resource.trim().is_empty() {
            return Err(ModelError::InvalidResource(resource));
        }

        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_name.get(&resource) {
            if existing != type_id {
                let existing = self.by_type.get(&existing).map_or("<unknown>", |i| i.type_name);
                return Err(ModelError::DuplicateResource { resource, existing });
            }
        }
        if let Some(info) = self.by_type.get(&type_id) {
            if info.name != resource {
                return Err(ModelError::TypeAlreadyRegistered {
                    type_name: type_name::<T>(),
                    resource: info.name.clone(),
                });
            }
            return Ok(Arc::clone(info));
        }

        let schema = T::schema();
        if !schema.field("name").is_some_and(|f| f.kind() == FieldKind::String) {
            return Err(ModelError::MissingNameField(type_name::<T>()));
        }

        debug!(resource = %resource, fields = schema.len(), "Registered resource");
        let info = Arc::new(ResourceInfo {
            name: resource.clone(),
            type_name: type_name::<T>(),
            schema,
        });
        self.by_name.insert(resource, type_id);
        self.by_type.insert(type_id, Arc::clone(&info));
        Ok(info)
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T: Object>(mut self, resource: impl Into<String>) -> ModelResult<Self> {
        self.register::<T>(resource)?;
        Ok(self)
    }

    pub fn resource_of<T: Object>(&self) -> Option<Arc<ResourceInfo>> {
        self.by_type.get(&TypeId::of::<T>()).cloned()
    }

    pub fn get(&self, resource: &str) -> Option<Arc<ResourceInfo>> {
        self.by_name.get(resource).and_then(|id| self.by_type.get(id)).cloned()
    }

    /// Registered resource names, in no particular order.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
