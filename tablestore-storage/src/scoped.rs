use std::convert::Infallible;
use tablestore_model::{Object, ObjectList};
use tablestore_types::{DeleteOptions, GetOptions, ListOptions, PatchOptions, PatchType, Scope, UpdateOptions};

use crate::error::StoreResult;
use crate::store::{Store, WriteMode};

/// A [`Store`] narrowed to one scope chain.
///
/// ```no_run
/// # use tablestore_storage::Store;
/// # fn demo(store: &Store) {
/// let team = store.scope("project", "apollo").scope("namespace", "web");
/// assert_eq!(team.scopes().len(), 2);
/// # }
/// ```
#[derive(Clone)]
pub struct ScopedStore<'a> {
    store: &'a Store,
    scopes: Vec<Scope>,
}

impl Store {
    /// Starts a scope chain at `resource=name`.
    pub fn scope(&self, resource: impl Into<String>, name: impl Into<String>) -> ScopedStore<'_> {
        self.scoped(Vec::new()).scope(resource, name)
    }

    pub fn scoped(&self, scopes: Vec<Scope>) -> ScopedStore<'_> {
        ScopedStore { store: self, scopes }
    }
}

impl<'a> ScopedStore<'a> {
    /// Narrows further by `resource=name`.
    pub fn scope(mut self, resource: impl Into<String>, name: impl Into<String>) -> Self {
        self.scopes.push(Scope::new(resource, name));
        self
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn store(&self) -> &'a Store {
        self.store
    }

    pub fn create<T: Object>(&self, object: &mut T) -> StoreResult<()> {
        self.store.create(&self.scopes, object)
    }

    pub fn get<T: Object>(&self, name: &str) -> StoreResult<T> {
        self.store.get(&self.scopes, name, &GetOptions::default())
    }

    pub fn get_with<T: Object>(&self, name: &str, options: &GetOptions) -> StoreResult<T> {
        self.store.get(&self.scopes, name, options)
    }

    pub fn update<T: Object>(&self, object: &T, options: &UpdateOptions) -> StoreResult<()> {
        self.store.update(&self.scopes, object, WriteMode::Spec, options)
    }

    pub fn update_status<T: Object>(&self, object: &T, options: &UpdateOptions) -> StoreResult<()> {
        self.store.update(&self.scopes, object, WriteMode::Status, options)
    }

    pub fn patch<T: Object>(
        &self,
        name: &str,
        patch_type: PatchType,
        document: &[u8],
        options: &PatchOptions,
    ) -> StoreResult<()> {
        self.store
            .patch::<T>(&self.scopes, name, patch_type, document, WriteMode::Spec, options)
    }

    pub fn patch_status<T: Object>(
        &self,
        name: &str,
        patch_type: PatchType,
        document: &[u8],
        options: &PatchOptions,
    ) -> StoreResult<()> {
        self.store
            .patch::<T>(&self.scopes, name, patch_type, document, WriteMode::Status, options)
    }

    pub fn delete<T: Object>(&self, name: &str, options: &DeleteOptions) -> StoreResult<()> {
        self.store.delete::<T>(&self.scopes, name, options)
    }

    pub fn list<T: Object>(&self, options: &ListOptions) -> StoreResult<ObjectList<T>> {
        self.store.list(&self.scopes, options)
    }

    pub fn count<T: Object>(&self, options: &ListOptions) -> StoreResult<u64> {
        self.store.count::<T>(&self.scopes, options)
    }

    pub fn watch<T: Object>(&self, options: &ListOptions) -> StoreResult<Infallible> {
        self.store.watch::<T>(&self.scopes, options)
    }
}
