//! The storage engine.

use chrono::{SubsecRound, Utc};
use std::any::type_name;
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use tablestore_db::{DatabaseConfig, DialectKind, DriverValue, Executor, SqliteExecutor};
use tablestore_model::{FieldMap, Object, ObjectList, ResourceInfo, ResourceRegistry};
use tablestore_types::{
    DeleteOptions, GetOptions, ListOptions, PatchOptions, PatchType, Requirement, Scope, UpdateOptions,
};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult, map_db_error};
use crate::patch::{KeyFilter, translate_json_patch, translate_merge_patch};
use crate::query::{
    SqlBuilder, lookup, projection, push_assignment, push_columns, push_name, push_order, push_page, push_scopes,
    push_search, push_selectors,
};

/// Keys a status-mode write may touch.
pub const STATUS_FIELDS: [&str; 5] = ["status", "annotations", "labels", "finalizers", "ownerReferences"];

/// Keys no update or patch ever rewrites.
pub const IMMUTABLE_FIELDS: [&str; 2] = ["name", "creationTimestamp"];

/// Which part of an object a write addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Everything except `status`.
    #[default]
    Spec,
    /// Only [`STATUS_FIELDS`].
    Status,
}

impl WriteMode {
    pub fn allows(self, key: &str) -> bool {
        if IMMUTABLE_FIELDS.contains(&key) {
            return false;
        }
        match self {
            Self::Spec => key != "status",
            Self::Status => STATUS_FIELDS.contains(&key),
        }
    }
}

/// Scoped CRUD over one table per registered resource.
///
/// Every call issues single statements through the executor; `list` issues
/// two (count, then data). The store holds no locks of its own.
#[derive(Clone)]
pub struct Store {
    executor: Arc<dyn Executor>,
    registry: Arc<ResourceRegistry>,
}

impl Store {
    pub fn new(executor: Arc<dyn Executor>, registry: Arc<ResourceRegistry>) -> Self {
        Self { executor, registry }
    }

    /// Opens a store on the SQLite database described by `config`.
    ///
    /// Server dialects need an executor supplied through [`Store::new`].
    pub fn open(config: &DatabaseConfig, registry: ResourceRegistry) -> StoreResult<Self> {
        if config.dialect != DialectKind::Sqlite {
            return Err(StoreError::Unsupported(format!(
                "no built-in executor for {}; construct the store with one",
                config.dialect
            )));
        }
        let executor = SqliteExecutor::open(config)?;
        info!(database = %config.database, resources = registry.len(), "Store opened");
        Ok(Self::new(Arc::new(executor), Arc::new(registry)))
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Inserts `object`, stamping its creation time.
    ///
    /// Each scope becomes an extra column holding the scope name.
    pub fn create<T: Object>(&self, scopes: &[Scope], object: &mut T) -> StoreResult<()> {
        let info = self.resource::<T>()?;
        let resource = info.name();
        require_name(resource, object.name())?;
        check_scopes(&info, scopes)?;

        object.set_creation_timestamp(Utc::now().trunc_subsecs(6));
        let values = FieldMap::from_object(info.schema(), &*object)?.to_driver_values()?;

        let dialect = self.executor.dialect();
        let mut b = SqlBuilder::new(dialect);
        b.push("INSERT INTO ").push_identifier(resource).push(" (");
        let columns = values
            .iter()
            .map(|(column, _)| column.as_str())
            .chain(scopes.iter().map(Scope::resource));
        for (i, column) in columns.enumerate() {
            if i > 0 {
                b.push(", ");
            }
            b.push_identifier(column);
        }
        b.push(") VALUES ");
        let args = values
            .into_iter()
            .map(|(_, value)| value)
            .chain(scopes.iter().map(|s| DriverValue::Text(s.name().to_string())))
            .collect();
        b.push_bind_list(args);

        let (sql, args) = b.finish();
        self.executor
            .execute(&sql, &args)
            .map_err(|e| map_db_error(e, dialect, "create", resource, object.name()))?;
        info!(resource = %resource, name = %object.name(), scopes = scopes.len(), "Created object");
        Ok(())
    }

    /// Reads one object by name.
    pub fn get<T: Object>(&self, scopes: &[Scope], name: &str, options: &GetOptions) -> StoreResult<T> {
        let info = self.resource::<T>()?;
        let resource = info.name();
        require_name(resource, name)?;
        let schema = info.schema();
        let fields = projection(schema, &options.fields)?;

        let dialect = self.executor.dialect();
        let mut b = SqlBuilder::new(dialect);
        b.push("SELECT ");
        push_columns(&mut b, &fields);
        b.push(" FROM ").push_identifier(resource);
        push_scopes(&mut b, scopes);
        push_name(&mut b, schema, name)?;
        push_selectors(&mut b, schema, &options.field_selector, &options.label_selector)?;
        b.push(" LIMIT 1");

        let (sql, args) = b.finish();
        let rows = self
            .executor
            .query(&sql, &args)
            .map_err(|e| map_db_error(e, dialect, "get", resource, name))?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(resource, name))?;
        Ok(FieldMap::scan_projection(schema, &fields, row)?)
    }

    /// Rewrites every field `mode` allows. No matching row is `NotFound`.
    pub fn update<T: Object>(
        &self,
        scopes: &[Scope],
        object: &T,
        mode: WriteMode,
        options: &UpdateOptions,
    ) -> StoreResult<()> {
        let info = self.resource::<T>()?;
        require_name(info.name(), object.name())?;

        let mut fields = FieldMap::from_object(info.schema(), object)?;
        fields.retain(|f| mode.allows(f.key()));
        let values = fields.to_driver_values()?;

        let target = WriteTarget {
            info: &info,
            scopes,
            name: object.name(),
            field_selector: &options.field_selector,
            label_selector: &options.label_selector,
        };
        self.write_row("update", &target, values.len(), |b| {
            for (i, (column, value)) in values.into_iter().enumerate() {
                if i > 0 {
                    b.push(", ");
                }
                b.push_identifier(&column).push(" = ").push_bind(value);
            }
            Ok(())
        })
    }

    /// Applies a JSON Patch or Merge Patch document to one object.
    ///
    /// Keys outside `mode`, outside `options.include` or inside
    /// `options.exclude` are skipped. Unknown keys and malformed documents
    /// fail before any statement runs.
    ///
    /// Nested edits run inside the database's JSON functions, so `replace`
    /// on a member that does not exist leaves the document unchanged
    /// instead of failing.
    pub fn patch<T: Object>(
        &self,
        scopes: &[Scope],
        name: &str,
        patch_type: PatchType,
        document: &[u8],
        mode: WriteMode,
        options: &PatchOptions,
    ) -> StoreResult<()> {
        let info = self.resource::<T>()?;
        let resource = info.name();
        require_name(resource, name)?;

        let filter = KeyFilter::new(options.include.iter().cloned(), options.exclude.iter().cloned());
        let updates = match patch_type {
            PatchType::JsonPatch => translate_json_patch(document, &filter)?,
            PatchType::MergePatch => translate_merge_patch(document, &filter)?,
        };

        let schema = info.schema();
        let mut planned = Vec::with_capacity(updates.len());
        for (key, update) in &updates {
            let field = lookup(schema, key, "patch")?;
            if !mode.allows(key) {
                debug!(resource = %resource, name = %name, key = %key, ?mode, "Skipping field outside write mode");
                continue;
            }
            planned.push((field, update));
        }

        let target = WriteTarget {
            info: &info,
            scopes,
            name,
            field_selector: &options.field_selector,
            label_selector: &options.label_selector,
        };
        self.write_row("patch", &target, planned.len(), |b| {
            for (i, (field, update)) in planned.into_iter().enumerate() {
                if i > 0 {
                    b.push(", ");
                }
                push_assignment(b, field, update)?;
            }
            Ok(())
        })
    }

    /// Deletes one object. No matching row is `NotFound`.
    pub fn delete<T: Object>(&self, scopes: &[Scope], name: &str, options: &DeleteOptions) -> StoreResult<()> {
        let info = self.resource::<T>()?;
        let resource = info.name();
        require_name(resource, name)?;
        let schema = info.schema();

        let dialect = self.executor.dialect();
        let mut b = SqlBuilder::new(dialect);
        b.push("DELETE FROM ").push_identifier(resource);
        push_scopes(&mut b, scopes);
        push_name(&mut b, schema, name)?;
        push_selectors(&mut b, schema, &options.field_selector, &options.label_selector)?;

        let (sql, args) = b.finish();
        let affected = self
            .executor
            .execute(&sql, &args)
            .map_err(|e| map_db_error(e, dialect, "delete", resource, name))?;
        if affected == 0 {
            return Err(StoreError::not_found(resource, name));
        }
        info!(resource = %resource, name = %name, "Deleted object");
        Ok(())
    }

    /// Lists objects matching `options`, one page at a time.
    ///
    /// `total` counts every match before pagination.
    pub fn list<T: Object>(&self, scopes: &[Scope], options: &ListOptions) -> StoreResult<ObjectList<T>> {
        let info = self.resource::<T>()?;
        let resource = info.name();
        let schema = info.schema();
        let fields = projection(schema, &options.fields)?;

        let dialect = self.executor.dialect();
        let mut b = SqlBuilder::new(dialect);
        b.push("SELECT ");
        push_columns(&mut b, &fields);
        b.push(" FROM ").push_identifier(resource);
        push_filters(&mut b, &info, scopes, options)?;
        push_order(&mut b, schema, &options.sort)?;
        push_page(&mut b, options.size, options.offset());

        let total = self.count_matching(&info, scopes, options)?;
        let (sql, args) = b.finish();
        let rows = self
            .executor
            .query(&sql, &args)
            .map_err(|e| map_db_error(e, dialect, "list", resource, ""))?;
        let items = rows
            .into_iter()
            .map(|row| FieldMap::scan_projection(schema, &fields, row))
            .collect::<Result<Vec<T>, _>>()?;

        debug!(resource = %resource, total, returned = items.len(), "Listed objects");
        Ok(ObjectList {
            resource: resource.to_string(),
            total,
            page: options.effective_page(),
            size: options.size,
            items,
        })
    }

    /// Counts objects matching the filters of `options`; pagination and
    /// sort are ignored.
    pub fn count<T: Object>(&self, scopes: &[Scope], options: &ListOptions) -> StoreResult<u64> {
        let info = self.resource::<T>()?;
        self.count_matching(&info, scopes, options)
    }

    /// Change notification is not provided by this engine.
    pub fn watch<T: Object>(&self, _scopes: &[Scope], _options: &ListOptions) -> StoreResult<Infallible> {
        let resource = self.resource::<T>()?;
        Err(StoreError::Unsupported(format!("watch on {}", resource.name())))
    }

    fn resource<T: Object>(&self) -> StoreResult<Arc<ResourceInfo>> {
        self.registry
            .resource_of::<T>()
            .ok_or(StoreError::NotRegistered(type_name::<T>()))
    }

    fn count_matching(&self, info: &ResourceInfo, scopes: &[Scope], options: &ListOptions) -> StoreResult<u64> {
        let dialect = self.executor.dialect();
        let mut b = SqlBuilder::new(dialect);
        b.push("SELECT COUNT(*) FROM ").push_identifier(info.name());
        push_filters(&mut b, info, scopes, options)?;
        let (sql, args) = b.finish();
        let rows = self
            .executor
            .query(&sql, &args)
            .map_err(|e| map_db_error(e, dialect, "count", info.name(), ""))?;
        read_count(&rows)
    }

    /// Runs `UPDATE ... SET <set> WHERE <target>`. With nothing to assign
    /// it only checks that the target row exists.
    fn write_row(
        &self,
        operation: &'static str,
        target: &WriteTarget<'_>,
        assignments: usize,
        set: impl FnOnce(&mut SqlBuilder) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let resource = target.info.name();
        let schema = target.info.schema();
        let dialect = self.executor.dialect();
        let mut b = SqlBuilder::new(dialect);

        if assignments == 0 {
            debug!(resource = %resource, name = %target.name, operation, "Nothing to write");
            b.push("SELECT COUNT(*) FROM ").push_identifier(resource);
        } else {
            b.push("UPDATE ").push_identifier(resource).push(" SET ");
            set(&mut b)?;
        }
        push_scopes(&mut b, target.scopes);
        push_name(&mut b, schema, target.name)?;
        push_selectors(&mut b, schema, target.field_selector, target.label_selector)?;
        let (sql, args) = b.finish();

        let affected = if assignments == 0 {
            let rows = self
                .executor
                .query(&sql, &args)
                .map_err(|e| map_db_error(e, dialect, operation, resource, target.name))?;
            read_count(&rows)?
        } else {
            self.executor
                .execute(&sql, &args)
                .map_err(|e| map_db_error(e, dialect, operation, resource, target.name))?
        };
        if affected == 0 {
            return Err(StoreError::not_found(resource, target.name));
        }
        debug!(resource = %resource, name = %target.name, operation, assignments, "Wrote object");
        Ok(())
    }
}

/// The row an update or patch addresses.
struct WriteTarget<'a> {
    info: &'a ResourceInfo,
    scopes: &'a [Scope],
    name: &'a str,
    field_selector: &'a [Requirement],
    label_selector: &'a [Requirement],
}

fn push_filters(b: &mut SqlBuilder, info: &ResourceInfo, scopes: &[Scope], options: &ListOptions) -> StoreResult<()> {
    let schema = info.schema();
    push_scopes(b, scopes);
    push_search(b, schema, &options.search, &options.search_fields)?;
    push_selectors(b, schema, &options.field_selector, &options.label_selector)
}

fn read_count(rows: &[Vec<tablestore_db::SqlValue>]) -> StoreResult<u64> {
    rows.first()
        .and_then(|row| row.first())
        .and_then(|value| value.as_count())
        .ok_or_else(|| StoreError::Internal("count query returned no count".to_string()))
}

fn require_name(resource: &str, name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::BadRequest(format!("{resource}: name must not be empty")));
    }
    Ok(())
}

/// Scope columns must be distinct and must not shadow object fields.
fn check_scopes(info: &ResourceInfo, scopes: &[Scope]) -> StoreResult<()> {
    let mut seen = HashSet::new();
    for scope in scopes {
        if !seen.insert(scope.resource()) {
            return Err(StoreError::BadRequest(format!("duplicate scope {:?}", scope.resource())));
        }
        if info.schema().field_by_column(scope.resource()).is_some() {
            return Err(StoreError::BadRequest(format!(
                "scope {:?} collides with a field of {}",
                scope.resource(),
                info.name()
            )));
        }
    }
    Ok(())
}
