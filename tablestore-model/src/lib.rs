//! Object model and field mapping for tablestore.
//!
//! - [`Object`] / [`ObjectMeta`]: the contract stored types implement
//! - [`ObjectSchema`]: per-type field descriptor (keys, columns, kinds)
//! - [`FieldMap`]: a live value bound to its fields, convertible to driver values
//! - [`ScanTarget`]: per-field read adapters for rows coming back from the driver
//! - [`ResourceRegistry`]: explicit type to resource-name mapping
//!
//! Values cross this layer as `serde_json::Value`; the driver side uses the
//! `DriverValue`/`SqlValue` enums from `tablestore-db`.

mod error;
mod mapper;
mod object;
mod registry;
mod scan;
mod schema;

pub use error::{ModelError, ModelResult};
pub use mapper::{FieldMap, format_timestamp, infer_kind, parse_timestamp, to_driver_value};
pub use object::{Object, ObjectList, ObjectMeta, OwnerReference};
pub use registry::{ResourceInfo, ResourceRegistry};
pub use scan::{ScanError, ScanTarget};
pub use schema::{FieldDef, FieldKind, NameTransform, ObjectSchema, SchemaBuilder};
