use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use tablestore_db::{DriverValue, SqlValue};
use tablestore_model::{
    FieldDef, FieldKind, FieldMap, ModelError, Object, ObjectMeta, ObjectSchema, ScanTarget, infer_kind,
    to_driver_value,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Widget {
    #[serde(flatten)]
    meta: ObjectMeta,
    replicas: i64,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    ratio: Option<f64>,
    spec: BTreeMap<String, Value>,
    checksum: Vec<u8>,
}

impl Object for Widget {
    fn schema() -> ObjectSchema {
        ObjectSchema::builder()
            .field("replicas", FieldKind::Integer)
            .field("enabled", FieldKind::Bool)
            .nullable("ratio", FieldKind::Float)
            .field("spec", FieldKind::Map)
            .field("checksum", FieldKind::Bytes)
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

fn widget() -> Widget {
    let mut w = Widget {
        meta: ObjectMeta::named("w1").with_label("app", "web"),
        replicas: 3,
        enabled: true,
        ratio: None,
        spec: BTreeMap::from([("image".to_string(), json!("nginx"))]),
        checksum: vec![0xde, 0xad],
    };
    w.set_creation_timestamp(Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap());
    w
}

fn driver_value(map: &[(String, DriverValue)], column: &str) -> DriverValue {
    map.iter().find(|(c, _)| c == column).map(|(_, v)| v.clone()).unwrap()
}

// ── FieldMap ─────────────────────────────────────────────────────

#[test]
fn from_object_binds_every_schema_field() {
    let map = FieldMap::from_object(&Widget::schema(), &widget()).unwrap();
    assert_eq!(map.len(), Widget::schema().len());
    assert_eq!(map.get("replicas"), Some(&json!(3)));
    // skipped when None, still bound
    assert_eq!(map.get("ratio"), Some(&Value::Null));
}

#[test]
fn from_object_rejects_non_objects() {
    let err = FieldMap::from_object(&Widget::schema(), &42).unwrap_err();
    assert!(matches!(err, ModelError::NotAnObject));
}

#[test]
fn to_driver_values_converts_each_kind() {
    let values = FieldMap::from_object(&Widget::schema(), &widget())
        .unwrap()
        .to_driver_values()
        .unwrap();
    assert_eq!(driver_value(&values, "name"), DriverValue::Text("w1".into()));
    assert_eq!(driver_value(&values, "replicas"), DriverValue::Integer(3));
    assert_eq!(driver_value(&values, "enabled"), DriverValue::Bool(true));
    assert_eq!(driver_value(&values, "ratio"), DriverValue::Null);
    assert_eq!(driver_value(&values, "checksum"), DriverValue::Bytes(vec![0xde, 0xad]));
    assert_eq!(driver_value(&values, "spec"), DriverValue::Json(json!({"image": "nginx"})));
    assert_eq!(driver_value(&values, "labels"), DriverValue::Json(json!({"app": "web"})));
    assert_eq!(
        driver_value(&values, "creationTimestamp"),
        DriverValue::Text("2026-10-19T08:30:00.000000Z".into())
    );
}

#[test]
fn retain_filters_fields() {
    let mut map = FieldMap::from_object(&Widget::schema(), &widget()).unwrap();
    map.retain(|f| f.key() == "name" || f.kind() == FieldKind::Bool);
    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["enabled", "name"]);
}

#[test]
fn from_map_infers_kinds_for_unknown_keys() {
    let Value::Object(dynamic) = json!({"name": "d", "count": 2, "ratio": 0.5, "tags": ["a"], "extra": {"k": 1}})
    else {
        unreachable!()
    };
    let map = FieldMap::from_map(&dynamic, Some(&Widget::schema()));
    let kinds: BTreeMap<&str, FieldKind> = map.iter().map(|(f, _)| (f.key(), f.kind())).collect();
    assert_eq!(kinds["name"], FieldKind::String);
    assert_eq!(kinds["count"], FieldKind::Integer);
    // declared as nullable float in the schema
    assert_eq!(kinds["ratio"], FieldKind::Float);
    assert_eq!(kinds["tags"], FieldKind::List);
    assert_eq!(kinds["extra"], FieldKind::Map);

    let empty = FieldMap::from_map(&Map::new(), None);
    assert!(empty.is_empty());
}

#[test]
fn infer_kind_of_scalars() {
    assert_eq!(infer_kind(&json!(true)), FieldKind::Bool);
    assert_eq!(infer_kind(&json!(1.25)), FieldKind::Float);
    assert_eq!(infer_kind(&json!(u64::MAX)), FieldKind::Integer);
    assert_eq!(infer_kind(&Value::Null), FieldKind::Json);
}

// ── Driver values ────────────────────────────────────────────────

#[test]
fn integer_out_of_range() {
    let field = FieldDef::new("count", FieldKind::Integer);
    let err = to_driver_value(&field, &json!(u64::MAX)).unwrap_err();
    assert!(matches!(err, ModelError::OutOfRange { field } if field == "count"));
}

#[test]
fn type_mismatch_names_field() {
    let field = FieldDef::new("enabled", FieldKind::Bool);
    let err = to_driver_value(&field, &json!("yes")).unwrap_err();
    assert_eq!(err.to_string(), r#"field "enabled": expected bool, found string"#);
}

#[test]
fn json_kinds_check_document_shape() {
    let map = FieldDef::new("labels", FieldKind::Map);
    let list = FieldDef::new("finalizers", FieldKind::List);
    let any = FieldDef::new("extra", FieldKind::Json);

    assert_eq!(to_driver_value(&map, &json!({"a": 1})).unwrap(), DriverValue::Json(json!({"a": 1})));
    assert_eq!(
        to_driver_value(&map, &json!(["a"])).unwrap_err().to_string(),
        r#"field "labels": expected object, found array"#
    );
    assert_eq!(to_driver_value(&list, &json!(["a"])).unwrap(), DriverValue::Json(json!(["a"])));
    assert!(to_driver_value(&list, &json!({"a": 1})).is_err());
    assert_eq!(to_driver_value(&any, &json!("x")).unwrap(), DriverValue::Json(json!("x")));
    assert_eq!(to_driver_value(&list, &Value::Null).unwrap(), DriverValue::Null);
}

#[test]
fn timestamps_normalize_to_utc_micros() {
    let field = FieldDef::new("at", FieldKind::Timestamp);
    assert_eq!(
        to_driver_value(&field, &json!("2026-10-19T12:00:00.5+02:00")).unwrap(),
        DriverValue::Text("2026-10-19T10:00:00.500000Z".into())
    );
    assert!(matches!(
        to_driver_value(&field, &json!("yesterday")),
        Err(ModelError::InvalidTimestamp { .. })
    ));
}

#[test]
fn bytes_reject_non_byte_numbers() {
    let field = FieldDef::new("raw", FieldKind::Bytes);
    assert!(to_driver_value(&field, &json!([1, 256])).is_err());
}

// ── Scan targets ─────────────────────────────────────────────────

fn scan(field: &FieldDef, value: SqlValue) -> Result<Value, tablestore_model::ScanError> {
    ScanTarget::for_field(field).scan(field.column(), value)
}

#[test]
fn scan_target_selection() {
    let schema = Widget::schema();
    assert_eq!(
        ScanTarget::for_field(schema.field("creationTimestamp").unwrap()),
        ScanTarget::NullableTime
    );
    assert_eq!(
        ScanTarget::for_field(schema.field("spec").unwrap()),
        ScanTarget::Json { kind: FieldKind::Map, nullable: false }
    );
    assert_eq!(
        ScanTarget::for_field(schema.field("enabled").unwrap()),
        ScanTarget::Bool { nullable: false }
    );
    assert_eq!(
        ScanTarget::for_field(schema.field("name").unwrap()),
        ScanTarget::NullString { nullable: false }
    );
    assert_eq!(
        ScanTarget::for_field(schema.field("replicas").unwrap()),
        ScanTarget::Direct { kind: FieldKind::Integer, nullable: false }
    );
}

#[test]
fn json_null_forms_read_as_zero() {
    let map = FieldDef::new("spec", FieldKind::Map);
    let list = FieldDef::new("items", FieldKind::List);
    let any = FieldDef::new("extra", FieldKind::Json);
    for raw in [SqlValue::Null, SqlValue::Text(String::new()), SqlValue::Text("null".into())] {
        assert_eq!(scan(&map, raw.clone()).unwrap(), json!({}));
        assert_eq!(scan(&list, raw.clone()).unwrap(), json!([]));
        assert_eq!(scan(&any, raw).unwrap(), Value::Null);
    }
}

#[test]
fn json_decode_failure_is_fatal() {
    let field = FieldDef::new("spec", FieldKind::Map);
    let err = scan(&field, SqlValue::Text("{broken".into())).unwrap_err();
    assert_eq!(err.column(), "spec");
}

#[test]
fn json_from_blob() {
    let field = FieldDef::new("spec", FieldKind::Map);
    assert_eq!(scan(&field, SqlValue::Blob(br#"{"a":1}"#.to_vec())).unwrap(), json!({"a": 1}));
}

#[test]
fn bool_accepts_bitmaps_and_text() {
    let field = FieldDef::new("enabled", FieldKind::Bool);
    assert_eq!(scan(&field, SqlValue::Blob(vec![1])).unwrap(), json!(true));
    assert_eq!(scan(&field, SqlValue::Blob(vec![0])).unwrap(), json!(false));
    assert_eq!(scan(&field, SqlValue::Integer(1)).unwrap(), json!(true));
    assert_eq!(scan(&field, SqlValue::Text("false".into())).unwrap(), json!(false));
    assert!(scan(&field, SqlValue::Blob(vec![1, 0])).is_err());
}

#[test]
fn null_string_reads_empty() {
    let field = FieldDef::new("name", FieldKind::String);
    assert_eq!(scan(&field, SqlValue::Null).unwrap(), json!(""));
}

#[test]
fn direct_null_requires_nullable() {
    let strict = FieldDef::new("replicas", FieldKind::Integer);
    assert!(scan(&strict, SqlValue::Null).is_err());
    let loose = FieldDef::inferred("replicas", FieldKind::Integer);
    assert_eq!(scan(&loose, SqlValue::Null).unwrap(), Value::Null);
}

#[test]
fn time_accepts_sql_default_format() {
    let field = FieldDef::new("at", FieldKind::Timestamp);
    assert_eq!(
        scan(&field, SqlValue::Text("2026-10-19 08:30:00".into())).unwrap(),
        json!("2026-10-19T08:30:00.000000Z")
    );
    assert!(scan(&field, SqlValue::Null).is_err());
}

#[test]
fn scan_row_rebuilds_object() {
    let original = widget();
    let schema = Widget::schema();
    let fields: Vec<&FieldDef> = schema.fields().iter().collect();
    let row: Vec<SqlValue> = FieldMap::from_object(&schema, &original)
        .unwrap()
        .to_driver_values()
        .unwrap()
        .into_iter()
        .map(|(_, v)| match v {
            DriverValue::Null => SqlValue::Null,
            DriverValue::Text(s) => SqlValue::Text(s),
            DriverValue::Integer(i) => SqlValue::Integer(i),
            DriverValue::Real(f) => SqlValue::Real(f),
            DriverValue::Bool(b) => SqlValue::Integer(i64::from(b)),
            DriverValue::Bytes(b) => SqlValue::Blob(b),
            DriverValue::Json(v) => SqlValue::Text(v.to_string()),
        })
        .collect();

    let scanned: Widget = FieldMap::scan_row(&fields, row).unwrap();
    assert_eq!(scanned, original);
}

#[test]
fn scan_row_rejects_width_mismatch() {
    let schema = Widget::schema();
    let fields: Vec<&FieldDef> = schema.fields().iter().collect();
    let err = FieldMap::scan_row::<Widget>(&fields, vec![SqlValue::Null]).unwrap_err();
    assert!(matches!(err, ModelError::Scan(_)));
}
