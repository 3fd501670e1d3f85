mod common;

use common::{Gadget, WIDGETS_DDL, Widget, registry, store};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use tablestore_db::{DatabaseConfig, DialectKind, Executor};
use tablestore_model::Object;
use tablestore_storage::{Store, StoreError, WriteMode};
use tablestore_types::{
    DeleteOptions, GetOptions, ListOptions, Operator, Requirement, Scope, SortField, UpdateOptions,
};

fn get(store: &Store, scopes: &[Scope], name: &str) -> Result<Widget, StoreError> {
    store.get(scopes, name, &GetOptions::default())
}

fn seed(store: &Store, widgets: Vec<Widget>) {
    for mut widget in widgets {
        store.create(&[], &mut widget).unwrap();
    }
}

// ── Create & get ─────────────────────────────────────────────────

#[test]
fn create_then_get_round_trips() {
    let store = store();
    let mut widget = Widget::new("a", 1)
        .with_label("app", "web")
        .with_spec("image", json!("nginx"));
    store.create(&[], &mut widget).unwrap();
    assert!(widget.creation_timestamp().is_some());

    let fetched = get(&store, &[], "a").unwrap();
    assert_eq!(fetched, widget);
    assert_eq!(fetched.value, 1);
}

#[test]
fn create_with_empty_name_is_bad_request() {
    let store = store();
    let err = store.create(&[], &mut Widget::new("", 1)).unwrap_err();
    assert!(err.is_bad_request());
}

#[test]
fn duplicate_name_already_exists() {
    let store = store();
    store.create(&[], &mut Widget::new("a", 1)).unwrap();
    let err = store.create(&[], &mut Widget::new("a", 2)).unwrap_err();
    assert!(err.is_already_exists(), "{err}");
    assert_eq!(err.to_string(), r#"widgets "a" already exists"#);
}

#[test]
fn get_missing_is_not_found() {
    let store = store();
    assert!(get(&store, &[], "ghost").unwrap_err().is_not_found());
    assert!(get(&store, &[], "").unwrap_err().is_bad_request());
}

#[test]
fn unregistered_type_is_rejected() {
    let store = store();
    let err = store.get::<Gadget>(&[], "x", &GetOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::NotRegistered(_)));
}

#[test]
fn get_with_projection_zero_fills() {
    let store = store();
    seed(&store, vec![Widget::new("a", 5).with_spec("image", json!("nginx"))]);
    let options = GetOptions {
        fields: vec!["name".into(), "value".into()],
        ..GetOptions::default()
    };
    let partial: Widget = store.get(&[], "a", &options).unwrap();
    assert_eq!(partial.value, 5);
    assert!(partial.spec.is_empty());
    assert!(partial.creation_timestamp().is_none());
}

#[test]
fn get_with_unknown_projection_is_bad_request() {
    let store = store();
    let options = GetOptions {
        fields: vec!["nope".into()],
        ..GetOptions::default()
    };
    assert!(store.get::<Widget>(&[], "a", &options).unwrap_err().is_bad_request());
}

#[test]
fn get_applies_selectors() {
    let store = store();
    seed(&store, vec![Widget::new("a", 5).with_label("tier", "gold")]);
    let mismatch = GetOptions {
        label_selector: vec![Requirement::equals("tier", "silver").unwrap()],
        ..GetOptions::default()
    };
    assert!(store.get::<Widget>(&[], "a", &mismatch).unwrap_err().is_not_found());

    let matching = GetOptions {
        field_selector: vec![Requirement::new("value", Operator::GreaterThanOrEqual, ["5"]).unwrap()],
        ..GetOptions::default()
    };
    assert_eq!(store.get::<Widget>(&[], "a", &matching).unwrap().value, 5);
}

// ── Scopes ───────────────────────────────────────────────────────

#[test]
fn scopes_isolate_objects() {
    let store = store();
    let apollo = [Scope::new("project", "apollo")];
    let gemini = [Scope::new("project", "gemini")];

    store.create(&apollo, &mut Widget::new("w", 1)).unwrap();
    store.create(&gemini, &mut Widget::new("w", 2)).unwrap();

    assert_eq!(get(&store, &apollo, "w").unwrap().value, 1);
    assert_eq!(get(&store, &gemini, "w").unwrap().value, 2);

    store.delete::<Widget>(&apollo, "w", &DeleteOptions::default()).unwrap();
    assert!(get(&store, &apollo, "w").unwrap_err().is_not_found());
    assert_eq!(get(&store, &gemini, "w").unwrap().value, 2);
}

#[test]
fn scoped_handle_delegates() {
    let store = store();
    let apollo = store.scope("project", "apollo");
    apollo.create(&mut Widget::new("w", 1)).unwrap();

    let list = apollo.list::<Widget>(&ListOptions::default()).unwrap();
    assert_eq!(list.names(), vec!["w"]);
    assert_eq!(store.scope("project", "gemini").count::<Widget>(&ListOptions::default()).unwrap(), 0);
    assert!(apollo.get::<Widget>("w").is_ok());
}

#[test]
fn missing_parent_scope_is_not_found() {
    let store = store();
    let err = store
        .create(&[Scope::new("project", "ghost")], &mut Widget::new("w", 1))
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[test]
fn scope_colliding_with_field_is_rejected() {
    let store = store();
    let err = store
        .create(&[Scope::new("value", "x")], &mut Widget::new("w", 1))
        .unwrap_err();
    assert!(err.is_bad_request());
}

// ── Update ───────────────────────────────────────────────────────

#[test]
fn update_spec_mode_leaves_status() {
    let store = store();
    seed(&store, vec![Widget::new("a", 1)]);

    let mut changed = get(&store, &[], "a").unwrap();
    changed.value = 2;
    changed.status.insert("phase".into(), json!("Ready"));
    store.update(&[], &changed, WriteMode::Spec, &UpdateOptions::default()).unwrap();

    let stored = get(&store, &[], "a").unwrap();
    assert_eq!(stored.value, 2);
    assert!(stored.status.is_empty());
}

#[test]
fn update_status_mode_touches_only_status_fields() {
    let store = store();
    seed(&store, vec![Widget::new("a", 1)]);

    let mut changed = get(&store, &[], "a").unwrap();
    changed.value = 2;
    changed.status.insert("phase".into(), json!("Ready"));
    changed.meta.labels.insert("app".into(), "web".into());
    store
        .update(&[], &changed, WriteMode::Status, &UpdateOptions::default())
        .unwrap();

    let stored = get(&store, &[], "a").unwrap();
    assert_eq!(stored.value, 1);
    assert_eq!(stored.status["phase"], json!("Ready"));
    assert_eq!(stored.labels()["app"], "web");
}

#[test]
fn update_never_rewrites_creation_timestamp() {
    let store = store();
    seed(&store, vec![Widget::new("a", 1)]);
    let original = get(&store, &[], "a").unwrap();

    let mut changed = original.clone();
    changed.meta.creation_timestamp = None;
    store.update(&[], &changed, WriteMode::Spec, &UpdateOptions::default()).unwrap();
    assert_eq!(get(&store, &[], "a").unwrap().creation_timestamp(), original.creation_timestamp());
}

#[test]
fn update_missing_is_not_found() {
    let store = store();
    let err = store
        .update(&[], &Widget::new("ghost", 1), WriteMode::Spec, &UpdateOptions::default())
        .unwrap_err();
    assert!(err.is_not_found());
}

// ── Delete ───────────────────────────────────────────────────────

#[test]
fn delete_missing_is_not_found() {
    let store = store();
    let err = store.delete::<Widget>(&[], "missing", &DeleteOptions::default()).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), r#"widgets "missing" not found"#);
}

#[test]
fn delete_respects_selectors() {
    let store = store();
    seed(&store, vec![Widget::new("a", 1)]);
    let options = DeleteOptions {
        field_selector: vec![Requirement::equals("value", "2").unwrap()],
        ..DeleteOptions::default()
    };
    assert!(store.delete::<Widget>(&[], "a", &options).unwrap_err().is_not_found());
    store.delete::<Widget>(&[], "a", &DeleteOptions::default()).unwrap();
}

// ── List & count ─────────────────────────────────────────────────

#[test]
fn search_matches_name_substring() {
    let store = store();
    seed(&store, vec![Widget::new("cat", 1), Widget::new("dog", 2)]);

    let list = store
        .list::<Widget>(&[], &ListOptions::default().with_search("a", ["name"]))
        .unwrap();
    assert_eq!(list.names(), vec!["cat"]);
    assert_eq!(list.total, 1);
    assert_eq!(list.resource, "widgets");

    // default search field is the name
    let list = store
        .list::<Widget>(&[], &ListOptions::default().with_search("og", Vec::<String>::new()))
        .unwrap();
    assert_eq!(list.names(), vec!["dog"]);
}

#[test]
fn search_escapes_like_wildcards() {
    let store = store();
    seed(&store, vec![Widget::new("50%off", 1), Widget::new("500", 2)]);
    let list = store
        .list::<Widget>(&[], &ListOptions::default().with_search("0%", ["name"]))
        .unwrap();
    assert_eq!(list.names(), vec!["50%off"]);
}

#[test]
fn list_sorts_with_name_tiebreaker() {
    let store = store();
    seed(&store, vec![Widget::new("b", 1), Widget::new("c", 2), Widget::new("a", 2)]);

    let list = store
        .list::<Widget>(&[], &ListOptions::default().with_sort(SortField::desc("value")))
        .unwrap();
    assert_eq!(list.names(), vec!["a", "c", "b"]);

    let list = store.list::<Widget>(&[], &ListOptions::default()).unwrap();
    assert_eq!(list.names(), vec!["a", "b", "c"]);
}

#[test]
fn list_rejects_unknown_sort_field() {
    let store = store();
    let err = store
        .list::<Widget>(&[], &ListOptions::default().with_sort(SortField::asc("colour")))
        .unwrap_err();
    assert!(err.is_bad_request());
}

#[test]
fn field_selectors() {
    let store = store();
    seed(&store, (1..=5).map(|i| Widget::new(&format!("w{i}"), i)).collect());

    let over_three = ListOptions::default()
        .with_field_selector(Requirement::new("value", Operator::GreaterThan, ["3"]).unwrap());
    assert_eq!(store.list::<Widget>(&[], &over_three).unwrap().names(), vec!["w4", "w5"]);

    let picked = ListOptions::default().with_field_selector(Requirement::in_values("name", ["w1", "w3"]).unwrap());
    assert_eq!(store.count::<Widget>(&[], &picked).unwrap(), 2);

    let not_two = ListOptions::default().with_field_selector(Requirement::not_equals("value", "2").unwrap());
    assert_eq!(store.count::<Widget>(&[], &not_two).unwrap(), 4);
}

#[test]
fn field_selector_values_are_typed() {
    let store = store();
    let bad = ListOptions::default().with_field_selector(Requirement::equals("value", "three").unwrap());
    assert!(store.list::<Widget>(&[], &bad).unwrap_err().is_bad_request());

    let json = ListOptions::default().with_field_selector(Requirement::equals("spec", "x").unwrap());
    assert!(store.list::<Widget>(&[], &json).unwrap_err().is_bad_request());

    let exists = ListOptions::default().with_field_selector(Requirement::exists("spec").unwrap());
    assert!(store.list::<Widget>(&[], &exists).is_ok());
}

#[test]
fn label_selectors() {
    let store = store();
    seed(
        &store,
        vec![
            Widget::new("a", 1).with_label("tier", "gold").with_label("rank", "10"),
            Widget::new("b", 2).with_label("tier", "silver").with_label("rank", "9"),
            Widget::new("c", 3),
        ],
    );

    let gold = ListOptions::default().with_label_selector(Requirement::equals("tier", "gold").unwrap());
    assert_eq!(store.list::<Widget>(&[], &gold).unwrap().names(), vec!["a"]);

    // rows without the label match "!="
    let not_gold = ListOptions::default().with_label_selector(Requirement::not_equals("tier", "gold").unwrap());
    assert_eq!(store.list::<Widget>(&[], &not_gold).unwrap().names(), vec!["b", "c"]);

    let unlabeled = ListOptions::default().with_label_selector(Requirement::does_not_exist("tier").unwrap());
    assert_eq!(store.list::<Widget>(&[], &unlabeled).unwrap().names(), vec!["c"]);

    // numeric, not lexicographic: "10" > "9"
    let high = ListOptions::default()
        .with_label_selector(Requirement::new("rank", Operator::GreaterThan, ["9.5"]).unwrap());
    assert_eq!(store.list::<Widget>(&[], &high).unwrap().names(), vec!["a"]);

    let like = ListOptions::default().with_label_selector(Requirement::new("tier", Operator::Like, ["ilv"]).unwrap());
    assert_eq!(store.list::<Widget>(&[], &like).unwrap().names(), vec!["b"]);
}

#[test]
fn unpaginated_list_reports_size_zero() {
    let store = store();
    seed(&store, vec![Widget::new("a", 1), Widget::new("b", 1)]);
    let list = store.list::<Widget>(&[], &ListOptions::default()).unwrap();
    assert_eq!((list.total, list.page, list.size, list.len()), (2, 0, 0, 2));
}

#[test]
fn page_zero_is_clamped_to_first_page() {
    let store = store();
    seed(&store, vec![Widget::new("a", 1), Widget::new("b", 1), Widget::new("c", 1)]);
    let list = store.list::<Widget>(&[], &ListOptions::paged(0, 2)).unwrap();
    assert_eq!(list.page, 1);
    assert_eq!(list.names(), vec!["a", "b"]);
    assert_eq!(list.total, 3);
}

#[test]
fn huge_page_numbers_serve_an_empty_page() {
    let store = store();
    seed(&store, vec![Widget::new("a", 1), Widget::new("b", 1)]);
    for options in [ListOptions::paged(u64::MAX, 10), ListOptions::paged(3, u64::MAX)] {
        let list = store.list::<Widget>(&[], &options).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.total, 2);
    }
    let list = store.list::<Widget>(&[], &ListOptions::paged(1, u64::MAX)).unwrap();
    assert_eq!(list.names(), vec!["a", "b"]);
}

#[test]
fn repeated_projection_keys_select_once() {
    let store = store();
    seed(&store, vec![Widget::new("a", 5).with_spec("image", json!("nginx"))]);
    let len = Widget::schema().len();
    let options = GetOptions {
        fields: vec!["name".to_string(); len],
        ..GetOptions::default()
    };
    let partial: Widget = store.get(&[], "a", &options).unwrap();
    assert_eq!(partial.name(), "a");
    assert_eq!(partial.value, 0);
    assert!(partial.spec.is_empty());

    let list = store
        .list::<Widget>(
            &[],
            &ListOptions {
                fields: vec!["value".into(), "name".into(), "value".into()],
                ..ListOptions::default()
            },
        )
        .unwrap();
    assert_eq!(list.items[0].value, 5);
}

#[test]
fn watch_is_unsupported() {
    let store = store();
    let err = store.watch::<Widget>(&[], &ListOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::Unsupported(_)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pages_cover_every_row_once(n in 0usize..24, size in 1u64..8) {
        let store = store();
        seed(&store, (0..n).map(|i| Widget::new(&format!("w{i:02}"), i as i64)).collect());

        let pages = (n as u64).div_ceil(size);
        let mut seen = Vec::new();
        for page in 1..=pages {
            let list = store.list::<Widget>(&[], &ListOptions::paged(page, size)).unwrap();
            prop_assert_eq!(list.total, n as u64);
            prop_assert!(list.len() as u64 <= size);
            seen.extend(list.items.into_iter().map(|w| w.meta.name));
        }
        prop_assert_eq!(seen.len(), n);
        let mut unique = seen.clone();
        unique.dedup();
        prop_assert_eq!(unique.len(), n);
    }
}

// ── Bootstrap ────────────────────────────────────────────────────

#[test]
fn open_on_disk_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig::sqlite(dir.path().join("data/objects.db").to_string_lossy());

    let store = Store::open(&config, registry()).unwrap();
    for statement in WIDGETS_DDL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        store.executor().execute(statement, &[]).unwrap();
    }
    store.create(&[], &mut Widget::new("persisted", 7)).unwrap();
    drop(store);

    let store = Store::open(&config, registry()).unwrap();
    assert_eq!(get(&store, &[], "persisted").unwrap().value, 7);
}

#[test]
fn open_rejects_server_dialects_without_executor() {
    let config = DatabaseConfig::server(DialectKind::Postgres, "localhost:5432", "objects");
    assert!(matches!(Store::open(&config, registry()), Err(StoreError::Unsupported(_))));
}
