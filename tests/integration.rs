//! Integration tests for the document store.

use pathkv::{Database, DatabaseConfig, StorageMode};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;

fn test_db(dir: &TempDir) -> Database {
    Database::open(DatabaseConfig::default().with_data_dir(dir.path())).unwrap()
}

// --- Whole-Record Operations ---

#[test]
fn test_set_then_get_roundtrip() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    let value = json!({"name": "Ann", "tags": ["a", "b"], "meta": {"age": 30, "ok": true}});
    db.set("user-1", value.clone()).unwrap();
    assert_eq!(db.get("user-1").unwrap(), value);
}

#[test]
fn test_delete_then_absent() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("user-1", json!({"name": "Ann"})).unwrap();
    db.delete("user-1").unwrap();

    assert!(!db.has("user-1").unwrap());
    assert_eq!(db.get("user-1").unwrap(), json!({}));
}

#[test]
fn test_delete_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("a", 1).unwrap();
    db.set("b", 2).unwrap();
    db.delete("a").unwrap();
    let once = db.all().unwrap();
    db.delete("a").unwrap();

    assert_eq!(db.all().unwrap(), once);
    assert!(!db.has("a").unwrap());
}

#[test]
fn test_all_empty_and_populated() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    assert!(db.all().unwrap().is_empty());

    db.set("a", json!({"n": 1})).unwrap();
    db.set("b", json!([2])).unwrap();
    db.set("c", "three").unwrap();

    let mut all: Vec<String> = db.all().unwrap().iter().map(Value::to_string).collect();
    all.sort();
    assert_eq!(all, vec!["\"three\"", "[2]", r#"{"n":1}"#]);
    assert_eq!(db.array().unwrap(), db.all().unwrap());
}

#[test]
fn test_has_is_existence_not_truthiness() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("zero", 0).unwrap();
    db.set("empty", json!({})).unwrap();
    db.set("null", Value::Null).unwrap();

    assert!(db.has("zero").unwrap());
    assert!(db.has("empty").unwrap());
    assert!(db.has("null").unwrap());
    assert!(!db.has("never").unwrap());
}

#[test]
fn test_reopen_persists() {
    let dir = TempDir::new().unwrap();
    {
        let db = test_db(&dir);
        assert_eq!(db.storage(), &StorageMode::File(dir.path().join("simpledb.sqlite")));
        db.set("user-1", json!({"name": "Ann"})).unwrap();
        db.close().unwrap();
    }

    let db = test_db(&dir);
    assert_eq!(db.get_at("user-1", "name").unwrap(), Some(json!("Ann")));
}

#[test]
fn test_tables_are_isolated_by_name() {
    let dir = TempDir::new().unwrap();
    let users = Database::open(
        DatabaseConfig::default()
            .with_data_dir(dir.path())
            .with_name("users"),
    )
    .unwrap();
    let posts = Database::open(
        DatabaseConfig::default()
            .with_data_dir(dir.path())
            .with_name("posts"),
    )
    .unwrap();

    users.set("1", "ann").unwrap();
    assert!(!posts.has("1").unwrap());
    assert_eq!(posts.all().unwrap(), Vec::<Value>::new());
    assert_eq!(users.name(), "users");
}

// --- Path Operations ---

#[test]
fn test_path_set_keeps_siblings() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("k", json!({"a": {"c": 1}, "z": true})).unwrap();
    assert!(db.set_at("k", "a.b", json!({"deep": [1]})).unwrap());

    assert_eq!(db.get_at("k", "a.b").unwrap(), Some(json!({"deep": [1]})));
    assert_eq!(
        db.get("k").unwrap(),
        json!({"a": {"c": 1, "b": {"deep": [1]}}, "z": true})
    );
}

#[test]
fn test_path_set_requires_existing_record() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    assert!(!db.set_at("ghost", "a.b", 1).unwrap());
    assert!(!db.has("ghost").unwrap());
    assert!(db.all().unwrap().is_empty());
}

#[test]
fn test_path_get_missing() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("k", json!({"a": {"b": [1, 2]}})).unwrap();
    assert_eq!(db.get_at("k", "a.b[1]").unwrap(), Some(json!(2)));
    assert_eq!(db.get_at("k", "a.b[7]").unwrap(), None);
    assert_eq!(db.get_at("k", "x.y.z").unwrap(), None);
    assert_eq!(db.get_at("ghost", "a").unwrap(), None);
}

#[test]
fn test_path_delete_keeps_row() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("k", json!({"only": 1})).unwrap();
    db.delete_at("k", "only").unwrap();

    assert!(db.has("k").unwrap());
    assert_eq!(db.fetch("k").unwrap(), Some(json!({})));
    assert_eq!(db.all().unwrap(), vec![json!({})]);
}

#[test]
fn test_path_delete_array_slot() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("k", json!({"list": ["a", "b", "c"], "n": 1})).unwrap();
    db.delete_at("k", "list[1]").unwrap();
    assert_eq!(db.get("k").unwrap(), json!({"list": ["a", null, "c"], "n": 1}));
}

#[test]
fn test_path_delete_missing_record_is_noop() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.delete_at("ghost", "a").unwrap();
    assert!(!db.has("ghost").unwrap());
}

// --- Ensure ---

#[test]
fn test_ensure_merges_not_overwrites() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.ensure("k", json!({"a": 1})).unwrap();
    db.ensure("k", json!({"b": 2})).unwrap();
    assert_eq!(db.get("k").unwrap(), json!({"a": 1, "b": 2}));
}

#[test]
fn test_ensure_nested_precedence() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("user", json!({"profile": {"name": "Ann", "icon": "old"}, "level": 1}))
        .unwrap();
    db.ensure("user", json!({"profile": {"icon": "new"}, "level": 2}))
        .unwrap();
    assert_eq!(
        db.get("user").unwrap(),
        json!({"profile": {"name": "Ann", "icon": "new"}, "level": 2})
    );
}

#[test]
fn test_ensure_at_path() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("user", json!({"name": "Ann"})).unwrap();
    db.ensure_at("user", "profile", json!({"icon": "https://example.com/a.png"}))
        .unwrap();
    db.ensure_at("user", "profile", json!({"theme": "dark"})).unwrap();

    assert_eq!(
        db.get("user").unwrap(),
        json!({
            "name": "Ann",
            "profile": {"icon": "https://example.com/a.png", "theme": "dark"}
        })
    );
}

#[test]
fn test_ensure_at_creates_record() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.ensure_at("fresh", "settings.sound", json!({"volume": 3})).unwrap();
    assert_eq!(
        db.get("fresh").unwrap(),
        json!({"settings": {"sound": {"volume": 3}}})
    );
}

// --- Push ---

#[test]
fn test_push_scenario() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("user-1", json!({"name": "Ann", "tags": []})).unwrap();
    db.push_at("user-1", "tags", "vip").unwrap();

    assert_eq!(db.get_at("user-1", "tags").unwrap(), Some(json!(["vip"])));
    assert_eq!(db.get_at("user-1", "name").unwrap(), Some(json!("Ann")));
}

#[test]
fn test_push_whole_record_persists_sequence() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("list", json!([1, 2])).unwrap();
    db.push("list", 3).unwrap();
    db.push("list", json!({"four": 4})).unwrap();

    // The appended array is stored, not its new length
    assert_eq!(db.get("list").unwrap(), json!([1, 2, 3, {"four": 4}]));
}

// --- Has ---

#[test]
fn test_has_at_conflates_falsy_with_absent() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set(
        "k",
        json!({"zero": 0, "empty": "", "no": false, "nil": null, "yes": 1, "list": []}),
    )
    .unwrap();

    // Present but falsy: reported as missing
    assert!(!db.has_at("k", "zero").unwrap());
    assert!(!db.has_at("k", "empty").unwrap());
    assert!(!db.has_at("k", "no").unwrap());
    assert!(!db.has_at("k", "nil").unwrap());

    assert!(db.has_at("k", "yes").unwrap());
    assert!(db.has_at("k", "list").unwrap());
    assert!(!db.has_at("k", "missing").unwrap());

    // Existence check sees through falsy values
    assert!(db.contains_at("k", "zero").unwrap());
    assert!(db.contains_at("k", "empty").unwrap());
    assert!(db.contains_at("k", "no").unwrap());
    assert!(db.contains_at("k", "nil").unwrap());
    assert!(!db.contains_at("k", "missing").unwrap());
}

// --- Update ---

#[test]
fn test_update_only_existing() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    assert!(!db.update("k", json!({"a": 1})).unwrap());
    assert!(!db.has("k").unwrap());

    db.set("k", json!({"a": 1})).unwrap();
    assert!(db.update("k", json!({"b": 2})).unwrap());
    assert_eq!(db.get("k").unwrap(), json!({"b": 2}));
}

#[test]
fn test_update_at_only_existing_path() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set("k", json!({"a": {"b": 0}})).unwrap();
    assert!(!db.update_at("k", "a.c", 1).unwrap());
    assert!(db.update_at("k", "a.b", 1).unwrap());
    assert!(!db.update_at("ghost", "a", 1).unwrap());
    assert_eq!(db.get("k").unwrap(), json!({"a": {"b": 1}}));
}

// --- Expiration ---

#[test]
fn test_expired_record_is_evicted() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set_with_ttl("session", json!({"token": "t"}), Duration::ZERO)
        .unwrap();
    db.set("keep", 1).unwrap();

    assert!(!db.has("session").unwrap());
    assert_eq!(db.get("session").unwrap(), json!({}));
    assert_eq!(db.all().unwrap(), vec![json!(1)]);
    assert!(!db.set_at("session", "token", "u").unwrap());
}

#[test]
fn test_path_writes_keep_expiry() {
    let dir = TempDir::new().unwrap();
    let db = test_db(&dir);

    db.set_with_ttl("session", json!({"hits": []}), Duration::from_secs(3600))
        .unwrap();
    let deadline = db.expires_at("session").unwrap();
    assert!(deadline.is_some());

    db.push_at("session", "hits", 1).unwrap();
    db.ensure("session", json!({"user": "ann"})).unwrap();
    db.set_at("session", "user", "bob").unwrap();
    assert_eq!(db.expires_at("session").unwrap(), deadline);

    // A whole-record set clears the deadline
    db.set("session", json!({})).unwrap();
    assert_eq!(db.expires_at("session").unwrap(), None);
}

// --- Properties ---

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z0-9 ]{0,12}".prop_map(Value::String),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_set_get_roundtrip(key in "[a-zA-Z0-9:_-]{1,16}", value in json_value()) {
        let db = Database::open_in_memory("sql").unwrap();
        db.set(&key, value.clone()).unwrap();
        prop_assert_eq!(db.get(&key).unwrap(), value);
        prop_assert!(db.has(&key).unwrap());
    }

    #[test]
    fn prop_path_set_then_get(field in "[a-z]{1,6}", sibling in json_value(), value in json_value()) {
        let db = Database::open_in_memory("sql").unwrap();
        db.set("k", json!({"sibling": sibling.clone()})).unwrap();
        let path = format!("a.{field}");
        prop_assert!(db.set_at("k", &path, value.clone()).unwrap());
        prop_assert_eq!(db.get_at("k", &path).unwrap(), Some(value));
        prop_assert_eq!(db.get_at("k", "sibling").unwrap(), Some(sibling));
    }
}
