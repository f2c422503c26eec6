#![forbid(unsafe_code)]

use cs_storage::{
    CreateVersionRequest, EntityKey, EntityWrite, GLOBAL_VERSION_ID, SqliteStore, StoreConfig,
    StoreError,
};
use rusqlite::types::Value as SqlValue;
use serde_json::json;

fn open_store() -> SqliteStore {
    SqliteStore::open_in_memory(StoreConfig::deterministic(42)).expect("open store")
}

fn note(entity_id: &str, value: &str) -> EntityWrite {
    EntityWrite::new(
        entity_id,
        "note",
        "notes.json",
        "json",
        Some(json!({ "text": value })),
    )
}

fn note_key(entity_id: &str) -> EntityKey {
    EntityKey::new(entity_id, "note", "notes.json")
}

fn kv_key(key: &str) -> EntityKey {
    EntityKey::new(key, "key_value", "lix")
}

#[test]
fn cached_state_matches_a_fresh_walk() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");

    store.write_entity(&main.id, note("a", "one")).expect("write a");
    store.write_entity(&main.id, note("b", "two")).expect("write b");
    store.checkpoint(&main.id).expect("checkpoint");
    store.write_entity(&main.id, note("a", "three")).expect("rewrite a");
    store
        .write_entity(
            &main.id,
            EntityWrite::new("b", "note", "notes.json", "json", None),
        )
        .expect("delete b");

    let rows = store.state_all(&main.id).expect("state all");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].entity_id, "a");
    assert_eq!(rows[0].snapshot_content, json!({ "text": "three" }));

    let report = store.verify_cache(&main.id).expect("verify cache");
    assert!(report.is_consistent(), "mismatches: {:?}", report.mismatches);

    store.rebuild_cache().expect("rebuild cache");
    let rebuilt = store.state_all(&main.id).expect("state all after rebuild");
    assert_eq!(rows, rebuilt);
}

#[test]
fn state_of_a_missing_or_deleted_entity_is_none() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");
    assert!(store.state(&main.id, &note_key("a")).expect("state").is_none());

    store.write_entity(&main.id, note("a", "one")).expect("write");
    store
        .write_entity(
            &main.id,
            EntityWrite::new("a", "note", "notes.json", "json", None),
        )
        .expect("delete");
    assert!(store.state(&main.id, &note_key("a")).expect("state").is_none());
    assert_eq!(store.changes_for_entity(&note_key("a")).expect("changes").len(), 2);
}

#[test]
fn inherited_values_are_tagged_and_overridable() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");

    store
        .write_entity(GLOBAL_VERSION_ID, note("shared", "from global"))
        .expect("write global");
    let inherited = store
        .state(&main.id, &note_key("shared"))
        .expect("state")
        .expect("inherited row");
    assert_eq!(
        inherited.inherited_from_version_id.as_deref(),
        Some(GLOBAL_VERSION_ID)
    );
    assert_eq!(inherited.version_id, main.id);

    store
        .write_entity(&main.id, note("shared", "from main"))
        .expect("override");
    let own = store
        .state(&main.id, &note_key("shared"))
        .expect("state")
        .expect("own row");
    assert_eq!(own.inherited_from_version_id, None);
    assert_eq!(own.snapshot_content, json!({ "text": "from main" }));

    let global = store
        .state(GLOBAL_VERSION_ID, &note_key("shared"))
        .expect("state")
        .expect("global row");
    assert_eq!(global.snapshot_content, json!({ "text": "from global" }));
}

#[test]
fn writes_to_a_parent_reach_materialized_children() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");
    store.state_all(&main.id).expect("materialize main");

    store
        .write_entity(GLOBAL_VERSION_ID, note("late", "v1"))
        .expect("write global");
    let rows = store.state_all(&main.id).expect("state all");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].inherited_from_version_id.as_deref(), Some(GLOBAL_VERSION_ID));

    let report = store.verify_cache(&main.id).expect("verify cache");
    assert!(report.is_consistent(), "mismatches: {:?}", report.mismatches);
}

#[test]
fn untracked_writes_skip_the_change_log() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");

    let mut write = note("draft", "scratch");
    write.untracked = true;
    let change_id = store.write_entity(&main.id, write).expect("untracked write");
    assert!(change_id.is_none());
    assert!(store.changes_for_entity(&note_key("draft")).expect("changes").is_empty());
    assert_eq!(
        store.untracked(&main.id, &note_key("draft")).expect("untracked"),
        Some(json!({ "text": "scratch" }))
    );

    let result = store
        .execute(
            "SELECT entity_id, untracked FROM state WHERE entity_id = 'draft'",
            &[],
        )
        .expect("select");
    assert_eq!(
        result[0].rows,
        vec![vec![
            SqlValue::Text("draft".to_string()),
            SqlValue::Integer(1)
        ]]
    );
}

#[test]
fn key_value_insert_update_delete_records_three_changes() {
    let mut store = open_store();

    store
        .execute("INSERT INTO key_value (key, value) VALUES ('k1', 'v1')", &[])
        .expect("insert");
    let read = store
        .execute("SELECT value FROM key_value WHERE key = ?", &[SqlValue::Text("k1".into())])
        .expect("select");
    assert_eq!(read[0].rows, vec![vec![SqlValue::Text("v1".to_string())]]);

    let updated = store
        .execute("UPDATE key_value SET value = 'v2' WHERE key = 'k1'", &[])
        .expect("update");
    assert_eq!(updated[0].changes, 1);

    store
        .execute("DELETE FROM key_value WHERE key = 'k1'", &[])
        .expect("delete");
    let read = store
        .execute("SELECT value FROM key_value WHERE key = 'k1'", &[])
        .expect("select after delete");
    assert!(read[0].rows.is_empty());

    let changes = store.changes_for_entity(&kv_key("k1")).expect("changes");
    assert_eq!(changes.len(), 3);
    assert_eq!(
        changes[0].snapshot_content,
        Some(json!({ "key": "k1", "value": "v1" }))
    );
    assert_eq!(
        changes[1].snapshot_content,
        Some(json!({ "key": "k1", "value": "v2" }))
    );
    assert!(changes[2].is_tombstone());
    assert!(changes.iter().all(|change| change.metadata.is_none()));
}

#[test]
fn scripts_return_one_result_per_statement() {
    let mut store = open_store();
    let results = store
        .execute(
            "INSERT INTO key_value (key, value) VALUES (?, ?); SELECT key, value FROM key_value;",
            &[SqlValue::Text("a".into()), SqlValue::Text("1".into())],
        )
        .expect("script");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].changes, 1);
    assert_eq!(results[1].columns, vec!["key".to_string(), "value".to_string()]);
    assert_eq!(results[1].rows.len(), 1);
}

#[test]
fn failed_statements_roll_back_the_whole_script() {
    let mut store = open_store();
    let err = store
        .execute(
            "INSERT INTO key_value (key, value) VALUES ('k1', 'v1'); SELECT nope FROM key_value;",
            &[],
        )
        .expect_err("unknown column");
    assert_eq!(err.code(), "UNKNOWN_COLUMN");

    let missing = store
        .execute("INSERT INTO key_value (key, value) VALUES (?, ?)", &[])
        .expect_err("missing params");
    assert!(matches!(missing, StoreError::InvalidInput(_)));
    assert!(store.changes_for_entity(&kv_key("k1")).expect("changes").is_empty());
}

#[test]
fn by_version_views_see_every_version() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");
    let feature = store
        .create_version(CreateVersionRequest::named("feature"))
        .expect("create version");

    store
        .execute(
            "INSERT INTO key_value_by_version (key, value, version_id) VALUES ('k', 'main', ?)",
            &[SqlValue::Text(main.id.clone())],
        )
        .expect("insert main");
    store
        .execute(
            "INSERT INTO key_value_by_version (key, value, version_id) VALUES ('k', 'feature', ?)",
            &[SqlValue::Text(feature.id.clone())],
        )
        .expect("insert feature");

    let rows = store
        .execute(
            "SELECT value FROM key_value_by_version WHERE key = 'k' ORDER BY value",
            &[],
        )
        .expect("select")
        .remove(0)
        .rows;
    assert_eq!(
        rows,
        vec![
            vec![SqlValue::Text("feature".to_string())],
            vec![SqlValue::Text("main".to_string())],
        ]
    );
}
