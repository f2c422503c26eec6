#![forbid(unsafe_code)]

use cs_storage::{
    CreateVersionRequest, EntityKey, EntityWrite, ErrorKind, GLOBAL_VERSION_ID, MAIN_VERSION_NAME,
    SqliteStore, StoreConfig, StoreError,
};
use rusqlite::{Connection, params};
use serde_json::json;
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("cs_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn item(entity_id: &str, value: &str) -> EntityWrite {
    EntityWrite::new(entity_id, "item", "items.json", "json", Some(json!({ "v": value })))
}

fn item_key(entity_id: &str) -> EntityKey {
    EntityKey::new(entity_id, "item", "items.json")
}

#[test]
fn fresh_store_has_global_and_active_main() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let versions = store.list_versions().expect("list versions");
    let names: Vec<_> = versions.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["global", "main"]);

    let main = store.active_version().expect("active version");
    assert_eq!(main.name, MAIN_VERSION_NAME);
    assert_eq!(main.inherits_from_version_id.as_deref(), Some(GLOBAL_VERSION_ID));
    let global = store.version(GLOBAL_VERSION_ID).expect("global");
    assert_eq!(global.inherits_from_version_id, None);
    assert_eq!(global.commit_id, main.commit_id);
}

#[test]
fn checkpoint_requires_pending_changes() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let main = store.active_version().expect("active version");

    let err = store.checkpoint(&main.id).expect_err("empty checkpoint");
    assert!(matches!(err, StoreError::EmptyCheckpoint));
    assert_eq!(err.kind(), ErrorKind::Constraint);
    assert_eq!(store.active_version().expect("active version"), main);
}

#[test]
fn checkpoint_advances_pointers_and_labels_the_commit() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let before = store.active_version().expect("active version");
    store.write_entity(&before.id, item("a", "1")).expect("write");

    let after = store.checkpoint(&before.id).expect("checkpoint");
    assert_eq!(after.commit_id, before.working_commit_id);
    assert_ne!(after.working_commit_id, before.working_commit_id);
    assert_eq!(store.version(&before.id).expect("reload"), after);

    let sealed = store.commit(&after.commit_id).expect("commit");
    assert_eq!(sealed.parent_ids, vec![before.commit_id.clone()]);
    assert_eq!(sealed.labels, vec!["checkpoint".to_string()]);
    assert_eq!(
        store
            .commit_ancestry(&after.commit_id, None)
            .expect("ancestry"),
        vec![after.commit_id.clone(), before.commit_id.clone()]
    );
    assert!(store.commit_changes(&after.working_commit_id).expect("working").is_empty());

    let state = store
        .state(&after.id, &item_key("a"))
        .expect("state")
        .expect("row");
    assert_eq!(state.snapshot_content, json!({ "v": "1" }));
}

#[test]
fn sealed_change_sets_reject_edits() {
    let dir = temp_dir("sealed_change_sets_reject_edits");
    let db_path = dir.join("store.sqlite");
    let mut store = SqliteStore::open(&db_path, StoreConfig::default()).expect("open store");
    let main = store.active_version().expect("active version");
    let change_id = store
        .write_entity(&main.id, item("a", "1"))
        .expect("write")
        .expect("tracked change");
    let sealed = store.checkpoint(&main.id).expect("checkpoint");
    let change_set_id = store.commit(&sealed.commit_id).expect("commit").change_set_id;

    let conn = Connection::open(&db_path).expect("open raw connection");
    let err = conn
        .execute(
            "DELETE FROM change_set_element WHERE change_set_id=?1",
            params![change_set_id],
        )
        .expect_err("delete from sealed set");
    assert!(matches!(StoreError::from(err), StoreError::ImmutableChangeSet));

    let err = conn
        .execute(
            "INSERT INTO change_set_element(change_set_id, change_id, entity_id, schema_key, file_id) \
             VALUES (?1, ?2, 'b', 'item', 'items.json')",
            params![change_set_id, change_id],
        )
        .expect_err("insert into sealed set");
    assert!(matches!(StoreError::from(err), StoreError::ImmutableChangeSet));

    let err = conn
        .execute(
            "UPDATE change_set SET immutable=0 WHERE id=?1",
            params![change_set_id],
        )
        .expect_err("unseal");
    assert!(matches!(StoreError::from(err), StoreError::ImmutableChangeSet));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn restore_rewinds_to_an_earlier_commit() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let main = store.active_version().expect("active version");

    store.write_entity(&main.id, item("a", "1")).expect("write v1");
    let first = store.checkpoint(&main.id).expect("checkpoint 1");
    store.write_entity(&main.id, item("a", "2")).expect("write v2");
    store.write_entity(&main.id, item("b", "x")).expect("write b");
    store.checkpoint(&main.id).expect("checkpoint 2");
    store.write_entity(&main.id, item("c", "pending")).expect("pending");

    let restored = store.restore(&main.id, &first.commit_id).expect("restore");
    assert_eq!(restored.commit_id, first.commit_id);

    let rows = store.state_all(&main.id).expect("state all");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].entity_id, "a");
    assert_eq!(rows[0].snapshot_content, json!({ "v": "1" }));

    // History is kept; only the pointer moved.
    assert_eq!(store.changes_for_entity(&item_key("a")).expect("changes").len(), 2);
}

#[test]
fn restore_rejects_foreign_commits() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let main = store.active_version().expect("active version");
    let side = store
        .create_version(CreateVersionRequest::named("side"))
        .expect("create side");
    store.write_entity(&side.id, item("s", "1")).expect("write side");
    let side = store.checkpoint(&side.id).expect("checkpoint side");

    let err = store
        .restore(&main.id, &side.commit_id)
        .expect_err("foreign commit");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let err = store.restore(&main.id, "missing").expect_err("unknown commit");
    assert!(matches!(err, StoreError::UnknownCommit));
}

#[test]
fn versions_validate_names_and_inheritance() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");

    let feature = store
        .create_version(CreateVersionRequest::named("  feature/x  "))
        .expect("create");
    assert_eq!(feature.name, "feature/x");
    assert_eq!(store.version_by_name("feature/x").expect("by name"), feature);

    let err = store
        .create_version(CreateVersionRequest::named("feature/x"))
        .expect_err("duplicate");
    assert!(matches!(err, StoreError::VersionAlreadyExists));

    let err = store
        .create_version(CreateVersionRequest::named("-bad"))
        .expect_err("bad name");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let err = store
        .create_version(CreateVersionRequest {
            inherits_from_version_id: Some("nope".to_string()),
            ..CreateVersionRequest::named("orphan")
        })
        .expect_err("unknown parent");
    assert!(matches!(err, StoreError::UnknownVersion));
}

#[test]
fn inheritance_depth_is_bounded() {
    let config = StoreConfig {
        max_inheritance_depth: 3,
        ..StoreConfig::default()
    };
    let mut store = SqliteStore::open_in_memory(config).expect("open store");
    let mut parent = GLOBAL_VERSION_ID.to_string();
    for name in ["l1", "l2"] {
        let version = store
            .create_version(CreateVersionRequest {
                inherits_from_version_id: Some(parent.clone()),
                ..CreateVersionRequest::named(name)
            })
            .expect("create level");
        parent = version.id;
    }
    let err = store
        .create_version(CreateVersionRequest {
            inherits_from_version_id: Some(parent),
            ..CreateVersionRequest::named("l3")
        })
        .expect_err("too deep");
    assert!(matches!(err, StoreError::BranchDepthExceeded));
}

#[test]
fn switch_and_delete_versions() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let main = store.active_version().expect("active version");
    let other = store
        .create_version(CreateVersionRequest::named("other"))
        .expect("create");

    store.switch_version(&other.id).expect("switch");
    assert_eq!(store.active_version().expect("active").id, other.id);

    let err = store.delete_version(&other.id).expect_err("active");
    assert!(matches!(err, StoreError::InvalidInput(_)));
    let err = store.delete_version(GLOBAL_VERSION_ID).expect_err("global");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    store.switch_version(&main.id).expect("switch back");
    store.delete_version(&other.id).expect("delete");
    assert!(matches!(
        store.version(&other.id).expect_err("gone"),
        StoreError::UnknownVersion
    ));
}

#[test]
fn failed_transactions_leave_no_trace() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let main = store.active_version().expect("active version");

    let err = store
        .with_transaction(|txn| {
            txn.write_entity(&main.id, item("a", "1"))?;
            txn.create_version(CreateVersionRequest::named("main"))
        })
        .expect_err("duplicate name");
    assert!(matches!(err, StoreError::VersionAlreadyExists));
    assert!(store.changes_for_entity(&item_key("a")).expect("changes").is_empty());
    assert!(store.state(&main.id, &item_key("a")).expect("state").is_none());
}
