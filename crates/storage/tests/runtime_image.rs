#![forbid(unsafe_code)]

use cs_storage::{
    AsyncStore, CreateVersionRequest, EntityKey, EntityWrite, ErrorKind, SqliteStore,
    StoreConfig, StoreDirectory, StoreError,
};
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

fn entry(entity_id: &str, value: i64) -> EntityWrite {
    EntityWrite::new(entity_id, "entry", "log.json", "json", Some(json!({ "n": value })))
}

fn entry_key(entity_id: &str) -> EntityKey {
    EntityKey::new(entity_id, "entry", "log.json")
}

/// Runs the same small workload and returns every generated id/timestamp.
fn workload(store: &mut SqliteStore) -> Vec<String> {
    let main = store.active_version().expect("active version");
    let mut out = vec![main.id.clone(), main.commit_id.clone()];
    out.push(
        store
            .write_entity(&main.id, entry("a", 1))
            .expect("write")
            .expect("change id"),
    );
    let sealed = store.checkpoint(&main.id).expect("checkpoint");
    out.push(sealed.working_commit_id);
    let commit = store.commit(&sealed.commit_id).expect("commit");
    out.push(commit.created_at);
    out.push(store.next_id().expect("next id"));
    out.push(store.now().expect("now"));
    out.push(store.next_random().expect("random").to_string());
    out
}

#[test]
fn deterministic_stores_replay_identically() {
    let mut first = SqliteStore::open_in_memory(StoreConfig::deterministic(7)).expect("open first");
    let mut second =
        SqliteStore::open_in_memory(StoreConfig::deterministic(7)).expect("open second");
    assert!(first.is_deterministic().expect("mode"));
    assert_eq!(workload(&mut first), workload(&mut second));

    let mut other_seed =
        SqliteStore::open_in_memory(StoreConfig::deterministic(8)).expect("open other seed");
    let a = first.next_random().expect("random");
    let b = other_seed.next_random().expect("random");
    assert_ne!(a, b);
}

#[test]
fn deterministic_ids_and_timestamps_are_sequential() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::deterministic(0)).expect("open store");
    let first = store.next_id().expect("id");
    let second = store.next_id().expect("id");
    assert!(first.starts_with("01920000-0000-7000-8000-"));
    assert!(first < second);

    let t1 = store.now().expect("now");
    let t2 = store.now().expect("now");
    assert_eq!(t1.len(), "1970-01-01T00:00:00.000Z".len());
    assert!(t1 < t2);
}

#[test]
fn wall_clock_mode_can_switch_to_deterministic() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    assert!(!store.is_deterministic().expect("mode"));
    let id = store.next_id().expect("id");
    assert_eq!(id.len(), 36);
    assert_ne!(id, store.next_id().expect("id"));

    store.enable_deterministic_mode(3).expect("enable");
    assert!(store.is_deterministic().expect("mode"));
    assert!(store.next_id().expect("id").starts_with("01920000-"));
}

#[test]
fn failed_transactions_do_not_consume_the_sequence() {
    let mut left = SqliteStore::open_in_memory(StoreConfig::deterministic(5)).expect("open left");
    let mut right = SqliteStore::open_in_memory(StoreConfig::deterministic(5)).expect("open right");

    let err = left
        .with_transaction(|txn| {
            txn.next_id()?;
            txn.next_id()?;
            Err::<(), _>(StoreError::InvalidInput("abort"))
        })
        .expect_err("aborted");
    assert!(matches!(err, StoreError::InvalidInput("abort")));
    assert_eq!(
        left.next_id().expect("left id"),
        right.next_id().expect("right id")
    );
}

#[test]
fn images_round_trip_state_and_runtime() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::deterministic(11)).expect("open store");
    let main = store.active_version().expect("active version");
    store.write_entity(&main.id, entry("a", 1)).expect("write a");
    store.checkpoint(&main.id).expect("checkpoint");
    store.write_entity(&main.id, entry("b", 2)).expect("write b");

    let image = store.export_image().expect("export");
    let mut restored = SqliteStore::from_image(&image, StoreConfig::default()).expect("import");

    assert!(restored.is_deterministic().expect("mode survives"));
    assert_eq!(
        restored.state_all(&main.id).expect("restored state"),
        store.state_all(&main.id).expect("original state")
    );
    assert_eq!(
        restored.next_id().expect("restored id"),
        store.next_id().expect("original id")
    );
}

/// Branches, merges and reads back; returns every generated value.
fn branch_and_merge(store: &mut SqliteStore) -> (Vec<String>, Vec<cs_storage::StateRow>) {
    let main = store.active_version().expect("active version");
    let mut out = Vec::new();
    out.extend(store.write_entity(&main.id, entry("b", 2)).expect("write b"));
    out.push(store.checkpoint(&main.id).expect("checkpoint main").commit_id);

    let feature = store
        .create_version(CreateVersionRequest::named("feature"))
        .expect("create feature");
    out.push(feature.id.clone());
    out.extend(store.write_entity(&feature.id, entry("a", 10)).expect("write feature"));
    out.push(store.checkpoint(&feature.id).expect("checkpoint feature").commit_id);

    let summary = store.merge_version(&feature.id, &main.id).expect("merge");
    out.extend(summary.merge_commit_id);
    let merged = store.version(&main.id).expect("main");
    out.push(store.commit(&merged.commit_id).expect("commit").created_at);
    out.push(store.next_id().expect("next id"));
    (out, store.state_all(&main.id).expect("state all"))
}

#[test]
fn warm_and_cold_caches_replay_identically() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::deterministic(21)).expect("open store");
    let main = store.active_version().expect("active version");
    store.write_entity(&main.id, entry("a", 1)).expect("write a");
    store.checkpoint(&main.id).expect("checkpoint");
    store.state_all(&main.id).expect("warm the cache");
    let image = store.export_image().expect("export");

    let mut warm = SqliteStore::from_image(&image, StoreConfig::default()).expect("import warm");
    let mut cold = SqliteStore::from_image(&image, StoreConfig::default()).expect("import cold");
    cold.rebuild_cache().expect("drop cache");

    let (warm_values, warm_state) = branch_and_merge(&mut warm);
    let (cold_values, cold_state) = branch_and_merge(&mut cold);
    assert_eq!(warm_values, cold_values);
    assert_eq!(warm_state, cold_state);
    assert_eq!(warm_state.len(), 2);
    assert_eq!(warm_state[0].snapshot_content, json!({ "n": 10 }));
    assert!(cold.verify_cache(&main.id).expect("verify").is_consistent());
}

#[test]
fn malformed_images_are_rejected() {
    let err = SqliteStore::from_image(b"definitely not sqlite", StoreConfig::default())
        .expect_err("garbage");
    assert!(matches!(err, StoreError::MalformedImage(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut truncated = b"SQLite format 3\0".to_vec();
    truncated.resize(4096, 0xAB);
    let err = SqliteStore::from_image(&truncated, StoreConfig::default()).expect_err("damaged");
    assert!(matches!(err, StoreError::MalformedImage(_)));
}

#[test]
fn directory_creates_saves_and_reopens_stores() {
    let dir = temp_dir("directory_creates_saves_and_reopens_stores");
    let directory = StoreDirectory::new(&dir).expect("directory");

    let mut store = directory
        .create("alpha", StoreConfig::deterministic(2))
        .expect("create");
    let main = store.active_version().expect("active version");
    store.write_entity(&main.id, entry("a", 1)).expect("write");
    directory.save("alpha", &mut store).expect("save");
    directory
        .create("beta", StoreConfig::default())
        .expect("create beta");

    assert_eq!(directory.list().expect("list"), vec!["alpha", "beta"]);
    let err = directory
        .create("alpha", StoreConfig::default())
        .expect_err("duplicate");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let mut reopened = directory
        .open_store("alpha", StoreConfig::default())
        .expect("open");
    let row = reopened
        .state(&main.id, &entry_key("a"))
        .expect("state")
        .expect("row");
    assert_eq!(row.snapshot_content, json!({ "n": 1 }));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn directory_distinguishes_missing_and_corrupt_images() {
    let dir = temp_dir("directory_distinguishes_missing_and_corrupt_images");
    let directory = StoreDirectory::new(&dir).expect("directory");

    let err = directory.fetch_image("ghost").expect_err("missing");
    assert!(matches!(err, StoreError::UnknownStore));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    std::fs::write(dir.join("broken.sqlite"), b"not a database").expect("write junk");
    let err = directory.fetch_image("broken").expect_err("corrupt");
    assert!(matches!(err, StoreError::MalformedImage(_)));

    let err = directory.fetch_image("../escape").expect_err("bad id");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn sync_flag_is_an_untracked_global_key() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    assert!(!store.sync_enabled().expect("default"));

    store.set_sync_enabled(true).expect("enable");
    assert!(store.sync_enabled().expect("enabled"));
    assert!(
        store
            .changes_for_entity(&EntityKey::new(cs_storage::SYNC_KEY, "key_value", "lix"))
            .expect("changes")
            .is_empty()
    );

    store.set_sync_enabled(false).expect("disable");
    assert!(!store.sync_enabled().expect("disabled"));
}

#[test]
fn config_loads_from_yaml() {
    let config = StoreConfig::from_yaml_str(
        "deterministic:\n  seed: 9\nmax_ancestry_depth: 50\n",
    )
    .expect("parse config");
    assert_eq!(config.deterministic.map(|d| d.seed), Some(9));
    assert_eq!(config.max_ancestry_depth, 50);
    assert_eq!(
        config.max_inheritance_depth,
        StoreConfig::default().max_inheritance_depth
    );

    let err = StoreConfig::from_yaml_str("max_ancestry_depth: 0\n").expect_err("zero depth");
    assert_eq!(err.code(), "INVALID_CONFIG");
    let err = StoreConfig::from_yaml_str("unknown_field: 1\n").expect_err("unknown field");
    assert!(matches!(err, StoreError::Config(_)));
}

#[test]
fn async_facade_runs_whole_transactions() {
    pollster::block_on(async {
        let mut store = AsyncStore::open_in_memory(StoreConfig::deterministic(4))
            .await
            .expect("open store");
        let main = store.active_version().await.expect("active version");
        store
            .write_entity(&main.id, entry("a", 1))
            .await
            .expect("write");
        let feature = store
            .create_version(CreateVersionRequest::named("feature"))
            .await
            .expect("create");

        let ids = store
            .transaction(|txn| {
                let first = txn.next_id()?;
                let second = txn.next_id()?;
                Ok(vec![first, second])
            })
            .await
            .expect("transaction");
        assert_eq!(ids.len(), 2);

        let rows = store.state_all(&main.id).await.expect("state all");
        assert_eq!(rows.len(), 1);
        assert!(store.state_all(&feature.id).await.expect("feature").is_empty());
    });
}
