#![forbid(unsafe_code)]

use cs_storage::{
    ConflictFilter, ConflictReason, CreateVersionRequest, DiffKind, EntityKey, EntityWrite,
    SqliteStore, StoreConfig, StoreError, VersionRow,
};
use serde_json::{Value, json};

struct Fork {
    store: SqliteStore,
    a: VersionRow,
    b: VersionRow,
    change_a: String,
    change_b: String,
}

fn doc(value: &str) -> EntityWrite {
    EntityWrite::new("k", "doc", "doc.json", "json", Some(json!({ "v": value })))
}

fn doc_key() -> EntityKey {
    EntityKey::new("k", "doc", "doc.json")
}

fn write(store: &mut SqliteStore, version: &VersionRow, entity: EntityWrite) -> String {
    store
        .write_entity(&version.id, entity)
        .expect("write entity")
        .expect("tracked change")
}

/// `main` commits `k = base`; `a` and `b` branch from it and each commit
/// their own value for `k`.
fn fork() -> Fork {
    let mut store = SqliteStore::open_in_memory(StoreConfig::deterministic(1)).expect("open store");
    let main = store.active_version().expect("active version");
    write(&mut store, &main, doc("base"));
    store.checkpoint(&main.id).expect("checkpoint main");

    let a = store
        .create_version(CreateVersionRequest::named("a"))
        .expect("create a");
    let b = store
        .create_version(CreateVersionRequest::named("b"))
        .expect("create b");
    let change_a = write(&mut store, &a, doc("A-val"));
    let change_b = write(&mut store, &b, doc("B-val"));
    let a = store.checkpoint(&a.id).expect("checkpoint a");
    let b = store.checkpoint(&b.id).expect("checkpoint b");
    Fork {
        store,
        a,
        b,
        change_a,
        change_b,
    }
}

fn visible(store: &mut SqliteStore, version: &VersionRow) -> Option<Value> {
    store
        .state(&version.id, &doc_key())
        .expect("state")
        .map(|row| row.snapshot_content)
}

#[test]
fn diverging_versions_diff_and_conflict_once() {
    let Fork {
        mut store,
        a,
        b,
        change_a,
        change_b,
    } = fork();

    let diff = store.diff(&a.id, &b.id).expect("diff");
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].key, doc_key());
    assert_eq!(diff[0].kind, DiffKind::Modified);
    assert_eq!(diff[0].source_change_id.as_deref(), Some(change_a.as_str()));
    assert_eq!(diff[0].target_change_id.as_deref(), Some(change_b.as_str()));

    let conflicts = store.detect_conflicts(&a.id, &b.id).expect("detect");
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].change_id, change_a);
    assert_eq!(conflicts[0].conflicting_change_id, change_b);
    assert_eq!(conflicts[0].reason, ConflictReason::DivergentChange);
    assert!(!conflicts[0].is_resolved());

    // Detection is idempotent in either direction.
    let again = store.detect_conflicts(&b.id, &a.id).expect("detect again");
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].id, conflicts[0].id);
    assert_eq!(
        store
            .list_conflicts(&ConflictFilter::default())
            .expect("list")
            .len(),
        1
    );
}

#[test]
fn resolving_to_b_shows_b_and_hides_a() {
    let Fork {
        mut store,
        a,
        b,
        change_a,
        change_b,
    } = fork();
    let conflict = store.detect_conflicts(&a.id, &b.id).expect("detect").remove(0);

    let resolved = store
        .resolve_conflict(&conflict.id, &change_b)
        .expect("resolve");
    assert_eq!(resolved.resolved_with_change_id.as_deref(), Some(change_b.as_str()));

    let simulated = store.simulate_merge(&a.id, &b.id).expect("simulate");
    let ids: Vec<_> = simulated.iter().map(|change| change.id.as_str()).collect();
    assert!(ids.contains(&change_b.as_str()));
    assert!(!ids.contains(&change_a.as_str()));

    store.merge_version(&a.id, &b.id).expect("merge");
    assert_eq!(visible(&mut store, &b), Some(json!({ "v": "B-val" })));

    let err = store
        .resolve_conflict(&conflict.id, &change_a)
        .expect_err("already resolved");
    assert!(matches!(err, StoreError::ConflictAlreadyResolved));
}

#[test]
fn resolution_must_pick_a_side() {
    let Fork {
        mut store, a, b, ..
    } = fork();
    let conflict = store.detect_conflicts(&a.id, &b.id).expect("detect").remove(0);
    let err = store
        .resolve_conflict(&conflict.id, "some-other-change")
        .expect_err("not a side");
    assert!(matches!(err, StoreError::InvalidInput(_)));
    assert!(matches!(
        store.conflict("no-such-conflict").expect_err("unknown"),
        StoreError::UnknownConflict
    ));
}

#[test]
fn merge_is_blocked_until_conflicts_are_resolved() {
    let Fork {
        mut store,
        a,
        b,
        change_a,
        ..
    } = fork();

    let err = store.merge_version(&a.id, &b.id).expect_err("blocked");
    let conflicts = match err {
        StoreError::MergeBlocked { conflicts } => conflicts,
        other => panic!("expected MergeBlocked, got {other:?}"),
    };
    assert_eq!(conflicts.len(), 1);
    assert_eq!(visible(&mut store, &b), Some(json!({ "v": "B-val" })));

    let pending = store
        .list_conflicts(&ConflictFilter {
            unresolved_only: true,
            change_id: None,
        })
        .expect("list unresolved");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, conflicts[0]);

    store
        .resolve_conflict(&conflicts[0], &change_a)
        .expect("resolve to a");
    let summary = store.merge_version(&a.id, &b.id).expect("merge");
    assert_eq!(summary.resolved_conflicts, 1);
    let merge_commit_id = summary.merge_commit_id.expect("merge commit");

    let merge_commit = store.commit(&merge_commit_id).expect("commit");
    assert_eq!(merge_commit.labels, vec!["merge".to_string()]);
    let mut parents = vec![a.commit_id.clone(), b.commit_id.clone()];
    parents.sort();
    assert_eq!(merge_commit.parent_ids, parents);

    let b = store.version(&b.id).expect("reload b");
    assert_eq!(b.commit_id, merge_commit_id);
    assert_eq!(visible(&mut store, &b), Some(json!({ "v": "A-val" })));
    assert!(store.verify_cache(&b.id).expect("verify").is_consistent());

    // Nothing new to bring over the second time.
    let repeat = store.merge_version(&a.id, &b.id).expect("repeat merge");
    assert_eq!(repeat.merge_commit_id, None);
}

#[test]
fn one_sided_changes_merge_cleanly() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let main = store.active_version().expect("active version");
    write(&mut store, &main, doc("base"));
    store.checkpoint(&main.id).expect("checkpoint main");
    let feature = store
        .create_version(CreateVersionRequest::named("feature"))
        .expect("create feature");

    write(
        &mut store,
        &feature,
        EntityWrite::new("extra", "doc", "doc.json", "json", Some(json!({ "v": "new" }))),
    );
    store.checkpoint(&feature.id).expect("checkpoint feature");

    let summary = store.merge_version(&feature.id, &main.id).expect("merge");
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.resolved_conflicts, 0);

    let rows = store.state_all(&main.id).expect("state all");
    let ids: Vec<_> = rows.iter().map(|row| row.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["extra", "k"]);
}

/// `main` holds `k = base`; `child` inherits from `main` and has a warm cache.
fn main_with_child(store: &mut SqliteStore) -> (VersionRow, VersionRow) {
    let main = store.active_version().expect("active version");
    write(store, &main, doc("base"));
    let main = store.checkpoint(&main.id).expect("checkpoint main");
    let child = store
        .create_version(CreateVersionRequest {
            inherits_from_version_id: Some(main.id.clone()),
            ..CreateVersionRequest::named("child")
        })
        .expect("create child");
    assert_eq!(store.state_all(&child.id).expect("warm child").len(), 1);
    (main, child)
}

fn entity_ids(store: &mut SqliteStore, version: &VersionRow) -> Vec<String> {
    store
        .state_all(&version.id)
        .expect("state all")
        .into_iter()
        .map(|row| row.entity_id)
        .collect()
}

#[test]
fn merging_into_a_parent_refreshes_its_inheritors() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let (main, child) = main_with_child(&mut store);
    let feature = store
        .create_version(CreateVersionRequest {
            from_version_id: Some(main.id.clone()),
            ..CreateVersionRequest::named("feature")
        })
        .expect("create feature");
    write(
        &mut store,
        &feature,
        EntityWrite::new("extra", "doc", "doc.json", "json", Some(json!({ "v": "new" }))),
    );
    store.checkpoint(&feature.id).expect("checkpoint feature");
    assert_eq!(entity_ids(&mut store, &feature), vec!["extra", "k"]);

    store.merge_version(&feature.id, &main.id).expect("merge");
    assert_eq!(entity_ids(&mut store, &main), vec!["extra", "k"]);
    assert_eq!(entity_ids(&mut store, &child), vec!["extra", "k"]);
    for version in [&main, &child, &feature] {
        assert!(store.verify_cache(&version.id).expect("verify").is_consistent());
    }
}

#[test]
fn restore_leaves_consistent_caches_behind() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let (main, child) = main_with_child(&mut store);
    write(
        &mut store,
        &main,
        EntityWrite::new("later", "doc", "doc.json", "json", Some(json!({ "v": "x" }))),
    );
    store.checkpoint(&main.id).expect("checkpoint later");
    assert_eq!(entity_ids(&mut store, &child), vec!["k", "later"]);

    store.restore(&main.id, &main.commit_id).expect("restore");
    assert_eq!(entity_ids(&mut store, &main), vec!["k"]);
    assert_eq!(entity_ids(&mut store, &child), vec!["k"]);
    for version in [&main, &child] {
        assert!(store.verify_cache(&version.id).expect("verify").is_consistent());
    }

    let before: Vec<_> = store.state_all(&child.id).expect("cached");
    store.rebuild_cache().expect("rebuild");
    assert_eq!(store.state_all(&child.id).expect("fresh"), before);
}

#[test]
fn delete_against_modify_is_its_own_reason() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let main = store.active_version().expect("active version");
    write(&mut store, &main, doc("base"));
    store.checkpoint(&main.id).expect("checkpoint main");
    let left = store
        .create_version(CreateVersionRequest::named("left"))
        .expect("create left");
    let right = store
        .create_version(CreateVersionRequest::named("right"))
        .expect("create right");

    write(
        &mut store,
        &left,
        EntityWrite::new("k", "doc", "doc.json", "json", None),
    );
    write(&mut store, &right, doc("edited"));
    store.checkpoint(&left.id).expect("checkpoint left");
    store.checkpoint(&right.id).expect("checkpoint right");

    let conflicts = store.detect_conflicts(&left.id, &right.id).expect("detect");
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].reason, ConflictReason::DeleteModify);
}

#[test]
fn merging_a_version_into_itself_is_rejected() {
    let mut store = SqliteStore::open_in_memory(StoreConfig::default()).expect("open store");
    let main = store.active_version().expect("active version");
    let err = store.merge_version(&main.id, &main.id).expect_err("self merge");
    assert!(matches!(err, StoreError::InvalidInput(_)));
}
