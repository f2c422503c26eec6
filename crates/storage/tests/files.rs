#![forbid(unsafe_code)]

use cs_storage::{
    CreateVersionRequest, DetectedChange, EntityKey, GLOBAL_VERSION_ID, Plugin, PluginEntity,
    PluginError, SqliteStore, StoreConfig, StoreError,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// `key=value` lines; one entity per key.
struct LinesPlugin;

const SCHEMA: &str = "line";

fn parse(data: &[u8]) -> Result<BTreeMap<String, String>, PluginError> {
    let text = std::str::from_utf8(data).map_err(|err| PluginError(err.to_string()))?;
    let mut out = BTreeMap::new();
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| PluginError(format!("missing '=' in {line:?}")))?;
        out.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(out)
}

impl Plugin for LinesPlugin {
    fn key(&self) -> &str {
        "lines"
    }

    fn matches(&self, path: &str) -> bool {
        path.ends_with(".lines")
    }

    fn detect_changes(
        &self,
        before: Option<&[u8]>,
        after: &[u8],
    ) -> Result<Vec<DetectedChange>, PluginError> {
        let before = before.map(parse).transpose()?.unwrap_or_default();
        let after = parse(after)?;
        let mut out = Vec::new();
        for (key, value) in &after {
            if before.get(key) != Some(value) {
                out.push(DetectedChange {
                    entity_id: key.clone(),
                    schema_key: SCHEMA.to_string(),
                    schema_version: "1.0".to_string(),
                    snapshot_content: Some(json!({ "value": value })),
                });
            }
        }
        for key in before.keys().filter(|key| !after.contains_key(*key)) {
            out.push(DetectedChange {
                entity_id: key.clone(),
                schema_key: SCHEMA.to_string(),
                schema_version: "1.0".to_string(),
                snapshot_content: None,
            });
        }
        Ok(out)
    }

    fn apply_changes(&self, entities: &[PluginEntity]) -> Result<Vec<u8>, PluginError> {
        let mut out = String::new();
        for entity in entities {
            let value = entity
                .snapshot_content
                .get("value")
                .and_then(|value| value.as_str())
                .ok_or_else(|| PluginError(format!("entity {} has no value", entity.entity_id)))?;
            out.push_str(&format!("{}={}\n", entity.entity_id, value));
        }
        Ok(out.into_bytes())
    }
}

fn open_store() -> SqliteStore {
    let mut store = SqliteStore::open_in_memory(StoreConfig::deterministic(3)).expect("open store");
    store.register_plugin(Arc::new(LinesPlugin));
    store
}

#[test]
fn writing_a_file_records_one_change_per_entity() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");

    let file = store
        .write_file(&main.id, "/config.lines", b"a=1\nb=2\n")
        .expect("write file");
    assert_eq!(file.plugin_key, "lines");
    assert_eq!(store.list_files().expect("list files"), vec![file.clone()]);

    store
        .write_file(&main.id, "/config.lines", b"a=1\nb=3\n")
        .expect("rewrite file");
    let key_a = EntityKey::new("a", SCHEMA, &file.id);
    let key_b = EntityKey::new("b", SCHEMA, &file.id);
    assert_eq!(store.changes_for_entity(&key_a).expect("changes a").len(), 1);
    assert_eq!(store.changes_for_entity(&key_b).expect("changes b").len(), 2);

    assert_eq!(
        store.read_file(&main.id, "/config.lines").expect("read"),
        b"a=1\nb=3\n".to_vec()
    );
}

#[test]
fn file_bytes_follow_entity_writes_and_history() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");
    let file = store
        .write_file(&main.id, "/notes.lines", b"x=old\n")
        .expect("write file");
    store.checkpoint(&main.id).expect("checkpoint");
    let checkpoint = store.version(&main.id).expect("version").commit_id;

    store
        .execute(
            "UPDATE state SET snapshot_content = json_object('value', 'new') \
             WHERE entity_id = 'x' AND schema_key = 'line'",
            &[],
        )
        .expect("update via sql");
    assert_eq!(
        store.read_file(&main.id, "/notes.lines").expect("read"),
        b"x=new\n".to_vec()
    );

    store.restore(&main.id, &checkpoint).expect("restore");
    assert_eq!(
        store.read_file(&main.id, "/notes.lines").expect("read restored"),
        b"x=old\n".to_vec()
    );
    assert_eq!(file.path, "/notes.lines");
}

#[test]
fn files_are_rendered_per_version() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");
    store
        .write_file(&main.id, "/shared.lines", b"k=main\n")
        .expect("write main");
    store.checkpoint(&main.id).expect("checkpoint");

    let branch = store
        .create_version(CreateVersionRequest::named("branch"))
        .expect("create branch");
    assert_eq!(
        store.read_file(&branch.id, "/shared.lines").expect("read branch"),
        b"k=main\n".to_vec()
    );

    store
        .write_file(&branch.id, "/shared.lines", b"k=branch\n")
        .expect("write branch");
    assert_eq!(
        store.read_file(&branch.id, "/shared.lines").expect("read branch"),
        b"k=branch\n".to_vec()
    );
    assert_eq!(
        store.read_file(&main.id, "/shared.lines").expect("read main"),
        b"k=main\n".to_vec()
    );
}

#[test]
fn restoring_global_rerenders_inheriting_versions() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");
    let file = store
        .write_file(GLOBAL_VERSION_ID, "/shared.lines", b"x=old\n")
        .expect("write old");
    let first = store.checkpoint(GLOBAL_VERSION_ID).expect("checkpoint old");
    store
        .write_file(GLOBAL_VERSION_ID, "/shared.lines", b"x=new\n")
        .expect("write new");
    store.checkpoint(GLOBAL_VERSION_ID).expect("checkpoint new");
    assert_eq!(
        store.read_file(&main.id, "/shared.lines").expect("read main"),
        b"x=new\n".to_vec()
    );

    store
        .restore(GLOBAL_VERSION_ID, &first.commit_id)
        .expect("restore global");
    let row = store
        .state(&main.id, &EntityKey::new("x", SCHEMA, &file.id))
        .expect("state")
        .expect("row");
    assert_eq!(row.snapshot_content, json!({ "value": "old" }));
    assert_eq!(
        store.read_file(&main.id, "/shared.lines").expect("read main"),
        b"x=old\n".to_vec()
    );
}

#[test]
fn merging_into_global_rerenders_inheriting_versions() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");
    store
        .write_file(GLOBAL_VERSION_ID, "/shared.lines", b"x=old\n")
        .expect("write old");
    store.checkpoint(GLOBAL_VERSION_ID).expect("checkpoint old");
    assert_eq!(
        store.read_file(&main.id, "/shared.lines").expect("read main"),
        b"x=old\n".to_vec()
    );

    let side = store
        .create_version(CreateVersionRequest {
            from_version_id: Some(GLOBAL_VERSION_ID.to_string()),
            ..CreateVersionRequest::named("side")
        })
        .expect("create side");
    store
        .write_file(&side.id, "/shared.lines", b"x=merged\n")
        .expect("write side");
    store.checkpoint(&side.id).expect("checkpoint side");

    store
        .merge_version(&side.id, GLOBAL_VERSION_ID)
        .expect("merge into global");
    assert_eq!(
        store.read_file(&main.id, "/shared.lines").expect("read main"),
        b"x=merged\n".to_vec()
    );
    assert!(store.verify_cache(&main.id).expect("verify").is_consistent());
}

#[test]
fn unclaimed_paths_and_unknown_files_fail() {
    let mut store = open_store();
    let main = store.active_version().expect("active version");

    let err = store
        .write_file(&main.id, "/image.png", b"\x89PNG")
        .expect_err("no plugin");
    assert!(matches!(err, StoreError::PluginNotFound(_)));
    assert!(store.list_files().expect("list").is_empty());

    let err = store
        .write_file(&main.id, "relative.lines", b"a=1\n")
        .expect_err("relative path");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let err = store
        .read_file(&main.id, "/missing.lines")
        .expect_err("missing file");
    assert!(matches!(err, StoreError::UnknownFile));

    let err = store
        .write_file(&main.id, "/bad.lines", b"no equals sign\n")
        .expect_err("plugin failure");
    assert!(matches!(err, StoreError::Plugin(_)));
}
