#![forbid(unsafe_code)]

use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateVersionRequest {
    pub name: String,
    /// Version whose `commit_id` the new version starts from; the active
    /// version when absent.
    pub from_version_id: Option<String>,
    /// Defaults to the global version.
    pub inherits_from_version_id: Option<String>,
}

impl CreateVersionRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from_version_id: None,
            inherits_from_version_id: None,
        }
    }
}

/// One entity write. `snapshot_content = None` deletes the entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityWrite {
    pub entity_id: String,
    pub schema_key: String,
    pub file_id: String,
    pub plugin_key: String,
    pub schema_version: String,
    pub snapshot_content: Option<Value>,
    pub metadata: Option<Value>,
    pub untracked: bool,
}

impl EntityWrite {
    pub fn new(
        entity_id: impl Into<String>,
        schema_key: impl Into<String>,
        file_id: impl Into<String>,
        plugin_key: impl Into<String>,
        snapshot_content: Option<Value>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            schema_key: schema_key.into(),
            file_id: file_id.into(),
            plugin_key: plugin_key.into(),
            schema_version: cs_sql::views::DEFAULT_SCHEMA_VERSION.to_string(),
            snapshot_content,
            metadata: None,
            untracked: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictFilter {
    pub unresolved_only: bool,
    /// Only conflicts where this change is on either side.
    pub change_id: Option<String>,
}
