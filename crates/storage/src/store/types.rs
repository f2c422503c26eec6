#![forbid(unsafe_code)]

use cs_core::{ChangeRef, ConflictReason, EntityKey};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRow {
    pub id: String,
    pub name: String,
    pub commit_id: String,
    pub working_commit_id: String,
    pub inherits_from_version_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRow {
    pub id: String,
    pub change_set_id: String,
    pub created_at: String,
    pub parent_ids: Vec<String>,
    pub labels: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChangeRow {
    pub id: String,
    pub entity_id: String,
    pub schema_key: String,
    pub file_id: String,
    pub plugin_key: String,
    /// `None` marks a deletion.
    pub snapshot_content: Option<Value>,
    pub schema_version: String,
    pub created_at: String,
    pub metadata: Option<Value>,
}

impl ChangeRow {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.entity_id, &self.schema_key, &self.file_id)
    }

    pub fn is_tombstone(&self) -> bool {
        self.snapshot_content.is_none()
    }

    pub fn to_ref(&self) -> ChangeRef {
        ChangeRef {
            id: self.id.clone(),
            key: self.key(),
            created_at: self.created_at.clone(),
            tombstone: self.is_tombstone(),
        }
    }
}

/// The visible value of one entity in one version.
#[derive(Clone, Debug, PartialEq)]
pub struct StateRow {
    pub entity_id: String,
    pub schema_key: String,
    pub file_id: String,
    pub version_id: String,
    pub plugin_key: String,
    pub schema_version: String,
    pub snapshot_content: Value,
    pub change_id: String,
    pub metadata: Option<Value>,
    pub created_at: String,
    /// Set when the value comes from a version up the inheritance chain.
    pub inherited_from_version_id: Option<String>,
}

impl StateRow {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.entity_id, &self.schema_key, &self.file_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictRow {
    pub id: String,
    pub change_id: String,
    pub conflicting_change_id: String,
    pub reason: ConflictReason,
    pub resolved_with_change_id: Option<String>,
    pub created_at: String,
}

impl ConflictRow {
    pub fn is_resolved(&self) -> bool {
        self.resolved_with_change_id.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<rusqlite::types::Value>>,
    /// Entities written by a mutating statement.
    pub changes: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheReport {
    pub version_id: String,
    pub checked: usize,
    pub mismatches: Vec<EntityKey>,
}

impl CacheReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRow {
    pub id: String,
    pub path: String,
    pub plugin_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeSummary {
    pub base_commit_id: String,
    /// `None` when the source was already part of the target's history.
    pub merge_commit_id: Option<String>,
    pub applied: usize,
    pub resolved_conflicts: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(MergeSummary),
    /// Unresolved conflict ids; the conflicts themselves are persisted.
    Blocked(Vec<String>),
}
