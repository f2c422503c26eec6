#![forbid(unsafe_code)]

//! Async facade over [`SqliteStore`].
//!
//! Each call runs one complete synchronous transaction; nothing is awaited
//! while a transaction is open, so the futures hold no SQLite state across
//! suspension points.

use crate::config::StoreConfig;
use crate::store::{
    ChangeRow, ConflictFilter, ConflictRow, CreateVersionRequest, EntityWrite, MergeSummary,
    QueryResult, SqliteStore, StateRow, StoreError, StoreTxn, VersionRow,
};
use cs_core::{DiffEntry, EntityKey};
use rusqlite::types::Value as SqlValue;

#[derive(Debug)]
pub struct AsyncStore {
    inner: SqliteStore,
}

impl AsyncStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self { inner }
    }

    pub async fn open_in_memory(config: StoreConfig) -> Result<Self, StoreError> {
        SqliteStore::open_in_memory(config).map(Self::new)
    }

    pub fn get_ref(&self) -> &SqliteStore {
        &self.inner
    }

    pub fn into_inner(self) -> SqliteStore {
        self.inner
    }

    /// Runs `f` as one transaction. `f` is synchronous on purpose.
    pub async fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut StoreTxn<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.inner.with_transaction(f)
    }

    pub async fn execute(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<QueryResult>, StoreError> {
        self.inner.execute(sql, params)
    }

    pub async fn write_entity(
        &mut self,
        version_id: &str,
        write: EntityWrite,
    ) -> Result<Option<String>, StoreError> {
        self.inner.write_entity(version_id, write)
    }

    pub async fn state(
        &mut self,
        version_id: &str,
        key: &EntityKey,
    ) -> Result<Option<StateRow>, StoreError> {
        self.inner.state(version_id, key)
    }

    pub async fn state_all(&mut self, version_id: &str) -> Result<Vec<StateRow>, StoreError> {
        self.inner.state_all(version_id)
    }

    pub async fn changes_for_entity(&mut self, key: &EntityKey) -> Result<Vec<ChangeRow>, StoreError> {
        self.inner.changes_for_entity(key)
    }

    pub async fn create_version(
        &mut self,
        request: CreateVersionRequest,
    ) -> Result<VersionRow, StoreError> {
        self.inner.create_version(request)
    }

    pub async fn active_version(&mut self) -> Result<VersionRow, StoreError> {
        self.inner.active_version()
    }

    pub async fn switch_version(&mut self, version_id: &str) -> Result<VersionRow, StoreError> {
        self.inner.switch_version(version_id)
    }

    pub async fn checkpoint(&mut self, version_id: &str) -> Result<VersionRow, StoreError> {
        self.inner.checkpoint(version_id)
    }

    pub async fn diff(
        &mut self,
        source_version_id: &str,
        target_version_id: &str,
    ) -> Result<Vec<DiffEntry>, StoreError> {
        self.inner.diff(source_version_id, target_version_id)
    }

    pub async fn detect_conflicts(
        &mut self,
        version_a_id: &str,
        version_b_id: &str,
    ) -> Result<Vec<ConflictRow>, StoreError> {
        self.inner.detect_conflicts(version_a_id, version_b_id)
    }

    pub async fn resolve_conflict(
        &mut self,
        conflict_id: &str,
        selected_change_id: &str,
    ) -> Result<ConflictRow, StoreError> {
        self.inner.resolve_conflict(conflict_id, selected_change_id)
    }

    pub async fn list_conflicts(
        &mut self,
        filter: &ConflictFilter,
    ) -> Result<Vec<ConflictRow>, StoreError> {
        self.inner.list_conflicts(filter)
    }

    pub async fn merge_version(
        &mut self,
        source_version_id: &str,
        target_version_id: &str,
    ) -> Result<MergeSummary, StoreError> {
        self.inner.merge_version(source_version_id, target_version_id)
    }

    pub async fn restore(&mut self, version_id: &str, commit_id: &str) -> Result<VersionRow, StoreError> {
        self.inner.restore(version_id, commit_id)
    }

    pub async fn export_image(&mut self) -> Result<Vec<u8>, StoreError> {
        self.inner.export_image()
    }
}
