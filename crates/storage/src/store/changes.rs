#![forbid(unsafe_code)]

use super::*;

const NO_CONTENT_SNAPSHOT_ID: &str = "no-content";

impl StoreTxn<'_> {
    /// Records one entity write in `version_id`.
    ///
    /// Tracked writes append a change to the version's working change set
    /// (replacing any earlier element for the same key) and refresh the
    /// cached row of this version and of every version inheriting from it.
    /// Untracked writes bypass the change log. Returns the new change id for
    /// tracked writes.
    pub fn write_entity(
        &mut self,
        version_id: &str,
        write: EntityWrite,
    ) -> Result<Option<String>, StoreError> {
        validate_write(&write)?;
        let version = version_tx(&self.tx, version_id)?;

        if write.untracked {
            self.write_untracked(&version.id, &write)?;
            return Ok(None);
        }

        let snapshot_id = match &write.snapshot_content {
            Some(content) => {
                let id = self.next_id()?;
                self.tx.execute(
                    "INSERT INTO snapshot(id, content) VALUES (?1, ?2)",
                    params![id, serde_json::to_string(content)?],
                )?;
                id
            }
            None => NO_CONTENT_SNAPSHOT_ID.to_string(),
        };

        let change = ChangeRow {
            id: self.next_id()?,
            entity_id: write.entity_id,
            schema_key: write.schema_key,
            file_id: write.file_id,
            plugin_key: write.plugin_key,
            snapshot_content: write.snapshot_content,
            schema_version: write.schema_version,
            created_at: self.now()?,
            metadata: write.metadata,
        };
        self.tx.execute(
            "INSERT INTO change(id, entity_id, schema_key, file_id, plugin_key, snapshot_id, \
               schema_version, created_at, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                change.id,
                change.entity_id,
                change.schema_key,
                change.file_id,
                change.plugin_key,
                snapshot_id,
                change.schema_version,
                change.created_at,
                json_text(change.metadata.as_ref())?,
            ],
        )?;

        let change_set_id = change_set_of_tx(&self.tx, &version.working_commit_id)?;
        self.tx.execute(
            "INSERT INTO change_set_element(change_set_id, change_id, entity_id, schema_key, file_id) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(change_set_id, entity_id, schema_key, file_id) \
             DO UPDATE SET change_id=excluded.change_id",
            params![
                change_set_id,
                change.id,
                change.entity_id,
                change.schema_key,
                change.file_id,
            ],
        )?;

        let key = change.key();
        let change_id = change.id.clone();
        upsert_cache_tx(
            &self.tx,
            &version.id,
            &Visible {
                change,
                inherited_from: None,
            },
        )?;
        let inheritors = inheriting_versions_tx(&self.tx, &version.id)?;
        self.refresh_inheritors(&inheritors, &key)?;
        // Stored file bytes no longer match the entity state.
        for affected in std::iter::once(&version.id).chain(&inheritors) {
            self.tx.execute(
                "DELETE FROM file_data WHERE file_id=?1 AND version_id=?2",
                params![key.file_id, affected],
            )?;
        }
        debug!(
            "write_entity: {}/{}/{} in {} -> {}",
            key.entity_id, key.schema_key, key.file_id, version.id, change_id
        );
        Ok(Some(change_id))
    }

    fn write_untracked(&mut self, version_id: &str, write: &EntityWrite) -> Result<(), StoreError> {
        let Some(content) = &write.snapshot_content else {
            self.tx.execute(
                "DELETE FROM internal_state_untracked \
                 WHERE entity_id=?1 AND schema_key=?2 AND file_id=?3 AND version_id=?4",
                params![write.entity_id, write.schema_key, write.file_id, version_id],
            )?;
            return Ok(());
        };
        let now = self.now()?;
        self.tx.execute(
            "INSERT INTO internal_state_untracked(entity_id, schema_key, file_id, version_id, \
               plugin_key, schema_version, snapshot_content, metadata, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) \
             ON CONFLICT(entity_id, schema_key, file_id, version_id) DO UPDATE SET \
               plugin_key=excluded.plugin_key, \
               schema_version=excluded.schema_version, \
               snapshot_content=excluded.snapshot_content, \
               metadata=excluded.metadata, \
               updated_at=excluded.updated_at",
            params![
                write.entity_id,
                write.schema_key,
                write.file_id,
                version_id,
                write.plugin_key,
                write.schema_version,
                serde_json::to_string(content)?,
                json_text(write.metadata.as_ref())?,
                now,
            ],
        )?;
        Ok(())
    }

    /// Re-walks `key` in the given inheriting versions. Incomplete caches
    /// just drop the row and resolve it on the next read.
    fn refresh_inheritors(&mut self, inheritors: &[String], key: &EntityKey) -> Result<(), StoreError> {
        for inheritor in inheritors {
            delete_cache_key_tx(&self.tx, inheritor, key)?;
            if !is_complete_tx(&self.tx, inheritor)? {
                continue;
            }
            if let Some(visible) = resolve_key_tx(
                &self.tx,
                inheritor,
                key,
                self.config.max_ancestry_depth,
                self.config.max_inheritance_depth,
            )? {
                upsert_cache_tx(&self.tx, inheritor, &visible)?;
            }
        }
        Ok(())
    }

    /// Every change ever recorded for one entity, oldest first.
    pub fn changes_for_entity(&mut self, key: &EntityKey) -> Result<Vec<ChangeRow>, StoreError> {
        let mut stmt = self.tx.prepare_cached(&format!(
            "SELECT {CHANGE_COLUMNS} FROM {CHANGE_FROM} \
             WHERE c.entity_id=?1 AND c.schema_key=?2 AND c.file_id=?3 \
             ORDER BY c.created_at ASC, c.id ASC"
        ))?;
        Ok(stmt
            .query_map(
                params![key.entity_id, key.schema_key, key.file_id],
                |row| change_from_row(row, 0),
            )?
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub fn change(&mut self, change_id: &str) -> Result<Option<ChangeRow>, StoreError> {
        change_tx(&self.tx, change_id)
    }

    pub fn commit_changes(&mut self, commit_id: &str) -> Result<Vec<ChangeRow>, StoreError> {
        ensure_commit_exists_tx(&self.tx, commit_id)?;
        commit_changes_tx(&self.tx, commit_id)
    }

    /// Untracked value of one entity, if any.
    pub fn untracked(
        &mut self,
        version_id: &str,
        key: &EntityKey,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let raw: Option<String> = self
            .tx
            .query_row(
                "SELECT snapshot_content FROM internal_state_untracked \
                 WHERE entity_id=?1 AND schema_key=?2 AND file_id=?3 AND version_id=?4",
                params![key.entity_id, key.schema_key, key.file_id, version_id],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|text| serde_json::from_str(&text).map_err(StoreError::from))
            .transpose()
    }
}

fn validate_write(write: &EntityWrite) -> Result<(), StoreError> {
    for (value, message) in [
        (&write.entity_id, "entity_id must not be empty"),
        (&write.schema_key, "schema_key must not be empty"),
        (&write.file_id, "file_id must not be empty"),
        (&write.plugin_key, "plugin_key must not be empty"),
        (&write.schema_version, "schema_version must not be empty"),
    ] {
        if value.trim().is_empty() {
            return Err(StoreError::InvalidInput(message));
        }
    }
    Ok(())
}

impl SqliteStore {
    pub fn write_entity(
        &mut self,
        version_id: &str,
        write: EntityWrite,
    ) -> Result<Option<String>, StoreError> {
        self.with_transaction(|txn| txn.write_entity(version_id, write))
    }

    pub fn changes_for_entity(&mut self, key: &EntityKey) -> Result<Vec<ChangeRow>, StoreError> {
        self.with_transaction(|txn| txn.changes_for_entity(key))
    }

    pub fn change(&mut self, change_id: &str) -> Result<Option<ChangeRow>, StoreError> {
        self.with_transaction(|txn| txn.change(change_id))
    }

    pub fn commit_changes(&mut self, commit_id: &str) -> Result<Vec<ChangeRow>, StoreError> {
        self.with_transaction(|txn| txn.commit_changes(commit_id))
    }

    pub fn untracked(
        &mut self,
        version_id: &str,
        key: &EntityKey,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        self.with_transaction(|txn| txn.untracked(version_id, key))
    }
}
