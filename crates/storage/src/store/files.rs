#![forbid(unsafe_code)]

use super::*;
use crate::plugin::PluginEntity;

fn file_by_path_tx(tx: &Transaction<'_>, path: &str) -> Result<Option<FileRow>, StoreError> {
    Ok(tx
        .query_row(
            "SELECT id, path, plugin_key FROM file_descriptor WHERE path=?1",
            params![path],
            |row| {
                Ok(FileRow {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    plugin_key: row.get(2)?,
                })
            },
        )
        .optional()?)
}

fn list_files_tx(tx: &Transaction<'_>) -> Result<Vec<FileRow>, StoreError> {
    let mut stmt = tx.prepare_cached("SELECT id, path, plugin_key FROM file_descriptor ORDER BY path")?;
    Ok(stmt
        .query_map([], |row| {
            Ok(FileRow {
                id: row.get(0)?,
                path: row.get(1)?,
                plugin_key: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?)
}

fn stored_bytes_tx(
    tx: &Transaction<'_>,
    file_id: &str,
    version_id: &str,
) -> Result<Option<Vec<u8>>, StoreError> {
    Ok(tx
        .query_row(
            "SELECT data FROM file_data WHERE file_id=?1 AND version_id=?2",
            params![file_id, version_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn store_bytes_tx(
    tx: &Transaction<'_>,
    file_id: &str,
    version_id: &str,
    data: &[u8],
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO file_data(file_id, version_id, data) VALUES (?1, ?2, ?3) \
         ON CONFLICT(file_id, version_id) DO UPDATE SET data=excluded.data",
        params![file_id, version_id, data],
    )?;
    Ok(())
}

fn validate_path(path: &str) -> Result<(), StoreError> {
    if !path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return Err(StoreError::InvalidInput(
            "file path must be absolute and name a file",
        ));
    }
    Ok(())
}

impl StoreTxn<'_> {
    /// Stores file bytes in a version: the owning plugin reports which
    /// entities changed and each one becomes a tracked write.
    pub fn write_file(
        &mut self,
        version_id: &str,
        path: &str,
        data: &[u8],
    ) -> Result<FileRow, StoreError> {
        validate_path(path)?;
        let version = version_tx(&self.tx, version_id)?;

        let (file, plugin) = match file_by_path_tx(&self.tx, path)? {
            Some(file) => {
                let plugin = self
                    .plugins
                    .by_key(&file.plugin_key)
                    .ok_or_else(|| StoreError::PluginNotFound(file.plugin_key.clone()))?;
                (file, plugin)
            }
            None => {
                let plugin = self
                    .plugins
                    .for_path(path)
                    .ok_or_else(|| StoreError::PluginNotFound(path.to_string()))?;
                let file = FileRow {
                    id: self.next_id()?,
                    path: path.to_string(),
                    plugin_key: plugin.key().to_string(),
                };
                self.tx.execute(
                    "INSERT INTO file_descriptor(id, path, plugin_key) VALUES (?1, ?2, ?3)",
                    params![file.id, file.path, file.plugin_key],
                )?;
                (file, plugin)
            }
        };

        let before = self.file_bytes(&version.id, &file)?;
        let detected = plugin.detect_changes(before.as_deref(), data)?;
        for change in detected {
            self.write_entity(
                &version.id,
                EntityWrite {
                    entity_id: change.entity_id,
                    schema_key: change.schema_key,
                    file_id: file.id.clone(),
                    plugin_key: file.plugin_key.clone(),
                    schema_version: change.schema_version,
                    snapshot_content: change.snapshot_content,
                    metadata: None,
                    untracked: false,
                },
            )?;
        }
        store_bytes_tx(&self.tx, &file.id, &version.id, data)?;
        debug!("write_file: {} in {} ({} bytes)", file.path, version.id, data.len());
        Ok(file)
    }

    pub fn read_file(&mut self, version_id: &str, path: &str) -> Result<Vec<u8>, StoreError> {
        let version = version_tx(&self.tx, version_id)?;
        let file = file_by_path_tx(&self.tx, path)?.ok_or(StoreError::UnknownFile)?;
        self.file_bytes(&version.id, &file)?
            .ok_or(StoreError::UnknownFile)
    }

    pub fn list_files(&mut self) -> Result<Vec<FileRow>, StoreError> {
        list_files_tx(&self.tx)
    }

    /// Stored bytes, or bytes rendered from the visible entities of the file.
    fn file_bytes(&mut self, version_id: &str, file: &FileRow) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(data) = stored_bytes_tx(&self.tx, &file.id, version_id)? {
            return Ok(Some(data));
        }
        let entities = self.file_entities(version_id, &file.id)?;
        if entities.is_empty() {
            return Ok(None);
        }
        let plugin = self
            .plugins
            .by_key(&file.plugin_key)
            .ok_or_else(|| StoreError::PluginNotFound(file.plugin_key.clone()))?;
        let data = plugin.apply_changes(&entities)?;
        store_bytes_tx(&self.tx, &file.id, version_id, &data)?;
        Ok(Some(data))
    }

    fn file_entities(
        &mut self,
        version_id: &str,
        file_id: &str,
    ) -> Result<Vec<PluginEntity>, StoreError> {
        Ok(self
            .state_all(version_id)?
            .into_iter()
            .filter(|row| row.file_id == file_id)
            .map(|row| PluginEntity {
                entity_id: row.entity_id,
                schema_key: row.schema_key,
                schema_version: row.schema_version,
                snapshot_content: row.snapshot_content,
            })
            .collect())
    }

    /// Re-renders every file of a version after its history moved.
    pub(super) fn refresh_files(&mut self, version_id: &str) -> Result<(), StoreError> {
        for file in list_files_tx(&self.tx)? {
            self.tx.execute(
                "DELETE FROM file_data WHERE file_id=?1 AND version_id=?2",
                params![file.id, version_id],
            )?;
            let entities = self.file_entities(version_id, &file.id)?;
            if entities.is_empty() {
                continue;
            }
            let Some(plugin) = self.plugins.by_key(&file.plugin_key) else {
                warn!(
                    "refresh_files: no plugin '{}' for {}; bytes render on next read",
                    file.plugin_key, file.path
                );
                continue;
            };
            let data = plugin.apply_changes(&entities)?;
            store_bytes_tx(&self.tx, &file.id, version_id, &data)?;
        }
        Ok(())
    }
}

impl SqliteStore {
    pub fn write_file(
        &mut self,
        version_id: &str,
        path: &str,
        data: &[u8],
    ) -> Result<FileRow, StoreError> {
        self.with_transaction(|txn| txn.write_file(version_id, path, data))
    }

    pub fn read_file(&mut self, version_id: &str, path: &str) -> Result<Vec<u8>, StoreError> {
        self.with_transaction(|txn| txn.read_file(version_id, path))
    }

    pub fn list_files(&mut self) -> Result<Vec<FileRow>, StoreError> {
        self.with_transaction(|txn| txn.list_files())
    }
}
