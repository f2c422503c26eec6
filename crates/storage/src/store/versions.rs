#![forbid(unsafe_code)]

use super::*;

impl StoreTxn<'_> {
    pub fn create_version(
        &mut self,
        request: CreateVersionRequest,
    ) -> Result<VersionRow, StoreError> {
        let name = canonicalize_version_name(&request.name)?;
        let from_id = match request.from_version_id {
            Some(id) => id,
            None => active_version_id_tx(&self.tx)?,
        };
        let from = version_tx(&self.tx, &from_id)?;
        let parent_id = request
            .inherits_from_version_id
            .unwrap_or_else(|| GLOBAL_VERSION_ID.to_string());

        let chain = inheritance_chain_tx(&self.tx, &parent_id, self.config.max_inheritance_depth)?;
        if chain.len() + 1 > self.config.max_inheritance_depth {
            return Err(StoreError::BranchDepthExceeded);
        }
        if version_by_name_tx(&self.tx, &name)?.is_some() {
            return Err(StoreError::VersionAlreadyExists);
        }

        let version = VersionRow {
            id: self.next_id()?,
            name,
            commit_id: from.commit_id,
            working_commit_id: self.new_commit(false)?,
            inherits_from_version_id: Some(parent_id),
        };
        insert_version_tx(&self.tx, &version).map_err(map_insert_conflict)?;
        debug!(
            "create_version: {} ({}) from {}",
            version.name, version.id, from.id
        );
        Ok(version)
    }

    pub fn version(&mut self, version_id: &str) -> Result<VersionRow, StoreError> {
        version_tx(&self.tx, version_id)
    }

    pub fn version_by_name(&mut self, name: &str) -> Result<VersionRow, StoreError> {
        let name = canonicalize_version_name(name)?;
        version_by_name_tx(&self.tx, &name)?.ok_or(StoreError::UnknownVersion)
    }

    pub fn list_versions(&mut self) -> Result<Vec<VersionRow>, StoreError> {
        list_versions_tx(&self.tx)
    }

    pub fn active_version(&mut self) -> Result<VersionRow, StoreError> {
        let id = active_version_id_tx(&self.tx)?;
        version_tx(&self.tx, &id)
    }

    pub fn switch_version(&mut self, version_id: &str) -> Result<VersionRow, StoreError> {
        let version = version_tx(&self.tx, version_id)?;
        self.tx.execute(
            "UPDATE internal_active_version SET version_id=?1 WHERE singleton=1",
            params![version.id],
        )?;
        debug!("switch_version: {}", version.id);
        Ok(version)
    }

    /// Removes a version. Its commits stay; they may be shared.
    pub fn delete_version(&mut self, version_id: &str) -> Result<(), StoreError> {
        let version = version_tx(&self.tx, version_id)?;
        if version.id == GLOBAL_VERSION_ID {
            return Err(StoreError::InvalidInput("the global version cannot be deleted"));
        }
        if active_version_id_tx(&self.tx)? == version.id {
            return Err(StoreError::InvalidInput("the active version cannot be deleted"));
        }
        let inherited: i64 = self.tx.query_row(
            "SELECT COUNT(*) FROM version WHERE inherits_from_version_id=?1",
            params![version.id],
            |row| row.get(0),
        )?;
        if inherited > 0 {
            return Err(StoreError::InvalidInput(
                "other versions inherit from this version",
            ));
        }

        invalidate_cache_tx(&self.tx, &version.id)?;
        for sql in [
            "DELETE FROM internal_state_untracked WHERE version_id=?1",
            "DELETE FROM file_data WHERE version_id=?1",
            "DELETE FROM version WHERE id=?1",
        ] {
            self.tx.execute(sql, params![version.id])?;
        }
        debug!("delete_version: {}", version.id);
        Ok(())
    }
}

impl SqliteStore {
    pub fn create_version(
        &mut self,
        request: CreateVersionRequest,
    ) -> Result<VersionRow, StoreError> {
        self.with_transaction(|txn| txn.create_version(request))
    }

    pub fn version(&mut self, version_id: &str) -> Result<VersionRow, StoreError> {
        self.with_transaction(|txn| txn.version(version_id))
    }

    pub fn version_by_name(&mut self, name: &str) -> Result<VersionRow, StoreError> {
        self.with_transaction(|txn| txn.version_by_name(name))
    }

    pub fn list_versions(&mut self) -> Result<Vec<VersionRow>, StoreError> {
        self.with_transaction(|txn| txn.list_versions())
    }

    pub fn active_version(&mut self) -> Result<VersionRow, StoreError> {
        self.with_transaction(|txn| txn.active_version())
    }

    pub fn switch_version(&mut self, version_id: &str) -> Result<VersionRow, StoreError> {
        self.with_transaction(|txn| txn.switch_version(version_id))
    }

    pub fn delete_version(&mut self, version_id: &str) -> Result<(), StoreError> {
        self.with_transaction(|txn| txn.delete_version(version_id))
    }
}
