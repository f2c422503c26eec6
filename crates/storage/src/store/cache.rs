#![forbid(unsafe_code)]

use super::*;

impl StoreTxn<'_> {
    /// Visible tracked value of one entity. Cache hits are returned as
    /// stored; a miss walks the history and persists the result.
    pub fn state(
        &mut self,
        version_id: &str,
        key: &EntityKey,
    ) -> Result<Option<StateRow>, StoreError> {
        let version = version_tx(&self.tx, version_id)?;
        match cached_tx(&self.tx, &version.id, key)? {
            Cached::Hit(row) => return Ok(Some(row)),
            Cached::Deleted => return Ok(None),
            Cached::Miss => {}
        }
        if is_complete_tx(&self.tx, &version.id)? {
            return Ok(None);
        }

        let Some(visible) = resolve_key_tx(
            &self.tx,
            &version.id,
            key,
            self.config.max_ancestry_depth,
            self.config.max_inheritance_depth,
        )?
        else {
            return Ok(None);
        };
        upsert_cache_tx(&self.tx, &version.id, &visible)?;
        Ok(visible.to_state(&version.id))
    }

    /// Every visible tracked entity of a version, ordered by key.
    pub fn state_all(&mut self, version_id: &str) -> Result<Vec<StateRow>, StoreError> {
        let version = version_tx(&self.tx, version_id)?;
        self.ensure_materialized(&version.id)?;
        cached_rows_tx(&self.tx, &version.id)
    }

    pub(super) fn ensure_materialized(&mut self, version_id: &str) -> Result<(), StoreError> {
        if is_complete_tx(&self.tx, version_id)? {
            return Ok(());
        }
        let rows = materialize_version_tx(
            &self.tx,
            version_id,
            self.config.max_ancestry_depth,
            self.config.max_inheritance_depth,
        )?;
        debug!("materialize: {} ({} rows)", version_id, rows);
        Ok(())
    }

    pub(super) fn ensure_all_materialized(&mut self) -> Result<(), StoreError> {
        for version in list_versions_tx(&self.tx)? {
            self.ensure_materialized(&version.id)?;
        }
        Ok(())
    }

    /// Drops every cached row; later reads walk the history again.
    pub fn rebuild_cache(&mut self) -> Result<(), StoreError> {
        self.tx.execute_batch(
            "DELETE FROM internal_state_cache; DELETE FROM internal_state_cache_status;",
        )?;
        debug!("rebuild_cache");
        Ok(())
    }

    pub fn invalidate_cache(&mut self, version_id: &str) -> Result<(), StoreError> {
        let version = version_tx(&self.tx, version_id)?;
        invalidate_cache_tx(&self.tx, &version.id)?;
        Ok(())
    }

    /// Compares what the cache holds for a version with a fresh walk.
    pub fn verify_cache(&mut self, version_id: &str) -> Result<CacheReport, StoreError> {
        let version = version_tx(&self.tx, version_id)?;
        let fresh = resolve_all_tx(
            &self.tx,
            &version.id,
            self.config.max_ancestry_depth,
            self.config.max_inheritance_depth,
        )?;
        let cached = cached_pointers_tx(&self.tx, &version.id)?;

        let mut mismatches = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        for (key, change_id, inherited_from, is_deleted) in &cached {
            seen.insert(key.clone());
            let matches = fresh.get(key).is_some_and(|visible| {
                visible.change.id == *change_id
                    && visible.inherited_from == *inherited_from
                    && visible.change.is_tombstone() == *is_deleted
            });
            if !matches {
                mismatches.push(key.clone());
            }
        }
        if is_complete_tx(&self.tx, &version.id)? {
            mismatches.extend(fresh.keys().filter(|key| !seen.contains(*key)).cloned());
        }
        mismatches.sort();

        Ok(CacheReport {
            version_id: version.id,
            checked: cached.len(),
            mismatches,
        })
    }
}

impl SqliteStore {
    pub fn state(
        &mut self,
        version_id: &str,
        key: &EntityKey,
    ) -> Result<Option<StateRow>, StoreError> {
        self.with_transaction(|txn| txn.state(version_id, key))
    }

    pub fn state_all(&mut self, version_id: &str) -> Result<Vec<StateRow>, StoreError> {
        self.with_transaction(|txn| txn.state_all(version_id))
    }

    pub fn rebuild_cache(&mut self) -> Result<(), StoreError> {
        self.with_transaction(|txn| txn.rebuild_cache())
    }

    pub fn invalidate_cache(&mut self, version_id: &str) -> Result<(), StoreError> {
        self.with_transaction(|txn| txn.invalidate_cache(version_id))
    }

    pub fn verify_cache(&mut self, version_id: &str) -> Result<CacheReport, StoreError> {
        self.with_transaction(|txn| txn.verify_cache(version_id))
    }
}
