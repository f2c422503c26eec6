#![forbid(unsafe_code)]

use super::*;

impl StoreTxn<'_> {
    /// Rewinds a version to a commit of its own history. Uncommitted work is
    /// discarded and file bytes are regenerated from the restored state.
    pub fn restore(&mut self, version_id: &str, commit_id: &str) -> Result<VersionRow, StoreError> {
        let version = version_tx(&self.tx, version_id)?;
        ensure_commit_exists_tx(&self.tx, commit_id)?;
        if !self.version_ancestry(&version)?.contains(commit_id) {
            return Err(StoreError::InvalidInput(
                "commit is not part of the version's history",
            ));
        }

        let working_commit_id = self.new_commit(false)?;
        self.tx.execute(
            "UPDATE version SET commit_id=?1, working_commit_id=?2 WHERE id=?3",
            params![commit_id, working_commit_id, version.id],
        )?;
        for affected in invalidate_cache_tx(&self.tx, &version.id)? {
            self.refresh_files(&affected)?;
        }
        debug!("restore: {} -> {}", version.id, commit_id);

        Ok(VersionRow {
            commit_id: commit_id.to_string(),
            working_commit_id,
            ..version
        })
    }
}

impl SqliteStore {
    pub fn restore(&mut self, version_id: &str, commit_id: &str) -> Result<VersionRow, StoreError> {
        self.with_transaction(|txn| txn.restore(version_id, commit_id))
    }
}
