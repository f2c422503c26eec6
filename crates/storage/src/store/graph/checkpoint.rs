#![forbid(unsafe_code)]

use super::*;

impl StoreTxn<'_> {
    /// Seals the working change set of a version as a commit and opens a
    /// fresh working commit on top of it.
    pub fn checkpoint(&mut self, version_id: &str) -> Result<VersionRow, StoreError> {
        let version = version_tx(&self.tx, version_id)?;
        let change_set_id = change_set_of_tx(&self.tx, &version.working_commit_id)?;
        let elements: i64 = self.tx.query_row(
            "SELECT COUNT(*) FROM change_set_element WHERE change_set_id=?1",
            params![change_set_id],
            |row| row.get(0),
        )?;
        if elements == 0 {
            return Err(StoreError::EmptyCheckpoint);
        }

        self.tx.execute(
            "UPDATE change_set SET immutable=1 WHERE id=?1",
            params![change_set_id],
        )?;
        add_commit_label_tx(&self.tx, &version.working_commit_id, CHECKPOINT_LABEL)?;
        add_commit_edge_tx(&self.tx, &version.commit_id, &version.working_commit_id)?;

        let working_commit_id = self.new_commit(false)?;
        self.tx.execute(
            "UPDATE version SET commit_id=?1, working_commit_id=?2 WHERE id=?3",
            params![version.working_commit_id, working_commit_id, version.id],
        )?;
        debug!(
            "checkpoint: {} sealed {} ({} changes)",
            version.id, version.working_commit_id, elements
        );

        Ok(VersionRow {
            commit_id: version.working_commit_id,
            working_commit_id,
            ..version
        })
    }
}

impl SqliteStore {
    pub fn checkpoint(&mut self, version_id: &str) -> Result<VersionRow, StoreError> {
        self.with_transaction(|txn| txn.checkpoint(version_id))
    }
}
