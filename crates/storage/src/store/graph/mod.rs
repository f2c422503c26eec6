#![forbid(unsafe_code)]

mod checkpoint;
mod diff;
mod merge;
mod restore;

use super::*;

impl StoreTxn<'_> {
    pub fn commit(&mut self, commit_id: &str) -> Result<CommitRow, StoreError> {
        commit_tx(&self.tx, commit_id)
    }

    pub fn commit_labels(&mut self, commit_id: &str) -> Result<Vec<String>, StoreError> {
        ensure_commit_exists_tx(&self.tx, commit_id)?;
        commit_labels_tx(&self.tx, commit_id)
    }

    /// Ancestors of `commit_id` (itself included), every commit before its
    /// ancestors. `max_depth` defaults to the configured limit.
    pub fn commit_ancestry(
        &mut self,
        commit_id: &str,
        max_depth: Option<usize>,
    ) -> Result<Vec<String>, StoreError> {
        let depth = max_depth.unwrap_or(self.config.max_ancestry_depth);
        Ok(ancestry_tx(&self.tx, commit_id, depth)?.descendant_first_order())
    }

    fn version_ancestry(&self, version: &VersionRow) -> Result<Ancestry, StoreError> {
        ancestry_tx(&self.tx, &version.commit_id, self.config.max_ancestry_depth)
    }
}

impl SqliteStore {
    pub fn commit(&mut self, commit_id: &str) -> Result<CommitRow, StoreError> {
        self.with_transaction(|txn| txn.commit(commit_id))
    }

    pub fn commit_labels(&mut self, commit_id: &str) -> Result<Vec<String>, StoreError> {
        self.with_transaction(|txn| txn.commit_labels(commit_id))
    }

    pub fn commit_ancestry(
        &mut self,
        commit_id: &str,
        max_depth: Option<usize>,
    ) -> Result<Vec<String>, StoreError> {
        self.with_transaction(|txn| txn.commit_ancestry(commit_id, max_depth))
    }
}
