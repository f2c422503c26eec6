#![forbid(unsafe_code)]

use super::*;

impl StoreTxn<'_> {
    /// Leaf differences between the committed histories of two versions.
    /// Working changes are not part of either side.
    pub fn diff(
        &mut self,
        source_version_id: &str,
        target_version_id: &str,
    ) -> Result<Vec<DiffEntry>, StoreError> {
        let source = version_tx(&self.tx, source_version_id)?;
        let target = version_tx(&self.tx, target_version_id)?;
        let source_leaves = leaf_set_tx(&self.tx, &self.version_ancestry(&source)?)?;
        let target_leaves = leaf_set_tx(&self.tx, &self.version_ancestry(&target)?)?;
        Ok(diff_leaves(&source_leaves, &target_leaves))
    }
}

impl SqliteStore {
    pub fn diff(
        &mut self,
        source_version_id: &str,
        target_version_id: &str,
    ) -> Result<Vec<DiffEntry>, StoreError> {
        self.with_transaction(|txn| txn.diff(source_version_id, target_version_id))
    }
}
