#![forbid(unsafe_code)]

use super::*;

/// Leaf sets of two committed histories and of their lowest common ancestor.
pub(in crate::store) struct MergeInputs {
    pub(in crate::store) base_commit_id: String,
    pub(in crate::store) base: LeafSet,
    pub(in crate::store) source: LeafSet,
    pub(in crate::store) target: LeafSet,
}

impl StoreTxn<'_> {
    pub(in crate::store) fn merge_inputs(
        &self,
        source: &VersionRow,
        target: &VersionRow,
    ) -> Result<MergeInputs, StoreError> {
        let source_ancestry = self.version_ancestry(source)?;
        let target_ancestry = self.version_ancestry(target)?;
        let base_commit_id = lowest_common_ancestor(&source_ancestry, &target_ancestry)
            .ok_or(StoreError::InvalidInput("versions share no history"))?;
        let base_ancestry = ancestry_tx(&self.tx, &base_commit_id, self.config.max_ancestry_depth)?;
        Ok(MergeInputs {
            base: leaf_set_tx(&self.tx, &base_ancestry)?,
            source: leaf_set_tx(&self.tx, &source_ancestry)?,
            target: leaf_set_tx(&self.tx, &target_ancestry)?,
            base_commit_id,
        })
    }

    /// Merges the committed history of `source` into `target`.
    ///
    /// Keys changed on one side take that side's leaf. Keys changed on both
    /// sides are recorded as conflicts; while any of them is unresolved the
    /// merge is refused and nothing but the conflict rows is written.
    /// Otherwise a two-parent merge commit becomes the target's `commit_id`.
    pub fn merge_version(
        &mut self,
        source_version_id: &str,
        target_version_id: &str,
    ) -> Result<MergeOutcome, StoreError> {
        let source = version_tx(&self.tx, source_version_id)?;
        let target = version_tx(&self.tx, target_version_id)?;
        if source.id == target.id {
            return Err(StoreError::InvalidInput("cannot merge a version into itself"));
        }

        let inputs = self.merge_inputs(&source, &target)?;
        if inputs.base_commit_id == source.commit_id {
            debug!("merge: {} already contains {}", target.id, source.id);
            return Ok(MergeOutcome::Merged(MergeSummary {
                base_commit_id: inputs.base_commit_id,
                merge_commit_id: None,
                applied: 0,
                resolved_conflicts: 0,
            }));
        }

        let plan = plan_merge(&inputs.base, &inputs.source, &inputs.target);
        let mut winners = plan.from_source;
        winners.extend(plan.from_target);

        let mut unresolved = Vec::new();
        let mut resolved_conflicts = 0;
        for candidate in &plan.conflicts {
            let row = self.persist_conflict(candidate)?;
            match row.resolved_with_change_id.as_deref() {
                Some(selected) if selected == candidate.change.id => {
                    winners.push(candidate.change.clone());
                    resolved_conflicts += 1;
                }
                Some(_) => {
                    winners.push(candidate.conflicting_change.clone());
                    resolved_conflicts += 1;
                }
                None => unresolved.push(row.id),
            }
        }
        if !unresolved.is_empty() {
            debug!(
                "merge: {} into {} blocked by {} conflict(s)",
                source.id,
                target.id,
                unresolved.len()
            );
            return Ok(MergeOutcome::Blocked(unresolved));
        }

        let change_set_id = self.next_id()?;
        self.tx.execute(
            "INSERT INTO change_set(id, immutable) VALUES (?1, 0)",
            params![change_set_id],
        )?;
        for leaf in &winners {
            self.tx.execute(
                "INSERT INTO change_set_element(change_set_id, change_id, entity_id, schema_key, file_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    change_set_id,
                    leaf.id,
                    leaf.key.entity_id,
                    leaf.key.schema_key,
                    leaf.key.file_id,
                ],
            )?;
        }
        self.tx.execute(
            "UPDATE change_set SET immutable=1 WHERE id=?1",
            params![change_set_id],
        )?;

        let merge_commit_id = self.next_id()?;
        let created_at = self.now()?;
        self.tx.execute(
            "INSERT INTO commits(id, change_set_id, created_at) VALUES (?1, ?2, ?3)",
            params![merge_commit_id, change_set_id, created_at],
        )?;
        add_commit_edge_tx(&self.tx, &target.commit_id, &merge_commit_id)?;
        add_commit_edge_tx(&self.tx, &source.commit_id, &merge_commit_id)?;
        add_commit_label_tx(&self.tx, &merge_commit_id, MERGE_LABEL)?;
        self.tx.execute(
            "UPDATE version SET commit_id=?1 WHERE id=?2",
            params![merge_commit_id, target.id],
        )?;

        for affected in invalidate_cache_tx(&self.tx, &target.id)? {
            self.refresh_files(&affected)?;
        }
        debug!(
            "merge: {} into {} -> {} ({} leaves)",
            source.id,
            target.id,
            merge_commit_id,
            winners.len()
        );

        Ok(MergeOutcome::Merged(MergeSummary {
            base_commit_id: inputs.base_commit_id,
            merge_commit_id: Some(merge_commit_id),
            applied: winners.len(),
            resolved_conflicts,
        }))
    }
}

impl SqliteStore {
    /// Like [`StoreTxn::merge_version`], but a blocked merge is reported as
    /// [`StoreError::MergeBlocked`] after the detected conflicts are stored.
    pub fn merge_version(
        &mut self,
        source_version_id: &str,
        target_version_id: &str,
    ) -> Result<MergeSummary, StoreError> {
        match self.with_transaction(|txn| txn.merge_version(source_version_id, target_version_id))? {
            MergeOutcome::Merged(summary) => Ok(summary),
            MergeOutcome::Blocked(conflicts) => Err(StoreError::MergeBlocked { conflicts }),
        }
    }
}
