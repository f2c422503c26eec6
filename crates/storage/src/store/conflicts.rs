#![forbid(unsafe_code)]

use super::*;

const CONFLICT_COLUMNS: &str =
    "id, change_id, conflicting_change_id, reason, resolved_with_change_id, created_at";

fn conflict_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConflictRow> {
    let reason: String = row.get(3)?;
    Ok(ConflictRow {
        id: row.get(0)?,
        change_id: row.get(1)?,
        conflicting_change_id: row.get(2)?,
        reason: ConflictReason::parse(&reason).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown conflict reason '{reason}'").into(),
            )
        })?,
        resolved_with_change_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn conflict_tx(tx: &Transaction<'_>, conflict_id: &str) -> Result<ConflictRow, StoreError> {
    tx.query_row(
        &format!("SELECT {CONFLICT_COLUMNS} FROM conflicts WHERE id=?1"),
        params![conflict_id],
        conflict_from_row,
    )
    .optional()?
    .ok_or(StoreError::UnknownConflict)
}

/// The stored conflict between two changes, in either orientation.
fn conflict_for_pair_tx(
    tx: &Transaction<'_>,
    a: &str,
    b: &str,
) -> Result<Option<ConflictRow>, StoreError> {
    Ok(tx
        .query_row(
            &format!(
                "SELECT {CONFLICT_COLUMNS} FROM conflicts \
                 WHERE (change_id=?1 AND conflicting_change_id=?2) \
                    OR (change_id=?2 AND conflicting_change_id=?1) \
                 ORDER BY created_at, id LIMIT 1"
            ),
            params![a, b],
            conflict_from_row,
        )
        .optional()?)
}

impl StoreTxn<'_> {
    /// Stores a detected conflict unless the same pair is already known.
    pub(super) fn persist_conflict(
        &mut self,
        candidate: &ConflictCandidate,
    ) -> Result<ConflictRow, StoreError> {
        if let Some(existing) = conflict_for_pair_tx(
            &self.tx,
            &candidate.change.id,
            &candidate.conflicting_change.id,
        )? {
            return Ok(existing);
        }

        let row = ConflictRow {
            id: ConflictId::for_pair(&candidate.change.id, &candidate.conflicting_change.id)
                .into_string(),
            change_id: candidate.change.id.clone(),
            conflicting_change_id: candidate.conflicting_change.id.clone(),
            reason: candidate.reason,
            resolved_with_change_id: None,
            created_at: self.now()?,
        };
        self.tx.execute(
            "INSERT INTO conflicts(id, change_id, conflicting_change_id, reason, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.id,
                row.change_id,
                row.conflicting_change_id,
                row.reason.as_str(),
                row.created_at,
            ],
        )?;
        debug!(
            "conflict: {} ({}) {} vs {}",
            row.id,
            row.reason.as_str(),
            row.change_id,
            row.conflicting_change_id
        );
        Ok(row)
    }

    /// Detects and stores the conflicts between the committed histories of
    /// two versions, relative to their lowest common ancestor.
    pub fn detect_conflicts(
        &mut self,
        version_a_id: &str,
        version_b_id: &str,
    ) -> Result<Vec<ConflictRow>, StoreError> {
        let a = version_tx(&self.tx, version_a_id)?;
        let b = version_tx(&self.tx, version_b_id)?;
        let inputs = self.merge_inputs(&a, &b)?;
        let candidates = detect_conflicts(&inputs.base, &inputs.source, &inputs.target);
        let mut out = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            out.push(self.persist_conflict(candidate)?);
        }
        Ok(out)
    }

    /// Records which side of a conflict wins. The selection must be one of
    /// the two conflicting changes.
    pub fn resolve_conflict(
        &mut self,
        conflict_id: &str,
        selected_change_id: &str,
    ) -> Result<ConflictRow, StoreError> {
        let conflict_id = ConflictId::try_new(conflict_id)
            .map_err(|err| StoreError::InvalidInput(err.message()))?;
        let conflict = conflict_tx(&self.tx, conflict_id.as_str())?;
        if conflict.is_resolved() {
            return Err(StoreError::ConflictAlreadyResolved);
        }
        if selected_change_id != conflict.change_id
            && selected_change_id != conflict.conflicting_change_id
        {
            return Err(StoreError::InvalidInput(
                "selected change is not part of the conflict",
            ));
        }

        self.tx.execute(
            "UPDATE conflicts SET resolved_with_change_id=?1 \
             WHERE id=?2 AND resolved_with_change_id IS NULL",
            params![selected_change_id, conflict.id],
        )?;
        debug!("resolve_conflict: {} -> {}", conflict.id, selected_change_id);
        Ok(ConflictRow {
            resolved_with_change_id: Some(selected_change_id.to_string()),
            ..conflict
        })
    }

    pub fn conflict(&mut self, conflict_id: &str) -> Result<ConflictRow, StoreError> {
        conflict_tx(&self.tx, conflict_id)
    }

    pub fn list_conflicts(&mut self, filter: &ConflictFilter) -> Result<Vec<ConflictRow>, StoreError> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {CONFLICT_COLUMNS} FROM conflicts \
             WHERE (?1 = 0 OR resolved_with_change_id IS NULL) \
               AND (?2 IS NULL OR change_id=?2 OR conflicting_change_id=?2) \
             ORDER BY created_at ASC, id ASC"
        ))?;
        Ok(stmt
            .query_map(
                params![filter.unresolved_only, filter.change_id],
                conflict_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// The state `target` would show after merging `source` into it, without
    /// writing anything. Resolved conflicts show the selected change;
    /// unresolved ones keep the side that arrived first.
    pub fn simulate_merge(
        &mut self,
        source_version_id: &str,
        target_version_id: &str,
    ) -> Result<Vec<ChangeRow>, StoreError> {
        let source = version_tx(&self.tx, source_version_id)?;
        let target = version_tx(&self.tx, target_version_id)?;
        let inputs = self.merge_inputs(&source, &target)?;

        let mut lookup_error = None;
        let merged = simulate_merge(&inputs.base, &inputs.source, &inputs.target, |candidate| {
            match conflict_for_pair_tx(
                &self.tx,
                &candidate.change.id,
                &candidate.conflicting_change.id,
            ) {
                Ok(row) => row.and_then(|row| row.resolved_with_change_id),
                Err(err) => {
                    lookup_error.get_or_insert(err);
                    None
                }
            }
        });
        if let Some(err) = lookup_error {
            return Err(err);
        }

        let mut out = Vec::with_capacity(merged.len());
        for leaf in merged.into_changes() {
            if leaf.tombstone {
                continue;
            }
            let change = change_tx(&self.tx, &leaf.id)?.ok_or(StoreError::InvalidInput(
                "leaf change is missing from the change log",
            ))?;
            out.push(change);
        }
        Ok(out)
    }
}

impl SqliteStore {
    pub fn detect_conflicts(
        &mut self,
        version_a_id: &str,
        version_b_id: &str,
    ) -> Result<Vec<ConflictRow>, StoreError> {
        self.with_transaction(|txn| txn.detect_conflicts(version_a_id, version_b_id))
    }

    pub fn resolve_conflict(
        &mut self,
        conflict_id: &str,
        selected_change_id: &str,
    ) -> Result<ConflictRow, StoreError> {
        self.with_transaction(|txn| txn.resolve_conflict(conflict_id, selected_change_id))
    }

    pub fn conflict(&mut self, conflict_id: &str) -> Result<ConflictRow, StoreError> {
        self.with_transaction(|txn| txn.conflict(conflict_id))
    }

    pub fn list_conflicts(&mut self, filter: &ConflictFilter) -> Result<Vec<ConflictRow>, StoreError> {
        self.with_transaction(|txn| txn.list_conflicts(filter))
    }

    pub fn simulate_merge(
        &mut self,
        source_version_id: &str,
        target_version_id: &str,
    ) -> Result<Vec<ChangeRow>, StoreError> {
        self.with_transaction(|txn| txn.simulate_merge(source_version_id, target_version_id))
    }
}
