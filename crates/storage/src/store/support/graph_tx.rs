#![forbid(unsafe_code)]

use super::super::{ChangeRow, CommitRow, StoreError, VersionRow, to_sqlite_i64};
use super::rows::{CHANGE_COLUMNS, CHANGE_FROM, ELEMENT_CHANGE_JOIN, change_from_row};
use cs_core::graph::Ancestry;
use cs_core::{EntityKey, LeafSet};
use rusqlite::{OptionalExtension, Transaction, params};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

pub(in crate::store) fn ensure_commit_exists_tx(
    tx: &Transaction<'_>,
    commit_id: &str,
) -> Result<(), StoreError> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM commits WHERE id=?1",
            params![commit_id],
            |_| Ok(()),
        )
        .optional()?;
    exists.ok_or(StoreError::UnknownCommit)
}

pub(in crate::store) fn commit_tx(
    tx: &Transaction<'_>,
    commit_id: &str,
) -> Result<CommitRow, StoreError> {
    let (change_set_id, created_at) = tx
        .query_row(
            "SELECT change_set_id, created_at FROM commits WHERE id=?1",
            params![commit_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?
        .ok_or(StoreError::UnknownCommit)?;

    let parent_ids = tx
        .prepare_cached("SELECT parent_id FROM commit_edge WHERE child_id=?1 ORDER BY parent_id")?
        .query_map(params![commit_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CommitRow {
        id: commit_id.to_string(),
        change_set_id,
        created_at,
        parent_ids,
        labels: commit_labels_tx(tx, commit_id)?,
    })
}

pub(in crate::store) fn commit_labels_tx(
    tx: &Transaction<'_>,
    commit_id: &str,
) -> Result<Vec<String>, StoreError> {
    Ok(tx
        .prepare_cached(
            "SELECT l.name FROM commit_label cl JOIN label l ON l.id = cl.label_id \
             WHERE cl.commit_id=?1 ORDER BY l.name",
        )?
        .query_map(params![commit_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?)
}

pub(in crate::store) fn add_commit_label_tx(
    tx: &Transaction<'_>,
    commit_id: &str,
    label: &str,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT OR IGNORE INTO commit_label(commit_id, label_id) \
         SELECT ?1, id FROM label WHERE name=?2",
        params![commit_id, label],
    )?;
    Ok(())
}

pub(in crate::store) fn add_commit_edge_tx(
    tx: &Transaction<'_>,
    parent_id: &str,
    child_id: &str,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT OR IGNORE INTO commit_edge(parent_id, child_id) VALUES (?1, ?2)",
        params![parent_id, child_id],
    )?;
    Ok(())
}

pub(in crate::store) fn change_set_of_tx(
    tx: &Transaction<'_>,
    commit_id: &str,
) -> Result<String, StoreError> {
    tx.query_row(
        "SELECT change_set_id FROM commits WHERE id=?1",
        params![commit_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(StoreError::UnknownCommit)
}

/// Ancestor closure of `commit_id`, at most `max_depth` edges deep.
pub(in crate::store) fn ancestry_tx(
    tx: &Transaction<'_>,
    commit_id: &str,
    max_depth: usize,
) -> Result<Ancestry, StoreError> {
    ensure_commit_exists_tx(tx, commit_id)?;
    let limit = to_sqlite_i64(max_depth)?;

    // Walks one level past the limit so truncation is observable.
    let mut stmt = tx.prepare_cached(
        "WITH RECURSIVE walk(id, depth) AS ( \
           SELECT ?1, 0 \
           UNION \
           SELECT e.parent_id, w.depth + 1 FROM commit_edge e JOIN walk w ON e.child_id = w.id \
           WHERE w.depth <= ?2 \
         ) \
         SELECT id, MIN(depth) FROM walk GROUP BY id",
    )?;
    let reached = stmt
        .query_map(params![commit_id, limit], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut ancestry = Ancestry::new(commit_id);
    for (id, depth) in &reached {
        let depth = usize::try_from(*depth).unwrap_or(usize::MAX);
        if depth > max_depth {
            ancestry.mark_truncated();
            continue;
        }
        ancestry.insert_commit(id.clone(), depth);
    }

    let mut parents = tx.prepare_cached("SELECT parent_id FROM commit_edge WHERE child_id=?1")?;
    let members: Vec<String> = ancestry.commits().map(str::to_string).collect();
    for child in &members {
        let parent_ids = parents
            .query_map(params![child], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for parent in parent_ids {
            ancestry.insert_edge(&parent, child);
        }
    }

    if ancestry.is_truncated() {
        warn!(
            "ancestry of {} truncated at depth {}",
            commit_id, max_depth
        );
    }
    Ok(ancestry)
}

/// Changes held by one commit's change set.
pub(in crate::store) fn commit_changes_tx(
    tx: &Transaction<'_>,
    commit_id: &str,
) -> Result<Vec<ChangeRow>, StoreError> {
    let mut stmt = tx.prepare_cached(&format!(
        "SELECT {CHANGE_COLUMNS} FROM commits k \
         JOIN change_set_element e ON e.change_set_id = k.change_set_id \
         {ELEMENT_CHANGE_JOIN} \
         WHERE k.id=?1 \
         ORDER BY e.entity_id, e.schema_key, e.file_id"
    ))?;
    Ok(stmt
        .query_map(params![commit_id], |row| change_from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?)
}

pub(in crate::store) fn change_tx(
    tx: &Transaction<'_>,
    change_id: &str,
) -> Result<Option<ChangeRow>, StoreError> {
    Ok(tx
        .query_row(
            &format!("SELECT {CHANGE_COLUMNS} FROM {CHANGE_FROM} WHERE c.id=?1"),
            params![change_id],
            |row| change_from_row(row, 0),
        )
        .optional()?)
}

/// Commits to consult for `version`, most recent first: the working commit,
/// then the ancestry of `commit_id` with every commit before its ancestors.
pub(in crate::store) fn version_walk_order_tx(
    tx: &Transaction<'_>,
    version: &VersionRow,
    max_depth: usize,
) -> Result<Vec<String>, StoreError> {
    let ancestry = ancestry_tx(tx, &version.commit_id, max_depth)?;
    let mut order = Vec::with_capacity(ancestry.len() + 1);
    order.push(version.working_commit_id.clone());
    order.extend(ancestry.descendant_first_order());
    Ok(order)
}

/// Leaf change per key along `order`; the first commit holding a key wins.
pub(in crate::store) fn leaf_rows_tx(
    tx: &Transaction<'_>,
    order: &[String],
) -> Result<BTreeMap<EntityKey, ChangeRow>, StoreError> {
    let mut leaves = BTreeMap::new();
    for commit_id in order {
        for change in commit_changes_tx(tx, commit_id)? {
            leaves.entry(change.key()).or_insert(change);
        }
    }
    Ok(leaves)
}

pub(in crate::store) fn leaf_set_tx(
    tx: &Transaction<'_>,
    ancestry: &Ancestry,
) -> Result<LeafSet, StoreError> {
    let order = ancestry.descendant_first_order();
    let mut layers = Vec::with_capacity(order.len());
    for commit_id in &order {
        let layer: Vec<_> = commit_changes_tx(tx, commit_id)?
            .iter()
            .map(ChangeRow::to_ref)
            .collect();
        layers.push(layer);
    }
    Ok(LeafSet::from_layers(layers))
}

/// Leaf change for a single key along `order`.
pub(in crate::store) fn leaf_for_key_tx(
    tx: &Transaction<'_>,
    order: &[String],
    key: &EntityKey,
) -> Result<Option<ChangeRow>, StoreError> {
    let position: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index))
        .collect();

    let mut stmt = tx.prepare_cached(&format!(
        "SELECT k.id, {CHANGE_COLUMNS} FROM change_set_element e \
         JOIN commits k ON k.change_set_id = e.change_set_id \
         {ELEMENT_CHANGE_JOIN} \
         WHERE e.entity_id=?1 AND e.schema_key=?2 AND e.file_id=?3"
    ))?;
    let mut rows = stmt.query(params![key.entity_id, key.schema_key, key.file_id])?;

    let mut best: Option<(usize, ChangeRow)> = None;
    while let Some(row) = rows.next()? {
        let commit_id: String = row.get(0)?;
        let Some(&index) = position.get(commit_id.as_str()) else {
            continue;
        };
        if best.as_ref().is_some_and(|(current, _)| *current <= index) {
            continue;
        }
        best = Some((index, change_from_row(row, 1)?));
    }
    Ok(best.map(|(_, change)| change))
}
