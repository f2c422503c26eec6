#![forbid(unsafe_code)]

use super::super::{StoreError, VersionRow};
use rusqlite::{OptionalExtension, Row, Transaction, params};
use std::collections::{BTreeSet, VecDeque};

const VERSION_COLUMNS: &str = "id, name, commit_id, working_commit_id, inherits_from_version_id";

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<VersionRow> {
    Ok(VersionRow {
        id: row.get(0)?,
        name: row.get(1)?,
        commit_id: row.get(2)?,
        working_commit_id: row.get(3)?,
        inherits_from_version_id: row.get(4)?,
    })
}

pub(in crate::store) fn insert_version_tx(
    tx: &Transaction<'_>,
    version: &VersionRow,
) -> Result<(), rusqlite::Error> {
    tx.execute(
        "INSERT INTO version(id, name, commit_id, working_commit_id, inherits_from_version_id) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            version.id,
            version.name,
            version.commit_id,
            version.working_commit_id,
            version.inherits_from_version_id,
        ],
    )?;
    Ok(())
}

pub(in crate::store) fn find_version_tx(
    tx: &Transaction<'_>,
    version_id: &str,
) -> Result<Option<VersionRow>, StoreError> {
    Ok(tx
        .query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM version WHERE id=?1"),
            params![version_id],
            version_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn version_tx(
    tx: &Transaction<'_>,
    version_id: &str,
) -> Result<VersionRow, StoreError> {
    find_version_tx(tx, version_id)?.ok_or(StoreError::UnknownVersion)
}

pub(in crate::store) fn version_by_name_tx(
    tx: &Transaction<'_>,
    name: &str,
) -> Result<Option<VersionRow>, StoreError> {
    Ok(tx
        .query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM version WHERE name=?1"),
            params![name],
            version_from_row,
        )
        .optional()?)
}

pub(in crate::store) fn list_versions_tx(
    tx: &Transaction<'_>,
) -> Result<Vec<VersionRow>, StoreError> {
    let mut stmt = tx.prepare(&format!(
        "SELECT {VERSION_COLUMNS} FROM version ORDER BY name ASC"
    ))?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(version_from_row(row)?);
    }
    Ok(out)
}

pub(in crate::store) fn active_version_id_tx(tx: &Transaction<'_>) -> Result<String, StoreError> {
    tx.query_row(
        "SELECT version_id FROM internal_active_version WHERE singleton=1",
        [],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(StoreError::UnknownVersion)
}

/// `version_id` followed by every version it inherits from, nearest first.
pub(in crate::store) fn inheritance_chain_tx(
    tx: &Transaction<'_>,
    version_id: &str,
    max_depth: usize,
) -> Result<Vec<VersionRow>, StoreError> {
    let mut chain = Vec::new();
    let mut seen = BTreeSet::new();
    let mut next = Some(version_id.to_string());
    while let Some(current) = next.take() {
        if !seen.insert(current.clone()) {
            return Err(StoreError::BranchCycle);
        }
        if chain.len() > max_depth {
            return Err(StoreError::BranchDepthExceeded);
        }
        let version = version_tx(tx, &current)?;
        next = version.inherits_from_version_id.clone();
        chain.push(version);
    }
    Ok(chain)
}

/// Every version that inherits from `version_id`, directly or transitively.
pub(in crate::store) fn inheriting_versions_tx(
    tx: &Transaction<'_>,
    version_id: &str,
) -> Result<Vec<String>, StoreError> {
    let mut stmt =
        tx.prepare_cached("SELECT id FROM version WHERE inherits_from_version_id=?1 ORDER BY id")?;
    let mut out = Vec::new();
    let mut seen = BTreeSet::new();
    seen.insert(version_id.to_string());
    let mut queue = VecDeque::from([version_id.to_string()]);
    while let Some(current) = queue.pop_front() {
        let children = stmt
            .query_map(params![current], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for child in children {
            if seen.insert(child.clone()) {
                out.push(child.clone());
                queue.push_back(child);
            }
        }
    }
    Ok(out)
}
