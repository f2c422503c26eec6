#![forbid(unsafe_code)]

use super::super::{ChangeRow, StateRow, StoreError};
use super::graph_tx::{leaf_for_key_tx, leaf_rows_tx, version_walk_order_tx};
use super::rows::{STATE_COLUMNS, json_text, state_from_row};
use super::versions_tx::{inheritance_chain_tx, inheriting_versions_tx};
use cs_core::EntityKey;
use rusqlite::{OptionalExtension, Transaction, params};
use std::collections::BTreeMap;

/// What the cache holds for one `(key, version)`.
pub(in crate::store) enum Cached {
    Hit(StateRow),
    Deleted,
    Miss,
}

/// A freshly walked leaf, tagged with the version it was found in when that
/// is not the version being read.
#[derive(Clone, Debug)]
pub(in crate::store) struct Visible {
    pub(in crate::store) change: ChangeRow,
    pub(in crate::store) inherited_from: Option<String>,
}

impl Visible {
    pub(in crate::store) fn to_state(&self, version_id: &str) -> Option<StateRow> {
        let content = self.change.snapshot_content.clone()?;
        Some(StateRow {
            entity_id: self.change.entity_id.clone(),
            schema_key: self.change.schema_key.clone(),
            file_id: self.change.file_id.clone(),
            version_id: version_id.to_string(),
            plugin_key: self.change.plugin_key.clone(),
            schema_version: self.change.schema_version.clone(),
            snapshot_content: content,
            change_id: self.change.id.clone(),
            metadata: self.change.metadata.clone(),
            created_at: self.change.created_at.clone(),
            inherited_from_version_id: self.inherited_from.clone(),
        })
    }
}

pub(in crate::store) fn cached_tx(
    tx: &Transaction<'_>,
    version_id: &str,
    key: &EntityKey,
) -> Result<Cached, StoreError> {
    let row = tx
        .query_row(
            &format!(
                "SELECT {STATE_COLUMNS}, is_deleted FROM internal_state_cache \
                 WHERE entity_id=?1 AND schema_key=?2 AND file_id=?3 AND version_id=?4"
            ),
            params![key.entity_id, key.schema_key, key.file_id, version_id],
            |row| Ok((state_from_row(row)?, row.get::<_, bool>(11)?)),
        )
        .optional()?;
    Ok(match row {
        Some((_, true)) => Cached::Deleted,
        Some((state, false)) => Cached::Hit(state),
        None => Cached::Miss,
    })
}

pub(in crate::store) fn cached_rows_tx(
    tx: &Transaction<'_>,
    version_id: &str,
) -> Result<Vec<StateRow>, StoreError> {
    let mut stmt = tx.prepare_cached(&format!(
        "SELECT {STATE_COLUMNS} FROM internal_state_cache \
         WHERE version_id=?1 AND is_deleted=0 \
         ORDER BY entity_id, schema_key, file_id"
    ))?;
    Ok(stmt
        .query_map(params![version_id], state_from_row)?
        .collect::<Result<Vec<_>, _>>()?)
}

/// `(key, change_id, inherited_from, is_deleted)` for every cached row.
pub(in crate::store) fn cached_pointers_tx(
    tx: &Transaction<'_>,
    version_id: &str,
) -> Result<Vec<(EntityKey, String, Option<String>, bool)>, StoreError> {
    let mut stmt = tx.prepare_cached(
        "SELECT entity_id, schema_key, file_id, change_id, inherited_from_version_id, is_deleted \
         FROM internal_state_cache WHERE version_id=?1",
    )?;
    Ok(stmt
        .query_map(params![version_id], |row| {
            Ok((
                EntityKey::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ),
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?)
}

pub(in crate::store) fn upsert_cache_tx(
    tx: &Transaction<'_>,
    version_id: &str,
    visible: &Visible,
) -> Result<(), StoreError> {
    let change = &visible.change;
    tx.prepare_cached(
        "INSERT INTO internal_state_cache(entity_id, schema_key, file_id, version_id, plugin_key, \
           schema_version, snapshot_content, change_id, metadata, created_at, \
           inherited_from_version_id, is_deleted) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
         ON CONFLICT(entity_id, schema_key, file_id, version_id) DO UPDATE SET \
           plugin_key=excluded.plugin_key, \
           schema_version=excluded.schema_version, \
           snapshot_content=excluded.snapshot_content, \
           change_id=excluded.change_id, \
           metadata=excluded.metadata, \
           created_at=excluded.created_at, \
           inherited_from_version_id=excluded.inherited_from_version_id, \
           is_deleted=excluded.is_deleted",
    )?
    .execute(params![
        change.entity_id,
        change.schema_key,
        change.file_id,
        version_id,
        change.plugin_key,
        change.schema_version,
        json_text(change.snapshot_content.as_ref())?,
        change.id,
        json_text(change.metadata.as_ref())?,
        change.created_at,
        visible.inherited_from,
        change.is_tombstone(),
    ])?;
    Ok(())
}

pub(in crate::store) fn delete_cache_key_tx(
    tx: &Transaction<'_>,
    version_id: &str,
    key: &EntityKey,
) -> Result<(), StoreError> {
    tx.execute(
        "DELETE FROM internal_state_cache \
         WHERE entity_id=?1 AND schema_key=?2 AND file_id=?3 AND version_id=?4",
        params![key.entity_id, key.schema_key, key.file_id, version_id],
    )?;
    Ok(())
}

pub(in crate::store) fn is_complete_tx(
    tx: &Transaction<'_>,
    version_id: &str,
) -> Result<bool, StoreError> {
    Ok(tx
        .query_row(
            "SELECT complete FROM internal_state_cache_status WHERE version_id=?1",
            params![version_id],
            |row| row.get::<_, bool>(0),
        )
        .optional()?
        .unwrap_or(false))
}

/// Drops cached rows of `version_id` and of every version inheriting from it.
pub(in crate::store) fn invalidate_cache_tx(
    tx: &Transaction<'_>,
    version_id: &str,
) -> Result<Vec<String>, StoreError> {
    let mut affected = vec![version_id.to_string()];
    affected.extend(inheriting_versions_tx(tx, version_id)?);
    for version in &affected {
        tx.execute(
            "DELETE FROM internal_state_cache WHERE version_id=?1",
            params![version],
        )?;
        tx.execute(
            "DELETE FROM internal_state_cache_status WHERE version_id=?1",
            params![version],
        )?;
    }
    Ok(affected)
}

/// Fresh walk for one key: the version's own history first, then each
/// version up the inheritance chain. A deletion found first shadows
/// anything further up.
pub(in crate::store) fn resolve_key_tx(
    tx: &Transaction<'_>,
    version_id: &str,
    key: &EntityKey,
    max_ancestry_depth: usize,
    max_inheritance_depth: usize,
) -> Result<Option<Visible>, StoreError> {
    let chain = inheritance_chain_tx(tx, version_id, max_inheritance_depth)?;
    for (index, version) in chain.iter().enumerate() {
        let order = version_walk_order_tx(tx, version, max_ancestry_depth)?;
        if let Some(change) = leaf_for_key_tx(tx, &order, key)? {
            return Ok(Some(Visible {
                change,
                inherited_from: (index > 0).then(|| version.id.clone()),
            }));
        }
    }
    Ok(None)
}

/// Fresh walk for every key visible in `version_id`, deletions included.
pub(in crate::store) fn resolve_all_tx(
    tx: &Transaction<'_>,
    version_id: &str,
    max_ancestry_depth: usize,
    max_inheritance_depth: usize,
) -> Result<BTreeMap<EntityKey, Visible>, StoreError> {
    let chain = inheritance_chain_tx(tx, version_id, max_inheritance_depth)?;
    let mut out = BTreeMap::new();
    for (index, version) in chain.iter().enumerate() {
        let order = version_walk_order_tx(tx, version, max_ancestry_depth)?;
        for (key, change) in leaf_rows_tx(tx, &order)? {
            out.entry(key).or_insert_with(|| Visible {
                change,
                inherited_from: (index > 0).then(|| version.id.clone()),
            });
        }
    }
    Ok(out)
}

/// Replaces the cache of `version_id` with a full fresh walk and marks it
/// complete.
pub(in crate::store) fn materialize_version_tx(
    tx: &Transaction<'_>,
    version_id: &str,
    max_ancestry_depth: usize,
    max_inheritance_depth: usize,
) -> Result<usize, StoreError> {
    let visible = resolve_all_tx(tx, version_id, max_ancestry_depth, max_inheritance_depth)?;
    tx.execute(
        "DELETE FROM internal_state_cache WHERE version_id=?1",
        params![version_id],
    )?;
    for entry in visible.values() {
        upsert_cache_tx(tx, version_id, entry)?;
    }
    tx.execute(
        "INSERT INTO internal_state_cache_status(version_id, complete) VALUES (?1, 1) \
         ON CONFLICT(version_id) DO UPDATE SET complete=1",
        params![version_id],
    )?;
    Ok(visible.len())
}
