#![forbid(unsafe_code)]

use super::super::{ChangeRow, StateRow, StoreError};
use rusqlite::Row;
use rusqlite::types::Type;
use serde_json::Value;

/// Columns read by [`change_from_row`], over `change c JOIN snapshot s`.
pub(in crate::store) const CHANGE_COLUMNS: &str = "c.id, c.entity_id, c.schema_key, c.file_id, c.plugin_key, \
     s.content, c.schema_version, c.created_at, c.metadata";

pub(in crate::store) const CHANGE_FROM: &str = "change c JOIN snapshot s ON s.id = c.snapshot_id";

/// Joins `change c` and `snapshot s` onto a `change_set_element e` already in scope.
pub(in crate::store) const ELEMENT_CHANGE_JOIN: &str =
    "JOIN change c ON c.id = e.change_id JOIN snapshot s ON s.id = c.snapshot_id";

/// Columns read by [`state_from_row`], over `internal_state_cache`.
pub(in crate::store) const STATE_COLUMNS: &str = "entity_id, schema_key, file_id, version_id, plugin_key, \
     schema_version, snapshot_content, change_id, metadata, created_at, inherited_from_version_id";

pub(in crate::store) fn change_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ChangeRow> {
    Ok(ChangeRow {
        id: row.get(offset)?,
        entity_id: row.get(offset + 1)?,
        schema_key: row.get(offset + 2)?,
        file_id: row.get(offset + 3)?,
        plugin_key: row.get(offset + 4)?,
        snapshot_content: json_column(row, offset + 5)?,
        schema_version: row.get(offset + 6)?,
        created_at: row.get(offset + 7)?,
        metadata: json_column(row, offset + 8)?,
    })
}

pub(in crate::store) fn state_from_row(row: &Row<'_>) -> rusqlite::Result<StateRow> {
    Ok(StateRow {
        entity_id: row.get(0)?,
        schema_key: row.get(1)?,
        file_id: row.get(2)?,
        version_id: row.get(3)?,
        plugin_key: row.get(4)?,
        schema_version: row.get(5)?,
        snapshot_content: json_column(row, 6)?.unwrap_or(Value::Null),
        change_id: row.get(7)?,
        metadata: json_column(row, 8)?,
        created_at: row.get(9)?,
        inherited_from_version_id: row.get(10)?,
    })
}

pub(in crate::store) fn json_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<Value>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|text| {
        serde_json::from_str(&text).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
        })
    })
    .transpose()
}

pub(in crate::store) fn json_text(value: Option<&Value>) -> Result<Option<String>, StoreError> {
    value
        .map(|value| serde_json::to_string(value).map_err(StoreError::from))
        .transpose()
}
