#![forbid(unsafe_code)]

use super::*;
use cs_sql::{StatementKind, preprocess};
use rusqlite::types::Value as SqlValue;

/// A row drained from the writer table.
struct PendingWrite {
    seq: i64,
    entity_id: Option<String>,
    schema_key: Option<String>,
    file_id: Option<String>,
    plugin_key: Option<String>,
    snapshot_content: Option<String>,
    schema_version: Option<String>,
    version_id: Option<String>,
    metadata: Option<String>,
    untracked: bool,
}

impl StoreTxn<'_> {
    /// Runs SQL written against the logical views.
    ///
    /// `params[i]` binds `?{i + 1}`. A script yields one result per
    /// statement; writes report how many entities they touched.
    pub fn execute(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<QueryResult>, StoreError> {
        let preprocessed = preprocess(sql)?;
        debug!("execute: trace={}", preprocessed.trace.to_json());

        if preprocessed.touches_all_versions() {
            self.ensure_all_materialized()?;
        } else if !preprocessed.views.is_empty() {
            let active = active_version_id_tx(&self.tx)?;
            self.ensure_materialized(&active)?;
        }

        let mut results = Vec::with_capacity(preprocessed.statements.len());
        for compiled in &preprocessed.statements {
            let mut stmt = self.tx.prepare(&compiled.sql)?;
            for index in &compiled.params {
                let position = usize::try_from(*index)
                    .map_err(|_| StoreError::InvalidInput("numeric overflow"))?;
                let value = position
                    .checked_sub(1)
                    .and_then(|slot| params.get(slot))
                    .ok_or(StoreError::InvalidInput("missing sql parameter"))?;
                stmt.raw_bind_parameter(position, value)?;
            }

            if compiled.kind == StatementKind::Select {
                let columns: Vec<String> = stmt
                    .column_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                let mut rows = stmt.raw_query();
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut values = Vec::with_capacity(columns.len());
                    for index in 0..columns.len() {
                        values.push(row.get::<_, SqlValue>(index)?);
                    }
                    out.push(values);
                }
                results.push(QueryResult {
                    columns,
                    rows: out,
                    changes: 0,
                });
                continue;
            }

            stmt.raw_execute()?;
            drop(stmt);
            let changes = self.drain_writer()?;
            results.push(QueryResult {
                columns: Vec::new(),
                rows: Vec::new(),
                changes,
            });
        }
        Ok(results)
    }

    /// Applies every row the rewritten statements left in the writer table.
    fn drain_writer(&mut self) -> Result<usize, StoreError> {
        let pending = {
            let mut stmt = self.tx.prepare_cached(
                "SELECT seq, entity_id, schema_key, file_id, plugin_key, snapshot_content, \
                   schema_version, version_id, metadata, untracked \
                 FROM internal_state_writer ORDER BY seq ASC",
            )?;
            stmt.query_map([], |row| {
                Ok(PendingWrite {
                    seq: row.get(0)?,
                    entity_id: row.get(1)?,
                    schema_key: row.get(2)?,
                    file_id: row.get(3)?,
                    plugin_key: row.get(4)?,
                    snapshot_content: row.get(5)?,
                    schema_version: row.get(6)?,
                    version_id: row.get(7)?,
                    metadata: row.get(8)?,
                    untracked: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?
        };
        self.tx.execute("DELETE FROM internal_state_writer", [])?;

        for row in &pending {
            let (version_id, write) = pending_to_write(row)?;
            self.write_entity(&version_id, write)?;
        }
        if !pending.is_empty() {
            debug!("drain_writer: {} row(s)", pending.len());
        }
        Ok(pending.len())
    }
}

fn required(value: &Option<String>, message: &'static str) -> Result<String, StoreError> {
    value.clone().ok_or(StoreError::InvalidInput(message))
}

fn parse_json(raw: &Option<String>) -> Result<Option<serde_json::Value>, StoreError> {
    raw.as_deref()
        .map(|text| serde_json::from_str(text).map_err(StoreError::from))
        .transpose()
}

fn pending_to_write(row: &PendingWrite) -> Result<(String, EntityWrite), StoreError> {
    let version_id = required(&row.version_id, "version_id must not be null")?;
    let write = EntityWrite {
        entity_id: required(&row.entity_id, "entity_id must not be null")?,
        schema_key: required(&row.schema_key, "schema_key must not be null")?,
        file_id: required(&row.file_id, "file_id must not be null")?,
        plugin_key: required(&row.plugin_key, "plugin_key must not be null")?,
        schema_version: required(&row.schema_version, "schema_version must not be null")?,
        snapshot_content: parse_json(&row.snapshot_content)?,
        metadata: parse_json(&row.metadata)?,
        untracked: row.untracked,
    };
    if write.snapshot_content.is_none() {
        debug!("drain_writer: tombstone at seq {}", row.seq);
    }
    Ok((version_id, write))
}

impl SqliteStore {
    pub fn execute(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<QueryResult>, StoreError> {
        self.with_transaction(|txn| txn.execute(sql, params))
    }
}
