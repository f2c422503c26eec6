#![forbid(unsafe_code)]

//! Catalog of the logical views and their mapping onto the physical tables.

use crate::ast::{Expr, Select, SelectItem, Statement, TableRef};
use crate::error::{PreprocessError, Result};
use crate::visit::{Visitor, walk_statement};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const READER_TABLE: &str = "internal_state_reader";
pub const WRITER_TABLE: &str = "internal_state_writer";
pub const ACTIVE_VERSION_TABLE: &str = "internal_active_version";

/// Column order of every row written into [`WRITER_TABLE`].
pub const WRITER_COLUMNS: [&str; 9] = [
    "entity_id",
    "schema_key",
    "file_id",
    "plugin_key",
    "snapshot_content",
    "schema_version",
    "version_id",
    "metadata",
    "untracked",
];

pub const KEY_VALUE_SCHEMA_KEY: &str = "key_value";
pub const KEY_VALUE_FILE_ID: &str = "lix";
pub const KEY_VALUE_PLUGIN_KEY: &str = "lix_own_entity";
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalView {
    KeyValue,
    KeyValueByVersion,
    State,
    StateByVersion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Part of the entity key; settable on insert only.
    Identity,
    Value,
    ReadOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
}

const fn column(name: &'static str, kind: ColumnKind, required: bool) -> ViewColumn {
    ViewColumn {
        name,
        kind,
        required,
    }
}

const KEY_VALUE_COLUMNS: &[ViewColumn] = &[
    column("key", ColumnKind::Identity, true),
    column("value", ColumnKind::Value, false),
    column("version_id", ColumnKind::ReadOnly, false),
    column("metadata", ColumnKind::Value, false),
    column("untracked", ColumnKind::Value, false),
    column("change_id", ColumnKind::ReadOnly, false),
    column("inherited_from_version_id", ColumnKind::ReadOnly, false),
];

const KEY_VALUE_BY_VERSION_COLUMNS: &[ViewColumn] = &[
    column("key", ColumnKind::Identity, true),
    column("value", ColumnKind::Value, false),
    column("version_id", ColumnKind::Identity, true),
    column("metadata", ColumnKind::Value, false),
    column("untracked", ColumnKind::Value, false),
    column("change_id", ColumnKind::ReadOnly, false),
    column("inherited_from_version_id", ColumnKind::ReadOnly, false),
];

const STATE_COLUMNS: &[ViewColumn] = &[
    column("entity_id", ColumnKind::Identity, true),
    column("schema_key", ColumnKind::Identity, true),
    column("file_id", ColumnKind::Identity, true),
    column("plugin_key", ColumnKind::Value, true),
    column("snapshot_content", ColumnKind::Value, true),
    column("schema_version", ColumnKind::Value, false),
    column("version_id", ColumnKind::ReadOnly, false),
    column("metadata", ColumnKind::Value, false),
    column("untracked", ColumnKind::Value, false),
    column("change_id", ColumnKind::ReadOnly, false),
    column("inherited_from_version_id", ColumnKind::ReadOnly, false),
];

const STATE_BY_VERSION_COLUMNS: &[ViewColumn] = &[
    column("entity_id", ColumnKind::Identity, true),
    column("schema_key", ColumnKind::Identity, true),
    column("file_id", ColumnKind::Identity, true),
    column("plugin_key", ColumnKind::Value, true),
    column("snapshot_content", ColumnKind::Value, true),
    column("schema_version", ColumnKind::Value, false),
    column("version_id", ColumnKind::Identity, true),
    column("metadata", ColumnKind::Value, false),
    column("untracked", ColumnKind::Value, false),
    column("change_id", ColumnKind::ReadOnly, false),
    column("inherited_from_version_id", ColumnKind::ReadOnly, false),
];

impl LogicalView {
    pub const ALL: [LogicalView; 4] = [
        Self::KeyValue,
        Self::KeyValueByVersion,
        Self::State,
        Self::StateByVersion,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::KeyValue => "key_value",
            Self::KeyValueByVersion => "key_value_by_version",
            Self::State => "state",
            Self::StateByVersion => "state_by_version",
        }
    }

    pub fn is_by_version(self) -> bool {
        matches!(self, Self::KeyValueByVersion | Self::StateByVersion)
    }

    pub fn is_key_value(self) -> bool {
        matches!(self, Self::KeyValue | Self::KeyValueByVersion)
    }

    pub fn columns(self) -> &'static [ViewColumn] {
        match self {
            Self::KeyValue => KEY_VALUE_COLUMNS,
            Self::KeyValueByVersion => KEY_VALUE_BY_VERSION_COLUMNS,
            Self::State => STATE_COLUMNS,
            Self::StateByVersion => STATE_BY_VERSION_COLUMNS,
        }
    }

    pub fn column(self, name: &str) -> Result<&'static ViewColumn> {
        self.columns()
            .iter()
            .find(|column| column.name == name)
            .ok_or_else(|| PreprocessError::UnknownColumn {
                view: self.name().to_string(),
                column: name.to_string(),
            })
    }

    /// Expression reading `column` from the reader aliased as `qualifier`.
    pub fn read_expr(self, column: &ViewColumn, qualifier: &str) -> Arc<Expr> {
        if self.is_key_value() {
            match column.name {
                "key" => return Expr::column(qualifier, "entity_id"),
                "value" => {
                    return Expr::function(
                        "json_extract",
                        vec![
                            Expr::column(qualifier, "snapshot_content"),
                            Expr::string("$.value"),
                        ],
                    );
                }
                _ => {}
            }
        }
        Expr::column(qualifier, column.name)
    }

    /// Row filter restricting the reader to what this view exposes.
    pub fn scope_filter(self, qualifier: &str) -> Option<Arc<Expr>> {
        let schema = self.is_key_value().then(|| {
            Expr::eq(
                Expr::column(qualifier, "schema_key"),
                Expr::string(KEY_VALUE_SCHEMA_KEY),
            )
        });
        let version = (!self.is_by_version())
            .then(|| Expr::eq(Expr::column(qualifier, "version_id"), active_version_expr()));
        match (schema, version) {
            (Some(schema), Some(version)) => Some(Expr::and(schema, version)),
            (schema, version) => schema.or(version),
        }
    }
}

/// `(SELECT version_id FROM internal_active_version)`.
pub fn active_version_expr() -> Arc<Expr> {
    Arc::new(Expr::Subquery(Arc::new(Select {
        distinct: false,
        projection: vec![SelectItem::Expr {
            expr: Arc::new(Expr::Column {
                table: None,
                name: "version_id".into(),
            }),
            alias: None,
        }],
        from: Some(Arc::new(TableRef {
            name: ACTIVE_VERSION_TABLE.into(),
            alias: None,
        })),
        where_clause: None,
        order_by: Vec::new(),
        limit: None,
        offset: None,
    })))
}

/// Collects the logical views a statement references, rejecting any other
/// table name.
pub fn referenced_views(statement: &Statement) -> Result<BTreeSet<LogicalView>> {
    let mut collector = ViewCollector::default();
    walk_statement(&mut collector, statement)?;
    Ok(collector.views)
}

#[derive(Default)]
struct ViewCollector {
    views: BTreeSet<LogicalView>,
}

impl Visitor for ViewCollector {
    fn visit_table_ref(&mut self, table: &Arc<TableRef>) -> Result<Option<Arc<TableRef>>> {
        let view = LogicalView::parse(&table.name)
            .ok_or_else(|| PreprocessError::UnknownView(table.name.clone()))?;
        self.views.insert(view);
        Ok(None)
    }
}
