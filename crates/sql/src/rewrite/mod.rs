#![forbid(unsafe_code)]

//! Rewrites references to logical views into statements over the physical
//! reader and writer tables.

mod delete;
mod insert;
mod select;
mod update;

use crate::ast::{Expr, Insert, InsertSource, Select, SelectItem, Statement, TableRef};
use crate::error::{PreprocessError, Result};
use crate::views::{
    ColumnKind, DEFAULT_SCHEMA_VERSION, KEY_VALUE_FILE_ID, KEY_VALUE_PLUGIN_KEY,
    KEY_VALUE_SCHEMA_KEY, LogicalView, READER_TABLE, WRITER_COLUMNS, WRITER_TABLE,
    active_version_expr,
};
use crate::visit::{Visitor, walk_select, walk_statement};
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn rewrite(statement: &Statement) -> Result<Statement> {
    walk_statement(&mut ViewRewriter, statement)
}

pub(crate) struct ViewRewriter;

impl Visitor for ViewRewriter {
    fn visit_select(&mut self, select: &Arc<Select>) -> Result<Option<Arc<Select>>> {
        select::rewrite_select(select)
    }

    fn visit_insert(&mut self, insert: &Arc<crate::ast::Insert>) -> Result<Option<Statement>> {
        insert::rewrite_insert(insert).map(Some)
    }

    fn visit_update(&mut self, update: &Arc<crate::ast::Update>) -> Result<Option<Statement>> {
        update::rewrite_update(update).map(Some)
    }

    fn visit_delete(&mut self, delete: &Arc<crate::ast::Delete>) -> Result<Option<Statement>> {
        delete::rewrite_delete(delete).map(Some)
    }
}

/// Maps view columns qualified by `qualifier` (or unqualified) onto reader
/// expressions. Subqueries are rewritten in their own scope.
struct ColumnMapper<'a> {
    view: LogicalView,
    qualifier: &'a str,
}

impl Visitor for ColumnMapper<'_> {
    fn visit_expr(&mut self, expr: &Arc<Expr>) -> Result<Option<Arc<Expr>>> {
        match expr.as_ref() {
            Expr::Column { table, name } => {
                if table.as_deref().is_some_and(|table| table != self.qualifier) {
                    return Ok(None);
                }
                let column = self.view.column(name)?;
                Ok(Some(self.view.read_expr(column, self.qualifier)))
            }
            Expr::Subquery(select) => {
                let walked = walk_select(&mut ViewRewriter, select)?;
                if Arc::ptr_eq(&walked, select) {
                    return Ok(Some(Arc::clone(expr)));
                }
                Ok(Some(Arc::new(Expr::Subquery(walked))))
            }
            _ => Ok(None),
        }
    }
}

fn target_view(table: &TableRef) -> Result<LogicalView> {
    LogicalView::parse(&table.name).ok_or_else(|| PreprocessError::UnknownView(table.name.clone()))
}

fn read_only(view: LogicalView, column: &str) -> PreprocessError {
    PreprocessError::ReadOnlyColumn {
        view: view.name().to_string(),
        column: column.to_string(),
    }
}

fn duplicate(view: LogicalView, column: &str) -> PreprocessError {
    PreprocessError::DuplicateColumn {
        view: view.name().to_string(),
        column: column.to_string(),
    }
}

fn and_where(scope: Option<Arc<Expr>>, user: Option<Arc<Expr>>) -> Option<Arc<Expr>> {
    match (scope, user) {
        (Some(scope), Some(user)) => Some(Expr::and(scope, user)),
        (scope, user) => scope.or(user),
    }
}

fn reader_ref(qualifier: &str) -> Arc<TableRef> {
    Arc::new(TableRef {
        name: READER_TABLE.to_string(),
        alias: Some(qualifier.to_string()),
    })
}

/// Current values of every column a writer row is built from.
fn reader_values(view: LogicalView, qualifier: &str) -> BTreeMap<&'static str, Arc<Expr>> {
    view.columns()
        .iter()
        .filter(|column| column.kind != ColumnKind::ReadOnly || column.name == "version_id")
        .map(|column| (column.name, view.read_expr(column, qualifier)))
        .collect()
}

/// One row for the writer, in [`WRITER_COLUMNS`] order. Missing optional
/// columns take their defaults.
fn writer_row(
    view: LogicalView,
    values: &BTreeMap<&str, Arc<Expr>>,
    tombstone: bool,
) -> Vec<Arc<Expr>> {
    let value = |name: &str| values.get(name).cloned().unwrap_or_else(Expr::null);
    let version = values
        .get("version_id")
        .cloned()
        .unwrap_or_else(active_version_expr);
    let metadata = value("metadata");
    let untracked = values
        .get("untracked")
        .cloned()
        .unwrap_or_else(|| Expr::number(0));

    if view.is_key_value() {
        let key = value("key");
        let snapshot = if tombstone {
            Expr::null()
        } else {
            Expr::function(
                "json_object",
                vec![
                    Expr::string("key"),
                    Arc::clone(&key),
                    Expr::string("value"),
                    value("value"),
                ],
            )
        };
        return vec![
            key,
            Expr::string(KEY_VALUE_SCHEMA_KEY),
            Expr::string(KEY_VALUE_FILE_ID),
            Expr::string(KEY_VALUE_PLUGIN_KEY),
            snapshot,
            Expr::string(DEFAULT_SCHEMA_VERSION),
            version,
            metadata,
            untracked,
        ];
    }

    let snapshot = if tombstone {
        Expr::null()
    } else {
        value("snapshot_content")
    };
    let schema_version = values
        .get("schema_version")
        .cloned()
        .unwrap_or_else(|| Expr::string(DEFAULT_SCHEMA_VERSION));
    vec![
        value("entity_id"),
        value("schema_key"),
        value("file_id"),
        value("plugin_key"),
        snapshot,
        schema_version,
        version,
        metadata,
        untracked,
    ]
}

fn writer_insert(source: InsertSource) -> Statement {
    Statement::Insert(Arc::new(Insert {
        table: Arc::new(TableRef {
            name: WRITER_TABLE.to_string(),
            alias: None,
        }),
        columns: WRITER_COLUMNS.iter().map(|column| column.to_string()).collect(),
        source,
    }))
}

/// `INSERT INTO writer SELECT <row> FROM reader WHERE <scope> AND <filter>`.
fn writer_insert_from_reader(
    view: LogicalView,
    qualifier: &str,
    row: Vec<Arc<Expr>>,
    filter: Option<Arc<Expr>>,
) -> Statement {
    let select = Select {
        distinct: false,
        projection: row
            .into_iter()
            .map(|expr| SelectItem::Expr { expr, alias: None })
            .collect(),
        from: Some(reader_ref(qualifier)),
        where_clause: and_where(view.scope_filter(qualifier), filter),
        order_by: Vec::new(),
        limit: None,
        offset: None,
    };
    writer_insert(InsertSource::Select(Arc::new(select)))
}
