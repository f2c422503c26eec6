#![forbid(unsafe_code)]

use super::{ColumnMapper, reader_values, target_view, writer_insert_from_reader, writer_row};
use crate::ast::{Delete, Statement};
use crate::error::Result;
use crate::visit::walk_expr;
use std::sync::Arc;

/// DELETE becomes a tombstone row in the writer for every matching row.
pub(super) fn rewrite_delete(delete: &Arc<Delete>) -> Result<Statement> {
    let view = target_view(&delete.table)?;
    let qualifier = delete.table.qualifier();
    let mut mapper = ColumnMapper { view, qualifier };

    let filter = delete
        .where_clause
        .as_ref()
        .map(|expr| walk_expr(&mut mapper, expr))
        .transpose()?;
    let values = reader_values(view, qualifier);
    Ok(writer_insert_from_reader(
        view,
        qualifier,
        writer_row(view, &values, true),
        filter,
    ))
}
