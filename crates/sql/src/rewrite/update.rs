#![forbid(unsafe_code)]

use super::{
    ColumnMapper, duplicate, read_only, reader_values, target_view, writer_insert_from_reader,
    writer_row,
};
use crate::ast::{Statement, Update};
use crate::error::Result;
use crate::views::ColumnKind;
use crate::visit::walk_expr;
use std::collections::BTreeSet;
use std::sync::Arc;

/// UPDATE becomes an insert of the changed rows into the writer: every
/// untouched column carries the row's current value.
pub(super) fn rewrite_update(update: &Arc<Update>) -> Result<Statement> {
    let view = target_view(&update.table)?;
    let qualifier = update.table.qualifier();
    let mut mapper = ColumnMapper { view, qualifier };

    let mut values = reader_values(view, qualifier);
    let mut seen = BTreeSet::new();
    for assignment in &update.assignments {
        let column = view.column(&assignment.column)?;
        if column.kind != ColumnKind::Value {
            return Err(read_only(view, &assignment.column));
        }
        if !seen.insert(column.name) {
            return Err(duplicate(view, &assignment.column));
        }
        values.insert(column.name, walk_expr(&mut mapper, &assignment.value)?);
    }

    let filter = update
        .where_clause
        .as_ref()
        .map(|expr| walk_expr(&mut mapper, expr))
        .transpose()?;
    Ok(writer_insert_from_reader(
        view,
        qualifier,
        writer_row(view, &values, false),
        filter,
    ))
}
