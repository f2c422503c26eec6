#![forbid(unsafe_code)]

use super::{ViewRewriter, duplicate, read_only, target_view, writer_insert, writer_row};
use crate::ast::{Insert, InsertSource, Statement};
use crate::error::{PreprocessError, Result};
use crate::views::ColumnKind;
use crate::visit::walk_expr;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub(super) fn rewrite_insert(insert: &Arc<Insert>) -> Result<Statement> {
    let view = target_view(&insert.table)?;
    if insert.columns.is_empty() {
        return Err(PreprocessError::Unsupported(
            "INSERT into a logical view needs a column list",
        ));
    }

    let mut seen = BTreeSet::new();
    for name in &insert.columns {
        let column = view.column(name)?;
        if column.kind == ColumnKind::ReadOnly {
            return Err(read_only(view, name));
        }
        if !seen.insert(column.name) {
            return Err(duplicate(view, name));
        }
    }
    if let Some(missing) = view
        .columns()
        .iter()
        .find(|column| column.required && !seen.contains(column.name))
    {
        return Err(PreprocessError::MissingColumn {
            view: view.name().to_string(),
            column: missing.name.to_string(),
        });
    }

    let InsertSource::Values(rows) = &insert.source else {
        return Err(PreprocessError::Unsupported(
            "INSERT ... SELECT into a logical view",
        ));
    };

    let mut writer_rows = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != insert.columns.len() {
            return Err(PreprocessError::Parse(format!(
                "{} values for {} columns",
                row.len(),
                insert.columns.len()
            )));
        }
        let mut values = BTreeMap::new();
        for (name, expr) in insert.columns.iter().zip(row) {
            values.insert(name.as_str(), walk_expr(&mut ViewRewriter, expr)?);
        }
        writer_rows.push(writer_row(view, &values, false));
    }
    Ok(writer_insert(InsertSource::Values(writer_rows)))
}
