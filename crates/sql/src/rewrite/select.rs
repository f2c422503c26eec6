#![forbid(unsafe_code)]

use super::{ColumnMapper, and_where, reader_ref};
use crate::ast::{Expr, OrderBy, Select, SelectItem};
use crate::error::{PreprocessError, Result};
use crate::views::LogicalView;
use crate::visit::walk_expr;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Rewrites a SELECT over a logical view. Selects over anything else are left
/// to the generic walk so their subqueries still get rewritten.
pub(super) fn rewrite_select(select: &Arc<Select>) -> Result<Option<Arc<Select>>> {
    let Some(from) = &select.from else {
        return Ok(None);
    };
    let Some(view) = LogicalView::parse(&from.name) else {
        return Ok(None);
    };
    let qualifier = from.qualifier();
    let mut mapper = ColumnMapper { view, qualifier };

    let mut projection = Vec::with_capacity(select.projection.len());
    for item in &select.projection {
        match item {
            SelectItem::Wildcard => expand_wildcard(view, qualifier, &mut projection),
            SelectItem::QualifiedWildcard(table) if table == qualifier => {
                expand_wildcard(view, qualifier, &mut projection)
            }
            SelectItem::QualifiedWildcard(table) => {
                return Err(PreprocessError::UnknownView(table.clone()));
            }
            SelectItem::Expr { expr, alias } => {
                let alias = alias.clone().or_else(|| match expr.as_ref() {
                    Expr::Column { name, .. } => Some(name.clone()),
                    _ => None,
                });
                projection.push(SelectItem::Expr {
                    expr: walk_expr(&mut mapper, expr)?,
                    alias,
                });
            }
        }
    }

    let aliases: BTreeSet<&str> = projection
        .iter()
        .filter_map(|item| match item {
            SelectItem::Expr {
                alias: Some(alias), ..
            } => Some(alias.as_str()),
            _ => None,
        })
        .collect();

    let mut order_by = Vec::with_capacity(select.order_by.len());
    for item in &select.order_by {
        let names_alias = matches!(
            item.expr.as_ref(),
            Expr::Column { table: None, name } if aliases.contains(name.as_str())
        );
        let expr = if names_alias {
            Arc::clone(&item.expr)
        } else {
            walk_expr(&mut mapper, &item.expr)?
        };
        order_by.push(OrderBy {
            expr,
            descending: item.descending,
        });
    }

    let where_clause = select
        .where_clause
        .as_ref()
        .map(|expr| walk_expr(&mut mapper, expr))
        .transpose()?;
    let limit = select
        .limit
        .as_ref()
        .map(|expr| walk_expr(&mut mapper, expr))
        .transpose()?;
    let offset = select
        .offset
        .as_ref()
        .map(|expr| walk_expr(&mut mapper, expr))
        .transpose()?;

    Ok(Some(Arc::new(Select {
        distinct: select.distinct,
        projection,
        from: Some(reader_ref(qualifier)),
        where_clause: and_where(view.scope_filter(qualifier), where_clause),
        order_by,
        limit,
        offset,
    })))
}

fn expand_wildcard(view: LogicalView, qualifier: &str, projection: &mut Vec<SelectItem>) {
    for column in view.columns() {
        projection.push(SelectItem::Expr {
            expr: view.read_expr(column, qualifier),
            alias: Some(column.name.to_string()),
        });
    }
}
