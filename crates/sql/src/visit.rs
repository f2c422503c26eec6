#![forbid(unsafe_code)]

//! Pre-order traversal over the statement tree.
//!
//! A handler returning `Some` replaces the node and the walk does not descend
//! into the replacement. Returning `None` walks the children; a node whose
//! children all come back pointer-equal is returned as the same `Arc`.

use crate::ast::{
    Assignment, Delete, Expr, Insert, InsertSource, OrderBy, Segmented, Select, SelectItem,
    Statement, TableRef, Update,
};
use crate::error::Result;
use std::sync::Arc;

pub trait Visitor {
    fn visit_select(&mut self, _select: &Arc<Select>) -> Result<Option<Arc<Select>>> {
        Ok(None)
    }

    fn visit_insert(&mut self, _insert: &Arc<Insert>) -> Result<Option<Statement>> {
        Ok(None)
    }

    fn visit_update(&mut self, _update: &Arc<Update>) -> Result<Option<Statement>> {
        Ok(None)
    }

    fn visit_delete(&mut self, _delete: &Arc<Delete>) -> Result<Option<Statement>> {
        Ok(None)
    }

    fn visit_table_ref(&mut self, _table: &Arc<TableRef>) -> Result<Option<Arc<TableRef>>> {
        Ok(None)
    }

    fn visit_expr(&mut self, _expr: &Arc<Expr>) -> Result<Option<Arc<Expr>>> {
        Ok(None)
    }
}

pub fn walk_statement<V: Visitor + ?Sized>(
    visitor: &mut V,
    statement: &Statement,
) -> Result<Statement> {
    match statement {
        Statement::Select(select) => {
            let walked = walk_select(visitor, select)?;
            if Arc::ptr_eq(&walked, select) {
                return Ok(statement.clone());
            }
            Ok(Statement::Select(walked))
        }
        Statement::Insert(insert) => walk_insert(visitor, insert),
        Statement::Update(update) => walk_update(visitor, update),
        Statement::Delete(delete) => walk_delete(visitor, delete),
        Statement::Segmented(segmented) => {
            let mut changed = false;
            let mut statements = Vec::with_capacity(segmented.statements.len());
            for inner in &segmented.statements {
                let walked = walk_statement(visitor, inner)?;
                changed |= !walked.ptr_eq(inner);
                statements.push(walked);
            }
            if !changed {
                return Ok(statement.clone());
            }
            Ok(Statement::Segmented(Arc::new(Segmented { statements })))
        }
    }
}

pub fn walk_select<V: Visitor + ?Sized>(visitor: &mut V, select: &Arc<Select>) -> Result<Arc<Select>> {
    if let Some(replaced) = visitor.visit_select(select)? {
        return Ok(replaced);
    }
    let mut changed = false;

    let mut projection = Vec::with_capacity(select.projection.len());
    for item in &select.projection {
        match item {
            SelectItem::Expr { expr, alias } => {
                let walked = walk_expr(visitor, expr)?;
                changed |= !Arc::ptr_eq(&walked, expr);
                projection.push(SelectItem::Expr {
                    expr: walked,
                    alias: alias.clone(),
                });
            }
            other => projection.push(other.clone()),
        }
    }

    let from = match &select.from {
        Some(table) => {
            let walked = walk_table_ref(visitor, table)?;
            changed |= !Arc::ptr_eq(&walked, table);
            Some(walked)
        }
        None => None,
    };
    let where_clause = walk_optional(visitor, &select.where_clause, &mut changed)?;

    let mut order_by = Vec::with_capacity(select.order_by.len());
    for item in &select.order_by {
        let walked = walk_expr(visitor, &item.expr)?;
        changed |= !Arc::ptr_eq(&walked, &item.expr);
        order_by.push(OrderBy {
            expr: walked,
            descending: item.descending,
        });
    }

    let limit = walk_optional(visitor, &select.limit, &mut changed)?;
    let offset = walk_optional(visitor, &select.offset, &mut changed)?;

    if !changed {
        return Ok(Arc::clone(select));
    }
    Ok(Arc::new(Select {
        distinct: select.distinct,
        projection,
        from,
        where_clause,
        order_by,
        limit,
        offset,
    }))
}

fn walk_insert<V: Visitor + ?Sized>(visitor: &mut V, insert: &Arc<Insert>) -> Result<Statement> {
    if let Some(replaced) = visitor.visit_insert(insert)? {
        return Ok(replaced);
    }
    let mut changed = false;
    let table = walk_table_ref(visitor, &insert.table)?;
    changed |= !Arc::ptr_eq(&table, &insert.table);

    let source = match &insert.source {
        InsertSource::Values(rows) => {
            let mut walked_rows = Vec::with_capacity(rows.len());
            for row in rows {
                walked_rows.push(walk_list(visitor, row, &mut changed)?);
            }
            InsertSource::Values(walked_rows)
        }
        InsertSource::Select(select) => {
            let walked = walk_select(visitor, select)?;
            changed |= !Arc::ptr_eq(&walked, select);
            InsertSource::Select(walked)
        }
    };

    if !changed {
        return Ok(Statement::Insert(Arc::clone(insert)));
    }
    Ok(Statement::Insert(Arc::new(Insert {
        table,
        columns: insert.columns.clone(),
        source,
    })))
}

fn walk_update<V: Visitor + ?Sized>(visitor: &mut V, update: &Arc<Update>) -> Result<Statement> {
    if let Some(replaced) = visitor.visit_update(update)? {
        return Ok(replaced);
    }
    let mut changed = false;
    let table = walk_table_ref(visitor, &update.table)?;
    changed |= !Arc::ptr_eq(&table, &update.table);

    let mut assignments = Vec::with_capacity(update.assignments.len());
    for assignment in &update.assignments {
        let value = walk_expr(visitor, &assignment.value)?;
        changed |= !Arc::ptr_eq(&value, &assignment.value);
        assignments.push(Assignment {
            column: assignment.column.clone(),
            value,
        });
    }
    let where_clause = walk_optional(visitor, &update.where_clause, &mut changed)?;

    if !changed {
        return Ok(Statement::Update(Arc::clone(update)));
    }
    Ok(Statement::Update(Arc::new(Update {
        table,
        assignments,
        where_clause,
    })))
}

fn walk_delete<V: Visitor + ?Sized>(visitor: &mut V, delete: &Arc<Delete>) -> Result<Statement> {
    if let Some(replaced) = visitor.visit_delete(delete)? {
        return Ok(replaced);
    }
    let mut changed = false;
    let table = walk_table_ref(visitor, &delete.table)?;
    changed |= !Arc::ptr_eq(&table, &delete.table);
    let where_clause = walk_optional(visitor, &delete.where_clause, &mut changed)?;

    if !changed {
        return Ok(Statement::Delete(Arc::clone(delete)));
    }
    Ok(Statement::Delete(Arc::new(Delete {
        table,
        where_clause,
    })))
}

fn walk_table_ref<V: Visitor + ?Sized>(
    visitor: &mut V,
    table: &Arc<TableRef>,
) -> Result<Arc<TableRef>> {
    Ok(visitor
        .visit_table_ref(table)?
        .unwrap_or_else(|| Arc::clone(table)))
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Arc<Expr>) -> Result<Arc<Expr>> {
    if let Some(replaced) = visitor.visit_expr(expr)? {
        return Ok(replaced);
    }
    let mut changed = false;
    let rebuilt = match expr.as_ref() {
        Expr::Literal(_) | Expr::Param(_) | Expr::Column { .. } | Expr::Wildcard => {
            return Ok(Arc::clone(expr));
        }
        Expr::Unary { op, expr: inner } => Expr::Unary {
            op: *op,
            expr: walk_child(visitor, inner, &mut changed)?,
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: walk_child(visitor, left, &mut changed)?,
            right: walk_child(visitor, right, &mut changed)?,
        },
        Expr::IsNull { expr: inner, negated } => Expr::IsNull {
            expr: walk_child(visitor, inner, &mut changed)?,
            negated: *negated,
        },
        Expr::Like {
            expr: inner,
            pattern,
            negated,
        } => Expr::Like {
            expr: walk_child(visitor, inner, &mut changed)?,
            pattern: walk_child(visitor, pattern, &mut changed)?,
            negated: *negated,
        },
        Expr::InList {
            expr: inner,
            list,
            negated,
        } => Expr::InList {
            expr: walk_child(visitor, inner, &mut changed)?,
            list: walk_list(visitor, list, &mut changed)?,
            negated: *negated,
        },
        Expr::Function { name, args } => Expr::Function {
            name: name.clone(),
            args: walk_list(visitor, args, &mut changed)?,
        },
        Expr::Subquery(select) => {
            let walked = walk_select(visitor, select)?;
            changed |= !Arc::ptr_eq(&walked, select);
            Expr::Subquery(walked)
        }
        Expr::Nested(inner) => Expr::Nested(walk_child(visitor, inner, &mut changed)?),
    };
    if !changed {
        return Ok(Arc::clone(expr));
    }
    Ok(Arc::new(rebuilt))
}

fn walk_child<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Arc<Expr>,
    changed: &mut bool,
) -> Result<Arc<Expr>> {
    let walked = walk_expr(visitor, expr)?;
    *changed |= !Arc::ptr_eq(&walked, expr);
    Ok(walked)
}

fn walk_list<V: Visitor + ?Sized>(
    visitor: &mut V,
    exprs: &[Arc<Expr>],
    changed: &mut bool,
) -> Result<Vec<Arc<Expr>>> {
    exprs
        .iter()
        .map(|expr| walk_child(visitor, expr, changed))
        .collect()
}

fn walk_optional<V: Visitor + ?Sized>(
    visitor: &mut V,
    expr: &Option<Arc<Expr>>,
    changed: &mut bool,
) -> Result<Option<Arc<Expr>>> {
    expr.as_ref()
        .map(|expr| walk_child(visitor, expr, changed))
        .transpose()
}
