#![forbid(unsafe_code)]

//! Renders statements back to SQLite text.
//!
//! Output is a pure function of the tree: the same tree always yields the
//! same bytes. Parameters are emitted as `?N` so a rewrite that repeats an
//! expression keeps binding the caller's value by position.

use crate::ast::{
    Delete, Expr, Insert, InsertSource, Literal, Select, SelectItem, Statement, StatementKind,
    TableRef, UnaryOp, Update,
};
use crate::lexer::Keyword;
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledStatement {
    pub sql: String,
    /// Distinct parameter indexes referenced by `sql`, ascending.
    pub params: Vec<u32>,
    pub kind: StatementKind,
}

/// Compiles a statement; a segmented script yields one entry per segment.
pub fn compile(statement: &Statement) -> Vec<CompiledStatement> {
    let mut out = Vec::new();
    compile_into(statement, &mut out);
    out
}

fn compile_into(statement: &Statement, out: &mut Vec<CompiledStatement>) {
    if let Statement::Segmented(segmented) = statement {
        for inner in &segmented.statements {
            compile_into(inner, out);
        }
        return;
    }
    let mut writer = SqlWriter::default();
    match statement {
        Statement::Select(select) => writer.select(select),
        Statement::Insert(insert) => writer.insert(insert),
        Statement::Update(update) => writer.update(update),
        Statement::Delete(delete) => writer.delete(delete),
        Statement::Segmented(_) => {}
    }
    out.push(CompiledStatement {
        sql: writer.sql,
        params: writer.params.into_iter().collect(),
        kind: statement.kind(),
    });
}

const PRECEDENCE_NOT: u8 = 3;
const PRECEDENCE_COMPARE: u8 = 4;
const PRECEDENCE_UNARY: u8 = 9;
const PRECEDENCE_ATOM: u8 = 10;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => PRECEDENCE_NOT,
        Expr::Unary {
            op: UnaryOp::Negate,
            ..
        } => PRECEDENCE_UNARY,
        Expr::IsNull { .. } | Expr::Like { .. } | Expr::InList { .. } => PRECEDENCE_COMPARE,
        _ => PRECEDENCE_ATOM,
    }
}

#[derive(Default)]
struct SqlWriter {
    sql: String,
    params: BTreeSet<u32>,
}

impl SqlWriter {
    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn ident(&mut self, ident: &str) {
        let plain = ident
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
            && ident
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            && Keyword::parse(ident).is_none();
        if plain {
            self.sql.push_str(ident);
        } else {
            self.sql.push('"');
            self.sql.push_str(&ident.replace('"', "\"\""));
            self.sql.push('"');
        }
    }

    fn table_ref(&mut self, table: &TableRef) {
        self.ident(&table.name);
        if let Some(alias) = &table.alias {
            self.push(" AS ");
            self.ident(alias);
        }
    }

    fn select(&mut self, select: &Select) {
        self.push("SELECT ");
        if select.distinct {
            self.push("DISTINCT ");
        }
        for (i, item) in select.projection.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            match item {
                SelectItem::Wildcard => self.push("*"),
                SelectItem::QualifiedWildcard(table) => {
                    self.ident(table);
                    self.push(".*");
                }
                SelectItem::Expr { expr, alias } => {
                    self.expr(expr);
                    if let Some(alias) = alias {
                        self.push(" AS ");
                        self.ident(alias);
                    }
                }
            }
        }
        if let Some(from) = &select.from {
            self.push(" FROM ");
            self.table_ref(from);
        }
        if let Some(where_clause) = &select.where_clause {
            self.push(" WHERE ");
            self.expr(where_clause);
        }
        if !select.order_by.is_empty() {
            self.push(" ORDER BY ");
            for (i, item) in select.order_by.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.expr(&item.expr);
                if item.descending {
                    self.push(" DESC");
                }
            }
        }
        if let Some(limit) = &select.limit {
            self.push(" LIMIT ");
            self.expr(limit);
        }
        if let Some(offset) = &select.offset {
            self.push(" OFFSET ");
            self.expr(offset);
        }
    }

    fn insert(&mut self, insert: &Insert) {
        self.push("INSERT INTO ");
        self.table_ref(&insert.table);
        if !insert.columns.is_empty() {
            self.push(" (");
            for (i, column) in insert.columns.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.ident(column);
            }
            self.push(")");
        }
        match &insert.source {
            InsertSource::Values(rows) => {
                self.push(" VALUES ");
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.push("(");
                    self.expr_list(row);
                    self.push(")");
                }
            }
            InsertSource::Select(select) => {
                self.push(" ");
                self.select(select);
            }
        }
    }

    fn update(&mut self, update: &Update) {
        self.push("UPDATE ");
        self.table_ref(&update.table);
        self.push(" SET ");
        for (i, assignment) in update.assignments.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(&assignment.column);
            self.push(" = ");
            self.expr(&assignment.value);
        }
        if let Some(where_clause) = &update.where_clause {
            self.push(" WHERE ");
            self.expr(where_clause);
        }
    }

    fn delete(&mut self, delete: &Delete) {
        self.push("DELETE FROM ");
        self.table_ref(&delete.table);
        if let Some(where_clause) = &delete.where_clause {
            self.push(" WHERE ");
            self.expr(where_clause);
        }
    }

    fn expr_list(&mut self, exprs: &[std::sync::Arc<Expr>]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(expr);
        }
    }

    /// Writes `expr`, parenthesised when it binds looser than `min`.
    fn operand(&mut self, expr: &Expr, min: u8) {
        if precedence(expr) < min {
            self.push("(");
            self.expr(expr);
            self.push(")");
        } else {
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(Literal::Null) => self.push("NULL"),
            Expr::Literal(Literal::Bool(true)) => self.push("TRUE"),
            Expr::Literal(Literal::Bool(false)) => self.push("FALSE"),
            Expr::Literal(Literal::Number(value)) => self.push(value),
            Expr::Literal(Literal::String(value)) => {
                self.sql.push('\'');
                self.sql.push_str(&value.replace('\'', "''"));
                self.sql.push('\'');
            }
            Expr::Param(index) => {
                self.params.insert(*index);
                self.sql.push('?');
                self.sql.push_str(&index.to_string());
            }
            Expr::Column { table, name } => {
                if let Some(table) = table {
                    self.ident(table);
                    self.push(".");
                }
                self.ident(name);
            }
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
            } => {
                self.push("NOT ");
                self.operand(expr, PRECEDENCE_NOT);
            }
            Expr::Unary {
                op: UnaryOp::Negate,
                expr,
            } => {
                self.push("-");
                self.operand(expr, PRECEDENCE_ATOM);
            }
            Expr::Binary { op, left, right } => {
                let precedence = op.precedence();
                self.operand(left, precedence);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.operand(right, precedence + 1);
            }
            Expr::IsNull { expr, negated } => {
                self.operand(expr, PRECEDENCE_COMPARE + 1);
                self.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                self.operand(expr, PRECEDENCE_COMPARE + 1);
                self.push(if *negated { " NOT LIKE " } else { " LIKE " });
                self.operand(pattern, PRECEDENCE_COMPARE + 1);
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                self.operand(expr, PRECEDENCE_COMPARE + 1);
                self.push(if *negated { " NOT IN (" } else { " IN (" });
                self.expr_list(list);
                self.push(")");
            }
            Expr::Function { name, args } => {
                self.ident(name);
                self.push("(");
                self.expr_list(args);
                self.push(")");
            }
            Expr::Subquery(select) => {
                self.push("(");
                self.select(select);
                self.push(")");
            }
            Expr::Nested(inner) => {
                self.push("(");
                self.expr(inner);
                self.push(")");
            }
            Expr::Wildcard => self.push("*"),
        }
    }
}
