#![forbid(unsafe_code)]

//! Statement tree produced by the parser and consumed by the rewrite passes.
//!
//! Every child is held behind an `Arc` so a rewrite can rebuild the path to
//! a changed node while sharing every untouched subtree with the input.

use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Segmented,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Segmented => "segmented",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Select(Arc<Select>),
    Insert(Arc<Insert>),
    Update(Arc<Update>),
    Delete(Arc<Delete>),
    /// A `;`-separated script; each segment is an independent statement.
    Segmented(Arc<Segmented>),
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Self::Select(_) => StatementKind::Select,
            Self::Insert(_) => StatementKind::Insert,
            Self::Update(_) => StatementKind::Update,
            Self::Delete(_) => StatementKind::Delete,
            Self::Segmented(_) => StatementKind::Segmented,
        }
    }

    /// True when both statements share the same root allocation.
    pub fn ptr_eq(&self, other: &Statement) -> bool {
        match (self, other) {
            (Self::Select(a), Self::Select(b)) => Arc::ptr_eq(a, b),
            (Self::Insert(a), Self::Insert(b)) => Arc::ptr_eq(a, b),
            (Self::Update(a), Self::Update(b)) => Arc::ptr_eq(a, b),
            (Self::Delete(a), Self::Delete(b)) => Arc::ptr_eq(a, b),
            (Self::Segmented(a), Self::Segmented(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segmented {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    /// Name columns of this table are qualified with.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectItem {
    Wildcard,
    QualifiedWildcard(String),
    Expr {
        expr: Arc<Expr>,
        alias: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub expr: Arc<Expr>,
    pub descending: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Select {
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub from: Option<Arc<TableRef>>,
    pub where_clause: Option<Arc<Expr>>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<Arc<Expr>>,
    pub offset: Option<Arc<Expr>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertSource {
    Values(Vec<Vec<Arc<Expr>>>),
    Select(Arc<Select>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Insert {
    pub table: Arc<TableRef>,
    pub columns: Vec<String>,
    pub source: InsertSource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub column: String,
    pub value: Arc<Expr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub table: Arc<TableRef>,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Arc<Expr>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delete {
    pub table: Arc<TableRef>,
    pub where_clause: Option<Arc<Expr>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Null,
    Bool(bool),
    /// Kept as source text so compilation reproduces it exactly.
    Number(String),
    String(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Concat,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Equal | Self::NotEqual => 4,
            Self::LessThan | Self::LessOrEqual | Self::GreaterThan | Self::GreaterOrEqual => 5,
            Self::Add | Self::Subtract => 6,
            Self::Multiply | Self::Divide | Self::Modulo => 7,
            Self::Concat => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Or => "OR",
            Self::And => "AND",
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::Concat => "||",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Literal(Literal),
    /// 1-based parameter index.
    Param(u32),
    Column {
        table: Option<String>,
        name: String,
    },
    Unary {
        op: UnaryOp,
        expr: Arc<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Arc<Expr>,
        right: Arc<Expr>,
    },
    IsNull {
        expr: Arc<Expr>,
        negated: bool,
    },
    Like {
        expr: Arc<Expr>,
        pattern: Arc<Expr>,
        negated: bool,
    },
    InList {
        expr: Arc<Expr>,
        list: Vec<Arc<Expr>>,
        negated: bool,
    },
    Function {
        name: String,
        args: Vec<Arc<Expr>>,
    },
    Subquery(Arc<Select>),
    Nested(Arc<Expr>),
    /// `*` inside a function call, as in `count(*)`.
    Wildcard,
}

impl Expr {
    pub fn null() -> Arc<Expr> {
        Arc::new(Expr::Literal(Literal::Null))
    }

    pub fn string(value: impl Into<String>) -> Arc<Expr> {
        Arc::new(Expr::Literal(Literal::String(value.into())))
    }

    pub fn number(value: i64) -> Arc<Expr> {
        Arc::new(Expr::Literal(Literal::Number(value.to_string())))
    }

    pub fn column(table: impl Into<String>, name: impl Into<String>) -> Arc<Expr> {
        Arc::new(Expr::Column {
            table: Some(table.into()),
            name: name.into(),
        })
    }

    pub fn function(name: impl Into<String>, args: Vec<Arc<Expr>>) -> Arc<Expr> {
        Arc::new(Expr::Function {
            name: name.into(),
            args,
        })
    }

    pub fn binary(op: BinaryOp, left: Arc<Expr>, right: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Binary { op, left, right })
    }

    pub fn and(left: Arc<Expr>, right: Arc<Expr>) -> Arc<Expr> {
        Self::binary(BinaryOp::And, left, right)
    }

    pub fn eq(left: Arc<Expr>, right: Arc<Expr>) -> Arc<Expr> {
        Self::binary(BinaryOp::Equal, left, right)
    }
}
