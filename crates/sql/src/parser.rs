#![forbid(unsafe_code)]

use crate::ast::{
    Assignment, BinaryOp, Delete, Expr, Insert, InsertSource, Literal, OrderBy, Segmented, Select,
    SelectItem, Statement, TableRef, UnaryOp, Update,
};
use crate::error::{PreprocessError, Result};
use crate::lexer::{Keyword, Lexer, Token};
use std::iter::Peekable;
use std::sync::Arc;

const PRECEDENCE_NOT: u8 = 3;
const PRECEDENCE_COMPARE: u8 = 4;
const PRECEDENCE_UNARY: u8 = 9;

/// Parses a script into a single statement. Several `;`-separated statements
/// come back as [`Statement::Segmented`].
pub fn parse(sql: &str) -> Result<Statement> {
    Parser::new(sql).parse_script()
}

/// Recursive-descent parser with precedence climbing for expressions.
///
/// Bare `?` placeholders are numbered the way SQLite numbers them: one past
/// the largest index seen so far in the script.
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
    max_param: u32,
}

impl<'a> Parser<'a> {
    pub fn new(sql: &'a str) -> Self {
        Self {
            lexer: Lexer::new(sql).peekable(),
            max_param: 0,
        }
    }

    pub fn parse_script(&mut self) -> Result<Statement> {
        let mut statements = Vec::new();
        loop {
            while self.next_is(Token::Semicolon)? {}
            if self.peek()?.is_none() {
                break;
            }
            statements.push(self.parse_statement()?);
            match self.next()? {
                None => break,
                Some(Token::Semicolon) => continue,
                Some(token) => {
                    return Err(PreprocessError::Parse(format!("unexpected token {token}")));
                }
            }
        }
        match statements.len() {
            0 => Err(PreprocessError::Parse("empty statement".into())),
            1 => Ok(statements.remove(0)),
            _ => Ok(Statement::Segmented(Arc::new(Segmented { statements }))),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Select)) => Ok(Statement::Select(self.parse_select()?)),
            Some(Token::Keyword(Keyword::Insert)) => self.parse_insert(),
            Some(Token::Keyword(Keyword::Update)) => self.parse_update(),
            Some(Token::Keyword(Keyword::Delete)) => self.parse_delete(),
            Some(token) => Err(PreprocessError::Parse(format!("unexpected token {token}"))),
            None => Err(PreprocessError::Parse("unexpected end of input".into())),
        }
    }

    fn parse_select(&mut self) -> Result<Arc<Select>> {
        self.expect(Keyword::Select.into())?;
        let distinct = self.next_is(Keyword::Distinct.into())?;

        let mut projection = vec![self.parse_select_item()?];
        while self.next_is(Token::Comma)? {
            projection.push(self.parse_select_item()?);
        }

        let from = if self.next_is(Keyword::From.into())? {
            Some(self.parse_table_ref()?)
        } else {
            None
        };
        let where_clause = self.parse_where()?;

        let mut order_by = Vec::new();
        if self.next_is(Keyword::Order.into())? {
            self.expect(Keyword::By.into())?;
            loop {
                let expr = self.parse_expression()?;
                let descending = if self.next_is(Keyword::Desc.into())? {
                    true
                } else {
                    self.next_is(Keyword::Asc.into())?;
                    false
                };
                order_by.push(OrderBy { expr, descending });
                if !self.next_is(Token::Comma)? {
                    break;
                }
            }
        }

        let mut limit = None;
        let mut offset = None;
        if self.next_is(Keyword::Limit.into())? {
            limit = Some(self.parse_expression()?);
            if self.next_is(Keyword::Offset.into())? {
                offset = Some(self.parse_expression()?);
            }
        }

        Ok(Arc::new(Select {
            distinct,
            projection,
            from,
            where_clause,
            order_by,
            limit,
            offset,
        }))
    }

    fn parse_select_item(&mut self) -> Result<SelectItem> {
        if self.next_is(Token::Asterisk)? {
            return Ok(SelectItem::Wildcard);
        }
        let mut ahead = self.lexer.clone();
        if let (Some(Ok(Token::Ident(table))), Some(Ok(Token::Period)), Some(Ok(Token::Asterisk))) =
            (ahead.next(), ahead.next(), ahead.next())
        {
            self.lexer = ahead;
            return Ok(SelectItem::QualifiedWildcard(table));
        }

        let expr = self.parse_expression()?;
        let alias = self.parse_alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    fn parse_alias(&mut self) -> Result<Option<String>> {
        if self.next_is(Keyword::As.into())? {
            return self.next_ident().map(Some);
        }
        if let Some(Token::Ident(_)) = self.peek()? {
            return self.next_ident().map(Some);
        }
        Ok(None)
    }

    fn parse_table_ref(&mut self) -> Result<Arc<TableRef>> {
        let name = self.next_ident()?;
        let alias = self.parse_alias()?;
        Ok(Arc::new(TableRef { name, alias }))
    }

    fn parse_where(&mut self) -> Result<Option<Arc<Expr>>> {
        if self.next_is(Keyword::Where.into())? {
            Ok(Some(self.parse_expression()?))
        } else {
            Ok(None)
        }
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect(Keyword::Insert.into())?;
        self.expect(Keyword::Into.into())?;
        let table = self.parse_table_ref()?;

        let mut columns = Vec::new();
        if self.next_is(Token::OpenParen)? {
            loop {
                columns.push(self.next_ident()?);
                if !self.next_is(Token::Comma)? {
                    break;
                }
            }
            self.expect(Token::CloseParen)?;
        }

        let source = match self.peek()? {
            Some(Token::Keyword(Keyword::Select)) => InsertSource::Select(self.parse_select()?),
            _ => {
                self.expect(Keyword::Values.into())?;
                let mut rows = Vec::new();
                loop {
                    self.expect(Token::OpenParen)?;
                    let mut row = vec![self.parse_expression()?];
                    while self.next_is(Token::Comma)? {
                        row.push(self.parse_expression()?);
                    }
                    self.expect(Token::CloseParen)?;
                    rows.push(row);
                    if !self.next_is(Token::Comma)? {
                        break;
                    }
                }
                InsertSource::Values(rows)
            }
        };

        Ok(Statement::Insert(Arc::new(Insert {
            table,
            columns,
            source,
        })))
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.expect(Keyword::Update.into())?;
        let table = self.parse_table_ref()?;
        self.expect(Keyword::Set.into())?;
        let mut assignments = Vec::new();
        loop {
            let column = self.next_ident()?;
            self.expect(Token::Equal)?;
            let value = self.parse_expression()?;
            assignments.push(Assignment { column, value });
            if !self.next_is(Token::Comma)? {
                break;
            }
        }
        let where_clause = self.parse_where()?;
        Ok(Statement::Update(Arc::new(Update {
            table,
            assignments,
            where_clause,
        })))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect(Keyword::Delete.into())?;
        self.expect(Keyword::From.into())?;
        let table = self.parse_table_ref()?;
        let where_clause = self.parse_where()?;
        Ok(Statement::Delete(Arc::new(Delete {
            table,
            where_clause,
        })))
    }

    pub fn parse_expression(&mut self) -> Result<Arc<Expr>> {
        self.parse_expression_at(0)
    }

    fn parse_expression_at(&mut self, min_precedence: u8) -> Result<Arc<Expr>> {
        let mut lhs = if min_precedence <= PRECEDENCE_NOT && self.next_is(Keyword::Not.into())? {
            let expr = self.parse_expression_at(PRECEDENCE_NOT)?;
            Arc::new(Expr::Unary {
                op: UnaryOp::Not,
                expr,
            })
        } else if self.next_is(Token::Minus)? {
            let expr = self.parse_expression_at(PRECEDENCE_UNARY)?;
            Arc::new(Expr::Unary {
                op: UnaryOp::Negate,
                expr,
            })
        } else if self.next_is(Token::Plus)? {
            self.parse_expression_at(PRECEDENCE_UNARY)?
        } else {
            self.parse_atom()?
        };

        loop {
            if min_precedence <= PRECEDENCE_COMPARE {
                if let Some(postfix) = self.parse_postfix(&lhs)? {
                    lhs = postfix;
                    continue;
                }
            }
            let Some(op) = self.peek_binary_op()? else {
                break;
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.next()?;
            let rhs = self.parse_expression_at(precedence + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    /// `IS [NOT] NULL`, `[NOT] LIKE`, `[NOT] IN (...)`.
    fn parse_postfix(&mut self, lhs: &Arc<Expr>) -> Result<Option<Arc<Expr>>> {
        if self.next_is(Keyword::Is.into())? {
            let negated = self.next_is(Keyword::Not.into())?;
            self.expect(Keyword::Null.into())?;
            return Ok(Some(Arc::new(Expr::IsNull {
                expr: Arc::clone(lhs),
                negated,
            })));
        }

        let mut ahead = self.lexer.clone();
        let negated = matches!(ahead.peek(), Some(Ok(Token::Keyword(Keyword::Not))));
        if negated {
            ahead.next();
        }
        match ahead.next() {
            Some(Ok(Token::Keyword(Keyword::Like))) => {
                self.lexer = ahead;
                let pattern = self.parse_expression_at(PRECEDENCE_COMPARE + 1)?;
                Ok(Some(Arc::new(Expr::Like {
                    expr: Arc::clone(lhs),
                    pattern,
                    negated,
                })))
            }
            Some(Ok(Token::Keyword(Keyword::In))) => {
                self.lexer = ahead;
                self.expect(Token::OpenParen)?;
                let mut list = Vec::new();
                if !self.next_is(Token::CloseParen)? {
                    loop {
                        list.push(self.parse_expression()?);
                        if !self.next_is(Token::Comma)? {
                            break;
                        }
                    }
                    self.expect(Token::CloseParen)?;
                }
                Ok(Some(Arc::new(Expr::InList {
                    expr: Arc::clone(lhs),
                    list,
                    negated,
                })))
            }
            _ => Ok(None),
        }
    }

    fn peek_binary_op(&mut self) -> Result<Option<BinaryOp>> {
        Ok(match self.peek()? {
            Some(Token::Keyword(Keyword::Or)) => Some(BinaryOp::Or),
            Some(Token::Keyword(Keyword::And)) => Some(BinaryOp::And),
            Some(Token::Equal) => Some(BinaryOp::Equal),
            Some(Token::NotEqual) => Some(BinaryOp::NotEqual),
            Some(Token::LessThan) => Some(BinaryOp::LessThan),
            Some(Token::LessOrEqual) => Some(BinaryOp::LessOrEqual),
            Some(Token::GreaterThan) => Some(BinaryOp::GreaterThan),
            Some(Token::GreaterOrEqual) => Some(BinaryOp::GreaterOrEqual),
            Some(Token::Concat) => Some(BinaryOp::Concat),
            Some(Token::Plus) => Some(BinaryOp::Add),
            Some(Token::Minus) => Some(BinaryOp::Subtract),
            Some(Token::Asterisk) => Some(BinaryOp::Multiply),
            Some(Token::Slash) => Some(BinaryOp::Divide),
            Some(Token::Percent) => Some(BinaryOp::Modulo),
            _ => None,
        })
    }

    fn parse_atom(&mut self) -> Result<Arc<Expr>> {
        let Some(token) = self.next()? else {
            return Err(PreprocessError::Parse(
                "unexpected end of input, expected an expression".into(),
            ));
        };
        let expr = match token {
            Token::Number(value) => Expr::Literal(Literal::Number(value)),
            Token::String(value) => Expr::Literal(Literal::String(value)),
            Token::Keyword(Keyword::Null) => Expr::Literal(Literal::Null),
            Token::Keyword(Keyword::True) => Expr::Literal(Literal::Bool(true)),
            Token::Keyword(Keyword::False) => Expr::Literal(Literal::Bool(false)),
            Token::Param(None) => {
                self.max_param += 1;
                Expr::Param(self.max_param)
            }
            Token::Param(Some(index)) => {
                self.max_param = self.max_param.max(index);
                Expr::Param(index)
            }
            Token::Ident(name) => {
                if self.next_is(Token::OpenParen)? {
                    let mut args = Vec::new();
                    if self.next_is(Token::Asterisk)? {
                        args.push(Arc::new(Expr::Wildcard));
                        self.expect(Token::CloseParen)?;
                    } else if !self.next_is(Token::CloseParen)? {
                        loop {
                            args.push(self.parse_expression()?);
                            if !self.next_is(Token::Comma)? {
                                break;
                            }
                        }
                        self.expect(Token::CloseParen)?;
                    }
                    Expr::Function { name, args }
                } else if self.next_is(Token::Period)? {
                    Expr::Column {
                        table: Some(name),
                        name: self.next_ident()?,
                    }
                } else {
                    Expr::Column { table: None, name }
                }
            }
            Token::OpenParen => {
                let expr = if let Some(Token::Keyword(Keyword::Select)) = self.peek()? {
                    Expr::Subquery(self.parse_select()?)
                } else {
                    Expr::Nested(self.parse_expression()?)
                };
                self.expect(Token::CloseParen)?;
                expr
            }
            token => {
                return Err(PreprocessError::Parse(format!(
                    "expected an expression, found {token}"
                )));
            }
        };
        Ok(Arc::new(expr))
    }

    fn peek(&mut self) -> Result<Option<&Token>> {
        self.lexer
            .peek()
            .map(|result| result.as_ref().map_err(Clone::clone))
            .transpose()
    }

    fn next(&mut self) -> Result<Option<Token>> {
        self.lexer.next().transpose()
    }

    fn next_is(&mut self, token: Token) -> Result<bool> {
        if self.peek()? == Some(&token) {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Some(Token::Ident(ident)) => Ok(ident),
            Some(token) => Err(PreprocessError::Parse(format!(
                "expected identifier, found {token}"
            ))),
            None => Err(PreprocessError::Parse(
                "expected identifier, found end of input".into(),
            )),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next()? {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(PreprocessError::Parse(format!(
                "expected {expected}, found {token}"
            ))),
            None => Err(PreprocessError::Parse(format!(
                "expected {expected}, found end of input"
            ))),
        }
    }
}
