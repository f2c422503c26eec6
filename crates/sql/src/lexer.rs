#![forbid(unsafe_code)]

use crate::error::{PreprocessError, Result};
use std::iter::Peekable;
use std::str::Chars;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Keyword(Keyword),
    Ident(String),
    String(String),
    Number(String),
    /// `?` (None) or `?N` (Some(N)).
    Param(Option<u32>),
    Period,
    Comma,
    Semicolon,
    OpenParen,
    CloseParen,
    Asterisk,
    Plus,
    Minus,
    Slash,
    Percent,
    Concat,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword(keyword) => write!(f, "{}", keyword.as_str()),
            Self::Ident(ident) => write!(f, "{ident}"),
            Self::String(value) => write!(f, "'{value}'"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Param(None) => write!(f, "?"),
            Self::Param(Some(index)) => write!(f, "?{index}"),
            Self::Period => write!(f, "."),
            Self::Comma => write!(f, ","),
            Self::Semicolon => write!(f, ";"),
            Self::OpenParen => write!(f, "("),
            Self::CloseParen => write!(f, ")"),
            Self::Asterisk => write!(f, "*"),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Slash => write!(f, "/"),
            Self::Percent => write!(f, "%"),
            Self::Concat => write!(f, "||"),
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "<>"),
            Self::LessThan => write!(f, "<"),
            Self::LessOrEqual => write!(f, "<="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterOrEqual => write!(f, ">="),
        }
    }
}

impl From<Keyword> for Token {
    fn from(keyword: Keyword) -> Self {
        Self::Keyword(keyword)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    And,
    As,
    Asc,
    By,
    Delete,
    Desc,
    Distinct,
    False,
    From,
    In,
    Insert,
    Into,
    Is,
    Like,
    Limit,
    Not,
    Null,
    Offset,
    Or,
    Order,
    Select,
    Set,
    True,
    Update,
    Values,
    Where,
}

impl Keyword {
    pub fn parse(ident: &str) -> Option<Self> {
        Some(match ident.to_uppercase().as_str() {
            "AND" => Self::And,
            "AS" => Self::As,
            "ASC" => Self::Asc,
            "BY" => Self::By,
            "DELETE" => Self::Delete,
            "DESC" => Self::Desc,
            "DISTINCT" => Self::Distinct,
            "FALSE" => Self::False,
            "FROM" => Self::From,
            "IN" => Self::In,
            "INSERT" => Self::Insert,
            "INTO" => Self::Into,
            "IS" => Self::Is,
            "LIKE" => Self::Like,
            "LIMIT" => Self::Limit,
            "NOT" => Self::Not,
            "NULL" => Self::Null,
            "OFFSET" => Self::Offset,
            "OR" => Self::Or,
            "ORDER" => Self::Order,
            "SELECT" => Self::Select,
            "SET" => Self::Set,
            "TRUE" => Self::True,
            "UPDATE" => Self::Update,
            "VALUES" => Self::Values,
            "WHERE" => Self::Where,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::As => "AS",
            Self::Asc => "ASC",
            Self::By => "BY",
            Self::Delete => "DELETE",
            Self::Desc => "DESC",
            Self::Distinct => "DISTINCT",
            Self::False => "FALSE",
            Self::From => "FROM",
            Self::In => "IN",
            Self::Insert => "INSERT",
            Self::Into => "INTO",
            Self::Is => "IS",
            Self::Like => "LIKE",
            Self::Limit => "LIMIT",
            Self::Not => "NOT",
            Self::Null => "NULL",
            Self::Offset => "OFFSET",
            Self::Or => "OR",
            Self::Order => "ORDER",
            Self::Select => "SELECT",
            Self::Set => "SET",
            Self::True => "TRUE",
            Self::Update => "UPDATE",
            Self::Values => "VALUES",
            Self::Where => "WHERE",
        }
    }
}

/// Splits SQL text into tokens. Comments and whitespace are dropped;
/// identifiers may be double-quoted, strings single-quoted with `''` escapes.
#[derive(Clone)]
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn next_if(&mut self, predicate: impl Fn(char) -> bool) -> Option<char> {
        self.chars.peek().filter(|&&c| predicate(c))?;
        self.chars.next()
    }

    fn next_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.next_if(&predicate) {
            out.push(c);
        }
        out
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            self.next_while(char::is_whitespace);
            let mut lookahead = self.chars.clone();
            match (lookahead.next(), lookahead.next()) {
                (Some('-'), Some('-')) => {
                    self.next_while(|c| c != '\n');
                }
                (Some('/'), Some('*')) => {
                    self.chars.next();
                    self.chars.next();
                    let mut previous = '\0';
                    loop {
                        let Some(c) = self.chars.next() else {
                            return Err(PreprocessError::Lex("unterminated comment".into()));
                        };
                        if previous == '*' && c == '/' {
                            break;
                        }
                        previous = c;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace_and_comments()?;
        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };
        match c {
            '\'' => self.scan_string().map(Some),
            '"' => self.scan_quoted_ident().map(Some),
            '?' => self.scan_param().map(Some),
            c if c.is_ascii_digit() => Ok(Some(self.scan_number())),
            c if c.is_alphabetic() || c == '_' => Ok(Some(self.scan_ident())),
            _ => self.scan_symbol().map(Some),
        }
    }

    fn scan_string(&mut self) -> Result<Token> {
        self.chars.next();
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some('\'') => {
                    if self.next_if(|c| c == '\'').is_some() {
                        value.push('\'');
                    } else {
                        return Ok(Token::String(value));
                    }
                }
                Some(c) => value.push(c),
                None => return Err(PreprocessError::Lex("unterminated string literal".into())),
            }
        }
    }

    fn scan_quoted_ident(&mut self) -> Result<Token> {
        self.chars.next();
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some('"') => {
                    if self.next_if(|c| c == '"').is_some() {
                        value.push('"');
                    } else {
                        return Ok(Token::Ident(value));
                    }
                }
                Some(c) => value.push(c),
                None => return Err(PreprocessError::Lex("unterminated quoted identifier".into())),
            }
        }
    }

    fn scan_param(&mut self) -> Result<Token> {
        self.chars.next();
        let digits = self.next_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Ok(Token::Param(None));
        }
        let index = digits
            .parse::<u32>()
            .map_err(|_| PreprocessError::Lex(format!("invalid parameter index ?{digits}")))?;
        if index == 0 {
            return Err(PreprocessError::Lex("parameter indexes start at ?1".into()));
        }
        Ok(Token::Param(Some(index)))
    }

    fn scan_number(&mut self) -> Token {
        let mut value = self.next_while(|c| c.is_ascii_digit());
        let mut lookahead = self.chars.clone();
        if lookahead.next() == Some('.') && lookahead.next().is_some_and(|c| c.is_ascii_digit()) {
            self.chars.next();
            value.push('.');
            value.push_str(&self.next_while(|c| c.is_ascii_digit()));
        }
        Token::Number(value)
    }

    fn scan_ident(&mut self) -> Token {
        let ident = self.next_while(|c| c.is_alphanumeric() || c == '_');
        match Keyword::parse(&ident) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Ident(ident.to_lowercase()),
        }
    }

    fn scan_symbol(&mut self) -> Result<Token> {
        let Some(c) = self.chars.next() else {
            return Err(PreprocessError::Lex("unexpected end of input".into()));
        };
        let token = match c {
            '.' => Token::Period,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            '*' => Token::Asterisk,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '=' => {
                self.next_if(|c| c == '=');
                Token::Equal
            }
            '|' if self.next_if(|c| c == '|').is_some() => Token::Concat,
            '!' if self.next_if(|c| c == '=').is_some() => Token::NotEqual,
            '<' => {
                if self.next_if(|c| c == '=').is_some() {
                    Token::LessOrEqual
                } else if self.next_if(|c| c == '>').is_some() {
                    Token::NotEqual
                } else {
                    Token::LessThan
                }
            }
            '>' => {
                if self.next_if(|c| c == '=').is_some() {
                    Token::GreaterOrEqual
                } else {
                    Token::GreaterThan
                }
            }
            other => return Err(PreprocessError::Lex(format!("unexpected character {other:?}"))),
        };
        Ok(token)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan().transpose()
    }
}
