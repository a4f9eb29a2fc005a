// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! The condition language: a tagged-variant `Expr` AST and a small
//! recursive-descent compiler from source text. Conditions are always a
//! compiled AST, never a source-language runtime `eval`.
//!
//! Grammar (loosest to tightest binding):
//!
//! ```text
//! expr     := or_expr
//! or_expr  := and_expr ( "or" and_expr )*
//! and_expr := unary ( "and" unary )*
//! unary    := "not" unary | cmp
//! cmp      := primary ( ("==" | "!=" | "in" | "starts_with") primary )?
//! primary  := literal | path | "(" expr ")"
//! ```
//!
//! No function calls, no arithmetic, no arbitrary code execution — the
//! language is deliberately closed to what this grammar can express.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{AgentMeshError, Result};

/// A dynamic value flowing through context dictionaries and literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Look up a dotted path (`"data.user.id"`) within this value, treating
    /// any missing component as [`Value::Null`] rather than an error.
    pub fn get_path(&self, path: &str) -> Value {
        let mut current = self;
        for segment in path.split('.') {
            match current {
                Value::Map(map) => match map.get(segment) {
                    Some(value) => current = value,
                    None => return Value::Null,
                },
                _ => return Value::Null,
            }
        }
        current.clone()
    }

    fn as_bool(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    fn contains(&self, needle: &Value) -> bool {
        match self {
            Value::List(items) => items.contains(needle),
            Value::Map(map) => match needle {
                Value::String(key) => map.contains_key(key),
                _ => false,
            },
            _ => false,
        }
    }

    fn starts_with(&self, prefix: &Value) -> bool {
        match (self, prefix) {
            (Value::String(s), Value::String(p)) => s.starts_with(p.as_str()),
            _ => false,
        }
    }
}

/// A comparison operator between two sub-expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    In,
    StartsWith,
}

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
}

/// A logical combinator over two boolean sub-expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// The compiled condition AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Value),
    Path(String),
    Binop(BinOp, Box<Expr>, Box<Expr>),
    Unop(UnOp, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
}

/// Evaluate `expr` against `context`, returning the resulting boolean
/// [`Value`]. Comparisons between incompatible types (e.g. `Int == String`)
/// evaluate to `false` rather than erroring — the language has no partial
/// functions.
pub fn eval(expr: &Expr, context: &Value) -> Value {
    match expr {
        Expr::Lit(value) => value.clone(),
        Expr::Path(path) => context.get_path(path),
        Expr::Unop(UnOp::Not, inner) => Value::Bool(!eval(inner, context).as_bool()),
        Expr::Logical(op, lhs, rhs) => {
            let left = eval(lhs, context).as_bool();
            match op {
                LogicalOp::And => Value::Bool(left && eval(rhs, context).as_bool()),
                LogicalOp::Or => Value::Bool(left || eval(rhs, context).as_bool()),
            }
        }
        Expr::Binop(op, lhs, rhs) => {
            let left = eval(lhs, context);
            let right = eval(rhs, context);
            let result = match op {
                BinOp::Eq => left == right,
                BinOp::Ne => left != right,
                BinOp::In => right.contains(&left),
                BinOp::StartsWith => left.starts_with(&right),
            };
            Value::Bool(result)
        }
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Eq,
    Ne,
    LParen,
    RParen,
    Eof,
}

struct Lexer<'a> {
    chars: core::iter::Peekable<core::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self { chars: source.chars().peekable() }
    }

    fn next_token(&mut self) -> Result<Token> {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
        let Some(&c) = self.chars.peek() else {
            return Ok(Token::Eof);
        };
        match c {
            '(' => {
                self.chars.next();
                Ok(Token::LParen)
            }
            ')' => {
                self.chars.next();
                Ok(Token::RParen)
            }
            '=' => {
                self.chars.next();
                if self.chars.peek() == Some(&'=') {
                    self.chars.next();
                    Ok(Token::Eq)
                } else {
                    Err(AgentMeshError::PolicyInvalid("expected '==' ".to_string()))
                }
            }
            '!' => {
                self.chars.next();
                if self.chars.peek() == Some(&'=') {
                    self.chars.next();
                    Ok(Token::Ne)
                } else {
                    Err(AgentMeshError::PolicyInvalid("expected '!=' ".to_string()))
                }
            }
            '\'' | '"' => {
                let quote = c;
                self.chars.next();
                let mut s = String::new();
                for next in self.chars.by_ref() {
                    if next == quote {
                        return Ok(Token::Str(s));
                    }
                    s.push(next);
                }
                Err(AgentMeshError::PolicyInvalid("unterminated string literal".to_string()))
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut s = String::new();
                s.push(c);
                self.chars.next();
                let mut is_float = false;
                while let Some(&n) = self.chars.peek() {
                    if n.is_ascii_digit() {
                        s.push(n);
                        self.chars.next();
                    } else if n == '.' && !is_float {
                        is_float = true;
                        s.push(n);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                if is_float {
                    s.parse::<f64>()
                        .map(Token::Float)
                        .map_err(|_| AgentMeshError::PolicyInvalid(format!("bad float literal: {s}")))
                } else {
                    s.parse::<i64>()
                        .map(Token::Int)
                        .map_err(|_| AgentMeshError::PolicyInvalid(format!("bad int literal: {s}")))
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&n) = self.chars.peek() {
                    if n.is_alphanumeric() || n == '_' || n == '.' {
                        s.push(n);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                Ok(Token::Ident(s))
            }
            other => Err(AgentMeshError::PolicyInvalid(format!("unexpected character '{other}'"))),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token == Token::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat_ident(&mut self, expected: &str) -> bool {
        if let Token::Ident(name) = self.peek() {
            if name.eq_ignore_ascii_case(expected) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat_ident("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Logical(LogicalOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.eat_ident("and") {
            let rhs = self.parse_unary()?;
            lhs = Expr::Logical(LogicalOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat_ident("not") {
            let inner = self.parse_unary()?;
            return Ok(Expr::Unop(UnOp::Not, Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let lhs = self.parse_primary()?;
        match self.peek().clone() {
            Token::Eq => {
                self.advance();
                let rhs = self.parse_primary()?;
                Ok(Expr::Binop(BinOp::Eq, Box::new(lhs), Box::new(rhs)))
            }
            Token::Ne => {
                self.advance();
                let rhs = self.parse_primary()?;
                Ok(Expr::Binop(BinOp::Ne, Box::new(lhs), Box::new(rhs)))
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("in") => {
                self.advance();
                let rhs = self.parse_primary()?;
                Ok(Expr::Binop(BinOp::In, Box::new(lhs), Box::new(rhs)))
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("starts_with") => {
                self.advance();
                let rhs = self.parse_primary()?;
                Ok(Expr::Binop(BinOp::StartsWith, Box::new(lhs), Box::new(rhs)))
            }
            _ => Ok(lhs),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Token::LParen => {
                let inner = self.parse_expr()?;
                if self.advance() != Token::RParen {
                    return Err(AgentMeshError::PolicyInvalid("expected closing ')'".to_string()));
                }
                Ok(inner)
            }
            Token::Str(s) => Ok(Expr::Lit(Value::String(s))),
            Token::Int(i) => Ok(Expr::Lit(Value::Int(i))),
            Token::Float(f) => Ok(Expr::Lit(Value::Float(f))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Lit(Value::Bool(true))),
                "false" => Ok(Expr::Lit(Value::Bool(false))),
                "null" | "none" => Ok(Expr::Lit(Value::Null)),
                _ => Ok(Expr::Path(name)),
            },
            other => Err(AgentMeshError::PolicyInvalid(format!("unexpected token {other:?}"))),
        }
    }
}

/// Compile `source` into an [`Expr`].
///
/// Returns [`AgentMeshError::PolicyInvalid`] on any lexical or syntactic
/// error; this is the only place condition text is ever interpreted, and it
/// never evaluates source code.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.peek() != &Token::Eof {
        return Err(AgentMeshError::PolicyInvalid(format!(
            "unexpected trailing token {:?}",
            parser.peek()
        )));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn ctx(pairs: &[(&str, Value)]) -> Value {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        Value::Map(map)
    }

    #[test]
    fn equality_over_dotted_path() {
        let expr = parse("action == 'read'").unwrap();
        let context = ctx(&[("action", Value::String("read".to_string()))]);
        assert_eq!(eval(&expr, &context), Value::Bool(true));
    }

    #[test]
    fn missing_path_is_null_and_unequal() {
        let expr = parse("data.x == 'y'").unwrap();
        let context = ctx(&[("data", Value::Map(BTreeMap::new()))]);
        assert_eq!(eval(&expr, &context), Value::Bool(false));
    }

    #[test]
    fn and_or_not_precedence() {
        let expr = parse("not a == 1 and b == 2 or c == 3").unwrap();
        let context = ctx(&[
            ("a", Value::Int(9)),
            ("b", Value::Int(2)),
            ("c", Value::Int(3)),
        ]);
        // (not (a==1)) and (b==2) or (c==3) => (true and true) or true => true
        assert_eq!(eval(&expr, &context), Value::Bool(true));
    }

    #[test]
    fn membership_and_prefix() {
        let expr = parse("role in roles").unwrap();
        let context = ctx(&[
            ("role", Value::String("admin".to_string())),
            (
                "roles",
                Value::List(alloc::vec![Value::String("admin".to_string()), Value::String("user".to_string())]),
            ),
        ]);
        assert_eq!(eval(&expr, &context), Value::Bool(true));

        let expr2 = parse("name starts_with 'agent-'").unwrap();
        let context2 = ctx(&[("name", Value::String("agent-007".to_string()))]);
        assert_eq!(eval(&expr2, &context2), Value::Bool(true));
    }

    #[test]
    fn parenthesized_grouping_changes_result() {
        let context = ctx(&[
            ("a", Value::Bool(false)),
            ("b", Value::Bool(true)),
            ("c", Value::Bool(false)),
        ]);
        let without_parens = parse("a and b or c").unwrap();
        let with_parens = parse("a and (b or c)").unwrap();
        assert_eq!(eval(&without_parens, &context), Value::Bool(true));
        assert_eq!(eval(&with_parens, &context), Value::Bool(false));
    }

    #[test]
    fn malformed_condition_is_rejected() {
        assert!(parse("action == ").is_err());
        assert!(parse("(action == 'read'").is_err());
    }
}
