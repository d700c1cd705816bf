//! Predicate expression parser.
//!
//! # Grammar
//! ```text
//! expr    := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | "(" expr ")" | atom
//! atom    := "true" | "false" | name "[" args? "]"
//! args    := arg ("," arg)*
//! arg     := 'single quoted' | "double quoted" | bare text up to ',' or ']'
//! ```
//!
//! Known names: `path`, `path-prefix`, `path-suffix`, `method`,
//! `header` (1-2 args), `query` (1-2 args).

use axum::http::Method;
use thiserror::Error;

use crate::routing::matcher::{
    AndMatcher, ConstantMatcher, HeaderMatcher, MethodMatcher, NotMatcher, OrMatcher, PathMatcher,
    PathPrefixMatcher, PathSuffixMatcher, Predicate, QueryMatcher,
};

/// A predicate expression that could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid predicate at offset {position}: {message}")]
pub struct PredicateError {
    /// Byte offset into the expression.
    pub position: usize,
    pub message: String,
}

/// Parses predicate expressions into [`Predicate`] trees.
pub struct PredicateParser;

impl PredicateParser {
    pub fn parse(expression: &str) -> Result<Box<dyn Predicate>, PredicateError> {
        let mut cursor = Cursor {
            input: expression,
            pos: 0,
        };
        let predicate = cursor.parse_or()?;
        cursor.skip_ws();
        if !cursor.at_end() {
            return Err(cursor.error("unexpected trailing input"));
        }
        Ok(predicate)
    }
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn parse_or(&mut self) -> Result<Box<dyn Predicate>, PredicateError> {
        let mut terms = vec![self.parse_and()?];
        while self.eat_keyword("or") {
            terms.push(self.parse_and()?);
        }
        if terms.len() == 1 {
            return Ok(terms.remove(0));
        }
        Ok(Box::new(OrMatcher::new(terms)))
    }

    fn parse_and(&mut self) -> Result<Box<dyn Predicate>, PredicateError> {
        let mut terms = vec![self.parse_unary()?];
        while self.eat_keyword("and") {
            terms.push(self.parse_unary()?);
        }
        if terms.len() == 1 {
            return Ok(terms.remove(0));
        }
        Ok(Box::new(AndMatcher::new(terms)))
    }

    fn parse_unary(&mut self) -> Result<Box<dyn Predicate>, PredicateError> {
        self.skip_ws();
        if self.eat_char('(') {
            let inner = self.parse_or()?;
            self.skip_ws();
            if !self.eat_char(')') {
                return Err(self.error("expected ')'"));
            }
            return Ok(inner);
        }
        if self.eat_keyword("not") {
            let inner = self.parse_unary()?;
            return Ok(Box::new(NotMatcher::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Box<dyn Predicate>, PredicateError> {
        self.skip_ws();
        let start = self.pos;
        let name = self.ident();
        if name.is_empty() {
            return Err(self.error("expected predicate name"));
        }
        match name {
            "true" => return Ok(Box::new(ConstantMatcher(true))),
            "false" => return Ok(Box::new(ConstantMatcher(false))),
            _ => {}
        }

        self.skip_ws();
        if !self.eat_char('[') {
            return Err(self.error(format!("expected '[' after {name:?}")));
        }
        let args = self.parse_args()?;
        build_atom(name, args).map_err(|message| PredicateError {
            position: start,
            message,
        })
    }

    fn parse_args(&mut self) -> Result<Vec<String>, PredicateError> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.eat_char(']') {
            return Ok(args);
        }
        loop {
            self.skip_ws();
            args.push(self.parse_arg()?);
            self.skip_ws();
            if self.eat_char(',') {
                continue;
            }
            if self.eat_char(']') {
                return Ok(args);
            }
            return Err(self.error("expected ',' or ']'"));
        }
    }

    fn parse_arg(&mut self) -> Result<String, PredicateError> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                let start = self.pos;
                match self.rest().find(quote) {
                    Some(len) => {
                        self.pos += len + 1;
                        Ok(self.input[start..start + len].to_string())
                    }
                    None => Err(self.error("unterminated quoted argument")),
                }
            }
            _ => {
                let len = self
                    .rest()
                    .find(|c| c == ',' || c == ']')
                    .unwrap_or(self.rest().len());
                let arg = self.rest()[..len].trim().to_string();
                if arg.is_empty() {
                    return Err(self.error("empty argument"));
                }
                self.pos += len;
                Ok(arg)
            }
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        let saved = self.pos;
        if self.ident() == keyword {
            return true;
        }
        self.pos = saved;
        false
    }

    fn ident(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn eat_char(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            return true;
        }
        false
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self, message: impl Into<String>) -> PredicateError {
        PredicateError {
            position: self.pos,
            message: message.into(),
        }
    }
}

fn build_atom(name: &str, mut args: Vec<String>) -> Result<Box<dyn Predicate>, String> {
    let count = args.len();
    let arity = |expected: &str| format!("{name} expects {expected} argument(s), got {count}");
    match (name, args.len()) {
        ("path", 1) => Ok(Box::new(PathMatcher::new(args.remove(0)))),
        ("path-prefix", 1) => Ok(Box::new(PathPrefixMatcher::new(args.remove(0)))),
        ("path-suffix", 1) => Ok(Box::new(PathSuffixMatcher::new(args.remove(0)))),
        ("method", 1) => {
            let raw = args.remove(0).to_ascii_uppercase();
            let method = Method::from_bytes(raw.as_bytes())
                .map_err(|_| format!("invalid method {raw:?}"))?;
            Ok(Box::new(MethodMatcher::new(method)))
        }
        ("header", 1 | 2) => {
            let name = args.remove(0);
            Ok(Box::new(HeaderMatcher::new(name, args.pop())))
        }
        ("query", 1 | 2) => {
            let name = args.remove(0);
            Ok(Box::new(QueryMatcher::new(name, args.pop())))
        }
        ("path" | "path-prefix" | "path-suffix" | "method", _) => Err(arity("1")),
        ("header" | "query", _) => Err(arity("1 or 2")),
        _ => Err(format!("unknown predicate {name:?}")),
    }
}
