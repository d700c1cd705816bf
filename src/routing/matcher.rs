//! Request predicates.
//!
//! # Responsibilities
//! - Match path (exact, prefix, suffix; case-sensitive)
//! - Match method, header presence/value, query parameter presence/value
//! - Combine conditions with AND / OR / NOT semantics
//!
//! # Design Decisions
//! - Header names are case-insensitive, header values are compared exactly
//! - Path prefixes match whole segments: `/api` matches `/api/v1`, not `/apix`
//! - No regex, so evaluation stays linear in the expression size

use axum::http::Method;

use crate::http::exchange::HttpServerExchange;

/// A boolean condition evaluated against an in-flight exchange.
pub trait Predicate: Send + Sync + std::fmt::Debug {
    /// Returns true if the exchange satisfies this condition.
    fn matches(&self, exchange: &HttpServerExchange) -> bool;
}

/// Always true or always false.
#[derive(Debug, Clone, Copy)]
pub struct ConstantMatcher(pub bool);

impl Predicate for ConstantMatcher {
    fn matches(&self, _exchange: &HttpServerExchange) -> bool {
        self.0
    }
}

/// Matches the request path exactly.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    path: String,
}

impl PathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Predicate for PathMatcher {
    fn matches(&self, exchange: &HttpServerExchange) -> bool {
        exchange.relative_path() == self.path
    }
}

/// Matches the request path prefix on segment boundaries.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Predicate for PathPrefixMatcher {
    fn matches(&self, exchange: &HttpServerExchange) -> bool {
        let path = exchange.relative_path();
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.ends_with('/'),
            None => false,
        }
    }
}

/// Matches the request path suffix, e.g. a file extension.
#[derive(Debug, Clone)]
pub struct PathSuffixMatcher {
    suffix: String,
}

impl PathSuffixMatcher {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Predicate for PathSuffixMatcher {
    fn matches(&self, exchange: &HttpServerExchange) -> bool {
        exchange.relative_path().ends_with(&self.suffix)
    }
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Predicate for MethodMatcher {
    fn matches(&self, exchange: &HttpServerExchange) -> bool {
        *exchange.method() == self.method
    }
}

/// Matches a request header's presence, or any of its values exactly.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: String,
    value: Option<String>,
}

impl HeaderMatcher {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl Predicate for HeaderMatcher {
    fn matches(&self, exchange: &HttpServerExchange) -> bool {
        let mut values = exchange.request_headers().get_all(self.name.as_str()).iter();
        match &self.value {
            None => values.next().is_some(),
            Some(expected) => values.any(|v| v.to_str().map(|v| v == expected).unwrap_or(false)),
        }
    }
}

/// Matches a query parameter's presence, or any of its values exactly.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    name: String,
    value: Option<String>,
}

impl QueryMatcher {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl Predicate for QueryMatcher {
    fn matches(&self, exchange: &HttpServerExchange) -> bool {
        match (exchange.query_parameter(&self.name), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(values), Some(expected)) => values.iter().any(|v| v == expected),
        }
    }
}

/// Combines multiple predicates with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Predicate>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Predicate>>) -> Self {
        Self { matchers }
    }
}

impl Predicate for AndMatcher {
    fn matches(&self, exchange: &HttpServerExchange) -> bool {
        self.matchers.iter().all(|m| m.matches(exchange))
    }
}

/// Combines multiple predicates with OR semantics.
#[derive(Debug)]
pub struct OrMatcher {
    matchers: Vec<Box<dyn Predicate>>,
}

impl OrMatcher {
    pub fn new(matchers: Vec<Box<dyn Predicate>>) -> Self {
        Self { matchers }
    }
}

impl Predicate for OrMatcher {
    fn matches(&self, exchange: &HttpServerExchange) -> bool {
        self.matchers.iter().any(|m| m.matches(exchange))
    }
}

/// Negates a predicate.
#[derive(Debug)]
pub struct NotMatcher {
    inner: Box<dyn Predicate>,
}

impl NotMatcher {
    pub fn new(inner: Box<dyn Predicate>) -> Self {
        Self { inner }
    }
}

impl Predicate for NotMatcher {
    fn matches(&self, exchange: &HttpServerExchange) -> bool {
        !self.inner.matches(exchange)
    }
}
