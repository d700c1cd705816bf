//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store routes per method
//! - Select the most specific template matching the request path
//! - Evaluate route predicates in registration order
//! - Hand unmatched requests to the fallback handler
//!
//! # Design Decisions
//! - Immutable once built; a new table is built and swapped in on redeploy
//! - O(1) method lookup via HashMap, O(n) template scan within a method
//! - Template parameters are exposed as query parameters
//! - Unmatched requests fall through to the fallback, never an implicit 404

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use crate::http::exchange::HttpServerExchange;
use crate::http::handler::{HandlerError, HttpHandler, ResponseHandler};
use crate::routing::matcher::Predicate;
use crate::routing::template::{PathTemplate, TemplateError};

/// Errors raised while building a routing table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error(transparent)]
    InvalidTemplate(#[from] TemplateError),
}

struct RouteEntry {
    template: PathTemplate,
    predicate: Option<Box<dyn Predicate>>,
    handler: Arc<dyn HttpHandler>,
}

/// Dispatches requests by method, path template and predicate.
pub struct RoutingHandler {
    tables: HashMap<Method, Vec<RouteEntry>>,
    fallback: Arc<dyn HttpHandler>,
}

impl Default for RoutingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingHandler {
    /// An empty table whose fallback answers 404.
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            fallback: Arc::new(ResponseHandler::not_found()),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn HttpHandler>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn set_fallback(&mut self, fallback: Arc<dyn HttpHandler>) {
        self.fallback = fallback;
    }

    /// Add an unconditional route.
    pub fn add(
        &mut self,
        method: Method,
        template: &str,
        handler: Arc<dyn HttpHandler>,
    ) -> Result<&mut Self, RoutingError> {
        self.insert(method, template, None, handler)
    }

    /// Add a route that only applies when `predicate` holds.
    pub fn add_with_predicate(
        &mut self,
        method: Method,
        template: &str,
        predicate: Box<dyn Predicate>,
        handler: Arc<dyn HttpHandler>,
    ) -> Result<&mut Self, RoutingError> {
        self.insert(method, template, Some(predicate), handler)
    }

    fn insert(
        &mut self,
        method: Method,
        template: &str,
        predicate: Option<Box<dyn Predicate>>,
        handler: Arc<dyn HttpHandler>,
    ) -> Result<&mut Self, RoutingError> {
        let template = PathTemplate::parse(template)?;
        tracing::debug!(
            method = %method,
            template = %template,
            conditional = predicate.is_some(),
            "Registered route"
        );
        self.tables.entry(method).or_default().push(RouteEntry {
            template,
            predicate,
            handler,
        });
        Ok(self)
    }

    /// Total number of registered routes across all methods.
    pub fn route_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Find the handler for an exchange. Template captures are merged into
    /// the exchange's query parameters only when a route is selected.
    fn select(&self, exchange: &mut HttpServerExchange) -> Option<Arc<dyn HttpHandler>> {
        let entries = self.tables.get(exchange.method())?;
        let path = exchange.relative_path().to_string();

        let mut best: Option<(&PathTemplate, Vec<(String, String)>)> = None;
        for entry in entries {
            let Some(captured) = entry.template.matches(&path) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((current, _)) => entry.template.specificity() > current.specificity(),
            };
            if better {
                best = Some((&entry.template, captured));
            }
        }
        let (template, captured) = best?;
        let candidates = || entries.iter().filter(move |entry| entry.template == *template);

        // Predicates see the captures; the real exchange only gets them on a match.
        let needs_view = !captured.is_empty()
            && candidates().any(|entry| entry.predicate.is_some());
        let view = needs_view.then(|| {
            let mut view = exchange.clone();
            merge_captures(&mut view, &captured);
            view
        });
        let target: &HttpServerExchange = view.as_ref().unwrap_or(&*exchange);

        let handler = candidates()
            .find(|entry| {
                entry
                    .predicate
                    .as_ref()
                    .map_or(true, |predicate| predicate.matches(target))
            })
            .map(|entry| entry.handler.clone())?;

        merge_captures(exchange, &captured);
        Some(handler)
    }
}

fn merge_captures(exchange: &mut HttpServerExchange, captured: &[(String, String)]) {
    for (name, value) in captured {
        exchange.add_query_parameter(name.as_str(), value.as_str());
    }
}

impl HttpHandler for RoutingHandler {
    fn handle_request(&self, exchange: &mut HttpServerExchange) -> Result<(), HandlerError> {
        match self.select(exchange) {
            Some(handler) => handler.handle_request(exchange),
            None => {
                tracing::debug!(
                    method = %exchange.method(),
                    path = %exchange.relative_path(),
                    "No route matched, using fallback"
                );
                self.fallback.handle_request(exchange)
            }
        }
    }
}
