//! Route registration builder.
//!
//! ```text
//! routes
//!     .on_get("/hello", handler(|ex, _| Ok(ex.send("hi")?)))?
//!     .on_post_if("/items", "header[content-type, application/json]", ...)?
//!     .alias("body", "$entity:json")?;
//! ```
//!
//! Paths and predicate expressions are validated as they are registered, so a
//! bad route fails the deployment that declared it.

use std::collections::BTreeMap;
use std::fmt;

use axum::http::Method;

use crate::adapter::error::AdapterError;
use crate::adapter::handler::HandlerRegistration;
use crate::adapter::injection::InjectionSpecifier;
use crate::routing::matcher::Predicate;
use crate::routing::{PathTemplate, PredicateParser, RoutingError};

/// One registered route.
pub struct RouteDefinition {
    method: Method,
    template: PathTemplate,
    predicate: Option<(String, Box<dyn Predicate>)>,
    registration: HandlerRegistration,
}

impl RouteDefinition {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// The predicate expression as written, if any.
    pub fn predicate_expression(&self) -> Option<&str> {
        self.predicate.as_ref().map(|(source, _)| source.as_str())
    }

    pub fn registration(&self) -> &HandlerRegistration {
        &self.registration
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Method,
        PathTemplate,
        Option<Box<dyn Predicate>>,
        HandlerRegistration,
    ) {
        (
            self.method,
            self.template,
            self.predicate.map(|(_, predicate)| predicate),
            self.registration,
        )
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("template", &self.template.as_str())
            .field("predicate", &self.predicate_expression())
            .field("registration", &self.registration)
            .finish()
    }
}

/// Collects the routes and aliases of one deployment.
#[derive(Debug, Default)]
pub struct Routes {
    routes: Vec<RouteDefinition>,
    aliases: BTreeMap<String, InjectionSpecifier>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(
        &mut self,
        path: &str,
        registration: HandlerRegistration,
    ) -> Result<&mut Self, AdapterError> {
        self.register(Method::GET, path, None, registration)
    }

    pub fn on_post(
        &mut self,
        path: &str,
        registration: HandlerRegistration,
    ) -> Result<&mut Self, AdapterError> {
        self.register(Method::POST, path, None, registration)
    }

    pub fn on_put(
        &mut self,
        path: &str,
        registration: HandlerRegistration,
    ) -> Result<&mut Self, AdapterError> {
        self.register(Method::PUT, path, None, registration)
    }

    pub fn on_delete(
        &mut self,
        path: &str,
        registration: HandlerRegistration,
    ) -> Result<&mut Self, AdapterError> {
        self.register(Method::DELETE, path, None, registration)
    }

    pub fn on_get_if(
        &mut self,
        path: &str,
        predicate: &str,
        registration: HandlerRegistration,
    ) -> Result<&mut Self, AdapterError> {
        self.register(Method::GET, path, Some(predicate), registration)
    }

    pub fn on_post_if(
        &mut self,
        path: &str,
        predicate: &str,
        registration: HandlerRegistration,
    ) -> Result<&mut Self, AdapterError> {
        self.register(Method::POST, path, Some(predicate), registration)
    }

    pub fn on_put_if(
        &mut self,
        path: &str,
        predicate: &str,
        registration: HandlerRegistration,
    ) -> Result<&mut Self, AdapterError> {
        self.register(Method::PUT, path, Some(predicate), registration)
    }

    pub fn on_delete_if(
        &mut self,
        path: &str,
        predicate: &str,
        registration: HandlerRegistration,
    ) -> Result<&mut Self, AdapterError> {
        self.register(Method::DELETE, path, Some(predicate), registration)
    }

    /// Register a route for any method. The method name is upper-cased.
    pub fn on_request(
        &mut self,
        method: &str,
        path: &str,
        predicate: Option<&str>,
        registration: HandlerRegistration,
    ) -> Result<&mut Self, AdapterError> {
        let upper = method.trim().to_ascii_uppercase();
        let method = Method::from_bytes(upper.as_bytes())
            .map_err(|_| AdapterError::InvalidMethod(method.to_string()))?;
        self.register(method, path, predicate, registration)
    }

    /// Name an injection specifier. A later alias of the same name replaces this one.
    pub fn alias(&mut self, name: &str, specifier: &str) -> Result<&mut Self, AdapterError> {
        let name = name.trim();
        if name.is_empty() || name.contains(':') {
            return Err(AdapterError::InvalidAlias(name.to_string()));
        }
        let specifier = InjectionSpecifier::parse(specifier)?;
        if let Some(previous) = self.aliases.insert(name.to_string(), specifier) {
            tracing::debug!(alias = %name, previous = %previous, "Alias replaced");
        }
        Ok(self)
    }

    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    pub fn aliases(&self) -> &BTreeMap<String, InjectionSpecifier> {
        &self.aliases
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<RouteDefinition>, BTreeMap<String, InjectionSpecifier>) {
        (self.routes, self.aliases)
    }

    fn register(
        &mut self,
        method: Method,
        path: &str,
        predicate: Option<&str>,
        registration: HandlerRegistration,
    ) -> Result<&mut Self, AdapterError> {
        let template = PathTemplate::parse(path).map_err(RoutingError::from)?;
        let predicate = match predicate {
            Some(expression) => Some((
                expression.to_string(),
                PredicateParser::parse(expression)?,
            )),
            None => None,
        };

        self.routes.push(RouteDefinition {
            method,
            template,
            predicate,
            registration,
        });
        Ok(self)
    }
}
