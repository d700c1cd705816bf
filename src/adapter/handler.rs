//! Handler registrations and their compiled host handlers.
//!
//! # Responsibilities
//! - Represent a user handler with or without injection specifiers
//! - Pre-resolve specifiers into resolvers when a deployment is built
//! - Per request: build a facade, resolve parameters, call the user function
//!
//! # Design Decisions
//! - The bare/injected distinction is a tagged variant fixed at registration
//! - User errors are returned to the host untouched; nothing is caught here

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::adapter::error::AdapterError;
use crate::adapter::facade::Exchange;
use crate::adapter::injection::{Injected, InjectionRegistry, InjectionSpecifier, Resolver};
use crate::http::exchange::HttpServerExchange;
use crate::http::handler::{HandlerError, HttpHandler};

/// A route handler as written by the user.
pub type UserHandler =
    Arc<dyn Fn(&mut Exchange<'_>, &Params) -> Result<(), HandlerError> + Send + Sync>;

/// Wrap a closure as a [`UserHandler`].
pub fn user_handler<F>(f: F) -> UserHandler
where
    F: Fn(&mut Exchange<'_>, &Params) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A handler without injected parameters.
pub fn handler<F>(f: F) -> HandlerRegistration
where
    F: Fn(&mut Exchange<'_>, &Params) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    HandlerRegistration::Simple(Arc::new(f))
}

/// A handler whose [`Params`] are resolved from `specifiers`, in order.
pub fn inject<I, S, F>(specifiers: I, f: F) -> HandlerRegistration
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: Fn(&mut Exchange<'_>, &Params) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    HandlerRegistration::WithInjections {
        specifiers: specifiers.into_iter().map(Into::into).collect(),
        handler: Arc::new(f),
    }
}

/// How a route's handler was registered.
#[derive(Clone)]
pub enum HandlerRegistration {
    Simple(UserHandler),
    WithInjections {
        specifiers: Vec<String>,
        handler: UserHandler,
    },
}

impl HandlerRegistration {
    /// Build a registration from a specifier list and a handler that may be missing.
    ///
    /// An empty list gives [`HandlerRegistration::Simple`].
    pub fn from_parts(
        specifiers: Vec<String>,
        handler: Option<UserHandler>,
    ) -> Result<Self, AdapterError> {
        let handler = handler.ok_or(AdapterError::MissingHandler)?;
        if specifiers.is_empty() {
            return Ok(Self::Simple(handler));
        }
        Ok(Self::WithInjections {
            specifiers,
            handler,
        })
    }

    pub fn specifiers(&self) -> &[String] {
        match self {
            Self::Simple(_) => &[],
            Self::WithInjections { specifiers, .. } => specifiers,
        }
    }

    pub fn user_handler(&self) -> &UserHandler {
        match self {
            Self::Simple(handler) | Self::WithInjections { handler, .. } => handler,
        }
    }
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(_) => f.write_str("Simple"),
            Self::WithInjections { specifiers, .. } => f
                .debug_struct("WithInjections")
                .field("specifiers", specifiers)
                .finish(),
        }
    }
}

/// Injected parameters for one request, in specifier order.
///
/// Index 0 is the first specifier; the facade is passed separately.
#[derive(Default)]
pub struct Params {
    values: Vec<Option<Injected>>,
}

impl Params {
    pub fn new(values: Vec<Option<Injected>>) -> Self {
        Self { values }
    }

    /// The value at `index` if it was resolved and has type `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        let value: &(dyn Any + Send + Sync) = &**self.values.get(index)?.as_ref()?;
        value.downcast_ref::<T>()
    }

    /// The untyped value at `index`.
    pub fn raw(&self, index: usize) -> Option<&Injected> {
        self.values.get(index)?.as_ref()
    }

    pub fn is_present(&self, index: usize) -> bool {
        self.raw(index).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The host handler produced for one registered route.
pub struct ScriptHandler {
    resolvers: Vec<Resolver>,
    handler: UserHandler,
}

impl ScriptHandler {
    /// Resolve every specifier of `registration` against the registry and aliases.
    pub fn compile(
        registration: &HandlerRegistration,
        registry: &InjectionRegistry,
        aliases: &BTreeMap<String, InjectionSpecifier>,
    ) -> Result<Self, AdapterError> {
        let resolvers = registration
            .specifiers()
            .iter()
            .map(|raw| {
                let specifier = InjectionSpecifier::parse(raw)?;
                registry.resolver(&specifier, aliases)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            resolvers,
            handler: registration.user_handler().clone(),
        })
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }
}

impl HttpHandler for ScriptHandler {
    fn handle_request(&self, exchange: &mut HttpServerExchange) -> Result<(), HandlerError> {
        let params = Params::new(
            self.resolvers
                .iter()
                .map(|resolver| resolver.resolve(exchange))
                .collect(),
        );
        let mut facade = Exchange::new(exchange);
        (self.handler)(&mut facade, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::injection::{injected, provider_fn};
    use axum::http::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn run(handler: &ScriptHandler, uri: &str) -> HttpServerExchange {
        let mut exchange = HttpServerExchange::new(Method::GET, uri.parse().unwrap());
        handler.handle_request(&mut exchange).unwrap();
        exchange
    }

    #[test]
    fn test_missing_handler_fails_at_registration() {
        let err = HandlerRegistration::from_parts(vec!["$entity:json".into()], None).unwrap_err();
        assert_eq!(err, AdapterError::MissingHandler);
        assert_eq!(err.to_string(), "handler function cannot be null");
    }

    #[test]
    fn test_from_parts_picks_variant() {
        let f = user_handler(|_, _| Ok(()));
        let simple = HandlerRegistration::from_parts(vec![], Some(f.clone())).unwrap();
        assert!(matches!(simple, HandlerRegistration::Simple(_)));

        let injected = HandlerRegistration::from_parts(vec!["a:b".into()], Some(f)).unwrap();
        assert_eq!(injected.specifiers(), &["a:b".to_string()]);
    }

    #[test]
    fn test_simple_handler_invoked_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registration = handler(move |ex, params| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert!(params.is_empty());
            ex.send("hi")?;
            Ok(())
        });
        let compiled =
            ScriptHandler::compile(&registration, &InjectionRegistry::new(), &BTreeMap::new())
                .unwrap();

        let exchange = run(&compiled, "/hello");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(exchange.response_body().as_ref(), b"hi");
    }

    #[test]
    fn test_params_follow_specifier_order() {
        let mut registry = InjectionRegistry::new();
        registry
            .add_provider(
                "num",
                Arc::new(provider_fn(|suffix: &str| suffix.parse::<i64>().ok().map(injected))),
            )
            .unwrap();

        let registration = inject(["num:7", "missing:x", "num:9"], |ex, params| {
            let first = params.get::<i64>(0).copied().unwrap_or_default();
            let last = params.get::<i64>(2).copied().unwrap_or_default();
            ex.send(format!("{first},{},{last}", params.is_present(1)))?;
            Ok(())
        });
        let compiled = ScriptHandler::compile(&registration, &registry, &BTreeMap::new()).unwrap();
        assert_eq!(compiled.resolver_count(), 3);

        let exchange = run(&compiled, "/");
        assert_eq!(exchange.response_body().as_ref(), b"7,false,9");
    }

    #[test]
    fn test_wrong_type_reads_as_absent() {
        let params = Params::new(vec![Some(injected("text".to_string())), None]);
        assert_eq!(params.get::<String>(0).map(String::as_str), Some("text"));
        assert!(params.get::<i32>(0).is_none());
        assert!(params.get::<String>(1).is_none());
        assert!(params.get::<String>(5).is_none());
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_user_errors_propagate() {
        let registration = handler(|_, _| Err("boom".into()));
        let compiled =
            ScriptHandler::compile(&registration, &InjectionRegistry::new(), &BTreeMap::new())
                .unwrap();
        let mut exchange = HttpServerExchange::new(Method::GET, "/".parse().unwrap());
        let err = compiled.handle_request(&mut exchange).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_invalid_specifier_fails_compile() {
        let registration = inject([""], |_, _| Ok(()));
        assert!(matches!(
            ScriptHandler::compile(&registration, &InjectionRegistry::new(), &BTreeMap::new()),
            Err(AdapterError::InvalidSpecifier { .. })
        ));
    }
}
