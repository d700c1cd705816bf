//! Deployments: compiling registered routes into a live routing table.
//!
//! # Responsibilities
//! - Own the injection registry and the fallback handler
//! - Run the deployment function against a fresh `Routes` builder
//! - Compile routes into a host `RoutingHandler` and swap it in atomically
//!
//! # Design Decisions
//! - Every redeploy rebuilds from scratch; nothing is patched in place
//! - A failed redeploy leaves the previous deployment serving
//! - Configured aliases are applied after the deployment function, so they
//!   override aliases declared in code

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::adapter::error::AdapterError;
use crate::adapter::handler::ScriptHandler;
use crate::adapter::injection::{EntityParser, InjectionProvider, InjectionRegistry};
use crate::adapter::routes::Routes;
use crate::config::AdapterConfig;
use crate::http::exchange::HttpServerExchange;
use crate::http::handler::{HandlerError, HttpHandler, ResponseHandler};
use crate::observability::metrics;
use crate::routing::RoutingHandler;

/// Declares the routes of a deployment.
pub type DeployFn = Arc<dyn Fn(&mut Routes, &AdapterConfig) -> Result<(), AdapterError> + Send + Sync>;

/// Builder for an [`Adapter`].
pub struct AdapterBuilder {
    providers: Vec<(String, Arc<dyn InjectionProvider>)>,
    entity_parsers: Vec<(String, Arc<dyn EntityParser>)>,
    fallback: Option<Arc<dyn HttpHandler>>,
    deploy: Option<DeployFn>,
}

impl Default for AdapterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            entity_parsers: Vec::new(),
            fallback: None,
            deploy: None,
        }
    }

    /// Serve specifiers of the form `prefix:suffix` from `provider`.
    pub fn add_injection_provider(
        mut self,
        prefix: impl Into<String>,
        provider: impl InjectionProvider + 'static,
    ) -> Self {
        self.providers.push((prefix.into(), Arc::new(provider)));
        self
    }

    /// Serve `$entity:<name>` from `parser`.
    pub fn add_entity_parser(
        mut self,
        name: impl Into<String>,
        parser: impl EntityParser + 'static,
    ) -> Self {
        self.entity_parsers.push((name.into(), Arc::new(parser)));
        self
    }

    /// Handler for requests no route matches. Defaults to an empty 404.
    pub fn with_fallback(mut self, fallback: impl HttpHandler + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    pub fn deploy<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Routes, &AdapterConfig) -> Result<(), AdapterError> + Send + Sync + 'static,
    {
        self.deploy = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<Adapter, AdapterError> {
        let mut registry = InjectionRegistry::new();
        for (prefix, provider) in self.providers {
            registry.add_provider(&prefix, provider)?;
        }
        for (name, parser) in self.entity_parsers {
            registry.add_entity_parser(&name, parser);
        }

        let fallback: Arc<dyn HttpHandler> = match self.fallback {
            Some(fallback) => fallback,
            None => Arc::new(ResponseHandler::not_found()),
        };
        let deploy: DeployFn = match self.deploy {
            Some(deploy) => deploy,
            None => Arc::new(no_routes),
        };
        let empty = RoutingHandler::new().with_fallback(fallback.clone());

        Ok(Adapter {
            registry,
            fallback,
            deploy,
            current: Arc::new(ArcSwap::from_pointee(empty)),
            generation: AtomicU64::new(0),
        })
    }
}

fn no_routes(_: &mut Routes, _: &AdapterConfig) -> Result<(), AdapterError> {
    Ok(())
}

/// Owns the live deployment and rebuilds it on demand.
pub struct Adapter {
    registry: InjectionRegistry,
    fallback: Arc<dyn HttpHandler>,
    deploy: DeployFn,
    current: Arc<ArcSwap<RoutingHandler>>,
    generation: AtomicU64,
}

impl Adapter {
    pub fn builder() -> AdapterBuilder {
        AdapterBuilder::new()
    }

    /// Install the first deployment.
    pub fn start(&self, config: &AdapterConfig) -> Result<(), AdapterError> {
        self.redeploy(config)
    }

    /// Build a new deployment and swap it in. On error the current one stays.
    pub fn redeploy(&self, config: &AdapterConfig) -> Result<(), AdapterError> {
        match self.compile(config) {
            Ok(routing) => {
                let routes = routing.route_count();
                self.current.store(Arc::new(routing));
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                metrics::record_deployment(routes, true);
                tracing::info!(generation, routes, "Deployment installed");
                Ok(())
            }
            Err(e) => {
                metrics::record_deployment(0, false);
                tracing::error!(
                    error = %e,
                    generation = self.generation(),
                    "Deployment failed, keeping current routes"
                );
                Err(e)
            }
        }
    }

    /// Build a routing table from the deployment function without installing it.
    pub fn compile(&self, config: &AdapterConfig) -> Result<RoutingHandler, AdapterError> {
        let mut routes = Routes::new();
        (self.deploy)(&mut routes, config)?;
        for (name, specifier) in &config.aliases {
            routes.alias(name, specifier)?;
        }
        build_routing(routes, &self.registry, self.fallback.clone())
    }

    /// Number of deployments installed so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The root handler; always dispatches to the current deployment.
    pub fn handler(&self) -> Arc<dyn HttpHandler> {
        Arc::new(DeployedHandler {
            current: self.current.clone(),
        })
    }
}

struct DeployedHandler {
    current: Arc<ArcSwap<RoutingHandler>>,
}

impl HttpHandler for DeployedHandler {
    fn handle_request(&self, exchange: &mut HttpServerExchange) -> Result<(), HandlerError> {
        // Held for the whole request, which may block.
        let routing = self.current.load_full();
        routing.handle_request(exchange)
    }
}

/// Compile routes against a registry into a routing table.
pub fn build_routing(
    routes: Routes,
    registry: &InjectionRegistry,
    fallback: Arc<dyn HttpHandler>,
) -> Result<RoutingHandler, AdapterError> {
    let (definitions, aliases) = routes.into_parts();
    let mut routing = RoutingHandler::new().with_fallback(fallback);

    for definition in definitions {
        let (method, template, predicate, registration) = definition.into_parts();
        let handler: Arc<dyn HttpHandler> =
            Arc::new(ScriptHandler::compile(&registration, registry, &aliases)?);
        match predicate {
            Some(predicate) => {
                routing.add_with_predicate(method, template.as_str(), predicate, handler)?;
            }
            None => {
                routing.add(method, template.as_str(), handler)?;
            }
        }
    }

    Ok(routing)
}
