//! Handler adapter subsystem.
//!
//! # Data Flow
//! ```text
//! Deployment (startup / redeploy):
//!     deploy fn → routes.rs (on_get/on_post/.../alias)
//!     → handler.rs (compile: specifiers → injection.rs resolvers)
//!     → deployment.rs (RoutingHandler, swapped in atomically)
//!
//! Per request:
//!     host exchange → ScriptHandler
//!     → resolvers produce Params
//!     → facade.rs (Exchange over the native exchange)
//!     → user closure (ex, params)
//! ```
//!
//! # Design Decisions
//! - Registries and aliases are explicit state owned by the adapter
//! - Specifiers are resolved once per deployment, not per request
//! - Handlers are plain synchronous closures

pub mod deployment;
pub mod error;
pub mod facade;
pub mod handler;
pub mod injection;
pub mod routes;

pub use deployment::{Adapter, AdapterBuilder};
pub use error::AdapterError;
pub use facade::{Exchange, Payload};
pub use handler::{handler, inject, user_handler, HandlerRegistration, Params, UserHandler};
pub use injection::{
    injected, provider_fn, EntityParser, EnvProvider, Injected, InjectionProvider,
    InjectionSpecifier, StaticProvider,
};
pub use routes::Routes;
