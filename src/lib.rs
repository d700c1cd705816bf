//! Exchange adapter library.
//!
//! Route handlers are plain closures over a request/response facade; the
//! host runtime (axum server, routing table, predicates) drives them.

pub mod adapter;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use adapter::{handler, inject, Adapter, AdapterBuilder, AdapterError, Exchange, Params, Routes};
pub use config::schema::AdapterConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
