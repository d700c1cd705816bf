//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → exchange.rs (buffer into a native exchange)
//!     → handler.rs (root HttpHandler, on a blocking worker)
//!     → exchange.rs (render status, headers, body)
//!     → Send to client
//! ```

pub mod exchange;
pub mod handler;
pub mod request;
pub mod server;

pub use exchange::{ExchangeError, HttpServerExchange};
pub use handler::{handler_fn, HandlerError, HttpHandler, ResponseHandler};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
