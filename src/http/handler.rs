//! The callback shape the server invokes once per request.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::StatusCode;

use crate::http::exchange::HttpServerExchange;

/// Error type returned by request handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A request handler operating on a native exchange.
///
/// Handlers run on a blocking worker thread; they may block.
pub trait HttpHandler: Send + Sync {
    fn handle_request(&self, exchange: &mut HttpServerExchange) -> Result<(), HandlerError>;
}

impl<H: HttpHandler + ?Sized> HttpHandler for Arc<H> {
    fn handle_request(&self, exchange: &mut HttpServerExchange) -> Result<(), HandlerError> {
        (**self).handle_request(exchange)
    }
}

/// Adapts a closure into an [`HttpHandler`].
pub struct HandlerFn<F>(F);

/// Wrap a closure as an [`HttpHandler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut HttpServerExchange) -> Result<(), HandlerError> + Send + Sync,
{
    HandlerFn(f)
}

impl<F> HttpHandler for HandlerFn<F>
where
    F: Fn(&mut HttpServerExchange) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle_request(&self, exchange: &mut HttpServerExchange) -> Result<(), HandlerError> {
        (self.0)(exchange)
    }
}

/// Answers every request with a fixed status and body.
#[derive(Debug, Clone)]
pub struct ResponseHandler {
    status: u16,
    body: Bytes,
}

impl ResponseHandler {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 404 with an empty body; the default fallback for unmatched requests.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND.as_u16(), Bytes::new())
    }
}

impl HttpHandler for ResponseHandler {
    fn handle_request(&self, exchange: &mut HttpServerExchange) -> Result<(), HandlerError> {
        exchange.set_response_code(self.status)?;
        exchange.send(self.body.clone())?;
        Ok(())
    }
}
