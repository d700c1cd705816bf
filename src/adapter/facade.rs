//! Request/response facade handed to route handlers.
//!
//! # Responsibilities
//! - Read and write request and response headers by name
//! - Send a body, redirect, or end the exchange
//! - Look up query parameters (first value or all values)
//!
//! # Design Decisions
//! - Holds nothing but a borrow of the native exchange
//! - Mutations after completion fail with `ExchangeError::AlreadyComplete`
//! - `send_redirect` validates first, so it either fully applies or not at all

use axum::body::Bytes;
use axum::http::{header, Method, StatusCode};

use crate::http::exchange::{header_value, ExchangeError, HttpServerExchange};

/// A response body accepted by [`Exchange::send`].
///
/// `None` converts to an empty body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Bytes);

impl Payload {
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<&[u8]> for Payload {
    fn from(b: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Self(Bytes::from(b))
    }
}

impl From<&serde_json::Value> for Payload {
    fn from(value: &serde_json::Value) -> Self {
        Self(Bytes::from(value.to_string()))
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// The per-request view of an exchange exposed to handler code.
pub struct Exchange<'a> {
    inner: &'a mut HttpServerExchange,
}

impl<'a> Exchange<'a> {
    pub fn new(inner: &'a mut HttpServerExchange) -> Self {
        Self { inner }
    }

    /// First value of a request header, if present and printable.
    pub fn get_request_header(&self, name: &str) -> Option<&str> {
        self.inner
            .request_headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    /// Overwrite a request header. Allowed at any point of the exchange.
    pub fn set_request_header(&mut self, name: &str, value: &str) -> Result<(), ExchangeError> {
        self.inner.put_request_header(name, value)
    }

    pub fn get_response_header(&self, name: &str) -> Option<&str> {
        self.inner
            .response_headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    pub fn set_response_header(&mut self, name: &str, value: &str) -> Result<(), ExchangeError> {
        self.inner.put_response_header(name, value)
    }

    /// Write the body and complete the exchange.
    pub fn send(&mut self, body: impl Into<Payload>) -> Result<(), ExchangeError> {
        self.inner.send(body.into().into_bytes())
    }

    /// Set `Location`, answer 302 and complete the exchange.
    pub fn send_redirect(&mut self, location: &str) -> Result<(), ExchangeError> {
        if self.inner.is_complete() {
            return Err(ExchangeError::AlreadyComplete);
        }
        let location = header_value(header::LOCATION.as_str(), location)?;

        self.inner
            .response_headers_mut()?
            .insert(header::LOCATION, location);
        self.inner.set_response_code(StatusCode::FOUND.as_u16())?;
        self.inner.end_exchange();
        Ok(())
    }

    pub fn status(&self) -> u16 {
        self.inner.response_code()
    }

    /// Set the status code. Any value is accepted here.
    pub fn set_status(&mut self, code: u16) -> Result<(), ExchangeError> {
        self.inner.set_response_code(code)
    }

    /// Complete the exchange without a body. No-op if already complete.
    pub fn end_exchange(&mut self) {
        self.inner.end_exchange();
    }

    pub fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.inner
            .query_parameter(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of a query parameter, in request order.
    pub fn query_params(&self, name: &str) -> Option<&[String]> {
        self.inner.query_parameter(name)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn path(&self) -> &str {
        self.inner.relative_path()
    }

    pub fn request_body(&self) -> &Bytes {
        self.inner.request_body()
    }

    /// The native exchange behind this facade.
    pub fn underlying(&self) -> &HttpServerExchange {
        &*self.inner
    }

    pub fn underlying_mut(&mut self) -> &mut HttpServerExchange {
        &mut *self.inner
    }
}
