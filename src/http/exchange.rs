//! Native request/response exchange.
//!
//! # Responsibilities
//! - Hold the buffered request (method, URI, headers, body, query parameters)
//! - Accumulate the response (status, headers, body) until completion
//! - Render the finished exchange as an axum response
//!
//! # Design Decisions
//! - The request body is buffered by the server before dispatch
//! - Completion is one-way: once complete, the response is frozen
//! - Query parameter values keep the order they appeared in the URI

use std::collections::HashMap;

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Response, StatusCode, Uri};
use thiserror::Error;

/// Query parameters by name, each holding its values in request order.
pub type QueryParameters = HashMap<String, Vec<String>>;

/// Errors raised when an exchange is mutated incorrectly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// The response has already been completed.
    #[error("response already complete")]
    AlreadyComplete,

    /// The header name is not a valid HTTP token.
    #[error("invalid header name: {0:?}")]
    InvalidHeaderName(String),

    /// The header value contains characters not allowed in HTTP headers.
    #[error("invalid value for header {0:?}")]
    InvalidHeaderValue(String),
}

/// One in-flight HTTP request and the response being built for it.
#[derive(Debug, Clone)]
pub struct HttpServerExchange {
    method: Method,
    uri: Uri,
    request_headers: HeaderMap,
    request_body: Bytes,
    query_parameters: QueryParameters,
    response_code: u16,
    response_headers: HeaderMap,
    response_body: Bytes,
    complete: bool,
}

impl HttpServerExchange {
    /// Create an exchange for a request with no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        let query_parameters = uri.query().map(parse_query_string).unwrap_or_default();
        Self {
            method,
            uri,
            request_headers: HeaderMap::new(),
            request_body: Bytes::new(),
            query_parameters,
            response_code: StatusCode::OK.as_u16(),
            response_headers: HeaderMap::new(),
            response_body: Bytes::new(),
            complete: false,
        }
    }

    /// Create an exchange from a decomposed request and its buffered body.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let mut exchange = Self::new(parts.method, parts.uri);
        exchange.request_headers = parts.headers;
        exchange.request_body = body;
        exchange
    }

    /// Append a request header. Used when assembling exchanges by hand.
    pub fn with_request_header(mut self, name: &str, value: &str) -> Result<Self, ExchangeError> {
        let name = header_name(name)?;
        let value = header_value(name.as_str(), value)?;
        self.request_headers.append(name, value);
        Ok(self)
    }

    /// Replace the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.request_body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request path without the query string.
    pub fn relative_path(&self) -> &str {
        self.uri.path()
    }

    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    /// Overwrite every value of a request header.
    ///
    /// Request headers stay writable for the whole exchange.
    pub fn put_request_header(&mut self, name: &str, value: &str) -> Result<(), ExchangeError> {
        let name = header_name(name)?;
        let value = header_value(name.as_str(), value)?;
        self.request_headers.insert(name, value);
        Ok(())
    }

    pub fn request_body(&self) -> &Bytes {
        &self.request_body
    }

    pub fn query_parameters(&self) -> &QueryParameters {
        &self.query_parameters
    }

    /// All values of a query parameter, or `None` if it was not sent.
    pub fn query_parameter(&self, name: &str) -> Option<&[String]> {
        self.query_parameters.get(name).map(Vec::as_slice)
    }

    /// Append a value to a query parameter.
    pub fn add_query_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query_parameters
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    pub fn response_code(&self) -> u16 {
        self.response_code
    }

    /// Set the response status code. No range validation is performed here.
    pub fn set_response_code(&mut self, code: u16) -> Result<(), ExchangeError> {
        self.ensure_open()?;
        self.response_code = code;
        Ok(())
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Mutable access to response headers while the response is still open.
    pub fn response_headers_mut(&mut self) -> Result<&mut HeaderMap, ExchangeError> {
        self.ensure_open()?;
        Ok(&mut self.response_headers)
    }

    /// Overwrite every value of a response header.
    pub fn put_response_header(&mut self, name: &str, value: &str) -> Result<(), ExchangeError> {
        self.ensure_open()?;
        let name = header_name(name)?;
        let value = header_value(name.as_str(), value)?;
        self.response_headers.insert(name, value);
        Ok(())
    }

    pub fn response_body(&self) -> &Bytes {
        &self.response_body
    }

    /// Write the response body and complete the exchange.
    pub fn send(&mut self, body: Bytes) -> Result<(), ExchangeError> {
        self.ensure_open()?;
        self.response_body = body;
        self.complete = true;
        Ok(())
    }

    /// Complete the exchange without writing a body. Idempotent.
    pub fn end_exchange(&mut self) {
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Render the exchange as an HTTP response.
    ///
    /// Status codes outside the range HTTP can carry are answered with 500.
    pub fn into_response(self) -> Response<Body> {
        let status = match StatusCode::from_u16(self.response_code) {
            Ok(status) => status,
            Err(_) => {
                tracing::warn!(
                    status = self.response_code,
                    path = %self.uri.path(),
                    "Handler set an unrepresentable status code"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut response = Response::new(Body::from(self.response_body));
        *response.status_mut() = status;
        *response.headers_mut() = self.response_headers;
        response
    }

    fn ensure_open(&self) -> Result<(), ExchangeError> {
        if self.complete {
            return Err(ExchangeError::AlreadyComplete);
        }
        Ok(())
    }
}

/// Parse a raw query string into ordered parameter values.
///
/// Keys without `=` map to the empty string; values are percent-decoded.
pub fn parse_query_string(query: &str) -> QueryParameters {
    let mut params = QueryParameters::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}

pub(crate) fn header_name(name: &str) -> Result<HeaderName, ExchangeError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ExchangeError::InvalidHeaderName(name.to_string()))
}

pub(crate) fn header_value(name: &str, value: &str) -> Result<HeaderValue, ExchangeError> {
    HeaderValue::from_str(value).map_err(|_| ExchangeError::InvalidHeaderValue(name.to_string()))
}
