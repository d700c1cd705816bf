//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatch handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Buffer each request into a native exchange
//! - Run the root handler on a blocking worker and render its response
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AdapterConfig;
use crate::http::exchange::HttpServerExchange;
use crate::http::handler::HttpHandler;
use crate::http::request::{request_id, UuidRequestId};
use crate::observability::metrics;

/// Application state injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<dyn HttpHandler>,
    pub max_body_size: usize,
}

/// HTTP server hosting a root [`HttpHandler`].
pub struct HttpServer {
    router: Router,
    config: AdapterConfig,
}

impl HttpServer {
    /// Create a new HTTP server dispatching every request to `handler`.
    pub fn new(config: AdapterConfig, handler: Arc<dyn HttpHandler>) -> Self {
        let state = AppState {
            handler,
            max_body_size: config.limits.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AdapterConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The configured router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }
}

/// Buffers the request, hands it to the root handler, renders the result.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();
    let request_id = request_id(&parts.headers).unwrap_or("unknown").to_string();

    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                path = %path,
                limit = state.max_body_size,
                error = %e,
                "Failed to buffer request body"
            );
            let rejection = if exceeds_limit(&*e.into_inner()) {
                (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
            } else {
                (StatusCode::BAD_REQUEST, "Failed to read request body")
            };
            metrics::record_request(&method, rejection.0.as_u16(), start_time);
            return rejection.into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Dispatching request"
    );

    let exchange = HttpServerExchange::from_parts(parts, body);
    let handler = state.handler.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut exchange = exchange;
        let result = handler.handle_request(&mut exchange);
        (exchange, result)
    })
    .await;

    let response = match outcome {
        Ok((exchange, Ok(()))) => exchange.into_response(),
        Ok((exchange, Err(e))) => {
            tracing::error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                error = %e,
                "Handler failed"
            );
            if exchange.is_complete() {
                exchange.into_response()
            } else {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                path = %path,
                error = %e,
                "Handler panicked"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

/// Whether a body error (or anything it wraps) is the buffering limit.
fn exceeds_limit(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::{handler_fn, ResponseHandler};
    use axum::body::Bytes;
    use tower::ServiceExt;

    fn server(handler: Arc<dyn HttpHandler>) -> Router {
        HttpServer::new(AdapterConfig::default(), handler).router()
    }

    async fn call(router: Router, request: Request<Body>) -> Response {
        router.oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_renders_exchange_and_sets_request_id() {
        let router = server(Arc::new(ResponseHandler::new(201, "made")));
        let response = call(router, Request::get("/x").body(Body::empty()).unwrap()).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"made");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_500() {
        let router = server(Arc::new(handler_fn(|_| Err("boom".into()))));
        let response = call(router, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_completed_exchange_survives_later_error() {
        let router = server(Arc::new(handler_fn(|exchange| {
            exchange.send("partial".into())?;
            Err("after send".into())
        })));
        let response = call(router, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let router = server(Arc::new(handler_fn(|_| panic!("handler bug"))));
        let response = call(router, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut config = AdapterConfig::default();
        config.limits.max_body_size = 4;
        let router = HttpServer::new(config, Arc::new(ResponseHandler::new(200, "ok"))).router();

        let request = Request::post("/").body(Body::from("too long")).unwrap();
        assert_eq!(call(router, request).await.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_broken_body_is_bad_request() {
        let router = server(Arc::new(ResponseHandler::new(200, "ok")));
        let chunks = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"par")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
        ]);

        let request = Request::post("/").body(Body::from_stream(chunks)).unwrap();
        assert_eq!(call(router, request).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_request_body_reaches_handler() {
        let router = server(Arc::new(handler_fn(|exchange| {
            let echoed = exchange.request_body().clone();
            exchange.send(echoed)?;
            Ok(())
        })));
        let request = Request::post("/echo").body(Body::from("payload")).unwrap();
        let response = call(router, request).await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"payload");
    }
}
