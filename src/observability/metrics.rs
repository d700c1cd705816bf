//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define adapter metrics (requests, latency, deployments)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `adapter_requests_total` (counter): dispatched requests by method, status
//! - `adapter_request_duration_seconds` (histogram): latency by method
//! - `adapter_deployments_total` (counter): deployments by outcome
//! - `adapter_routes` (gauge): routes in the live deployment
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Labels limited to method, status and outcome to bound cardinality

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    ::metrics::counter!(
        "adapter_requests_total",
        "method" => method.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("adapter_request_duration_seconds", "method" => method)
        .record(start.elapsed().as_secs_f64());
}

/// Record a deployment attempt.
pub fn record_deployment(routes: usize, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ::metrics::counter!("adapter_deployments_total", "outcome" => outcome).increment(1);
    if success {
        ::metrics::gauge!("adapter_routes").set(routes as f64);
    }
}
