//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (selections, probes, endpoint health, RPC calls)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-service and per-endpoint metrics
//!
//! # Metrics
//! - `router_selections_total` (counter): endpoint choices by service, endpoint
//! - `router_probes_total` (counter): health probes by service, endpoint, result
//! - `router_endpoint_health` (gauge): 1=passing, 0.5=warning, 0=critical
//! - `router_pool_endpoints` (gauge): endpoints per service pool
//! - `router_rpc_calls_total` (counter): proxied calls by service, method, result
//! - `router_rpc_call_duration_seconds` (histogram): proxied call latency
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op
//! - Labels for service, endpoint, method and outcome

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::health::state::HealthState;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_selection(service: &str, endpoint: &str) {
    metrics::counter!(
        "router_selections_total",
        "service" => service.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

pub fn record_probe(service: &str, endpoint: &str, success: bool) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!(
        "router_probes_total",
        "service" => service.to_string(),
        "endpoint" => endpoint.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_endpoint_health(service: &str, endpoint: &str, status: HealthState) {
    metrics::gauge!(
        "router_endpoint_health",
        "service" => service.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .set(status.as_gauge());
}

pub fn record_pool_size(service: &str, size: usize) {
    metrics::gauge!("router_pool_endpoints", "service" => service.to_string()).set(size as f64);
}

pub fn record_rpc_call(service: &str, method: &str, endpoint: &str, success: bool, started: Instant) {
    let result = if success { "success" } else { "error" };
    metrics::counter!(
        "router_rpc_calls_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "result" => result
    )
    .increment(1);
    metrics::histogram!(
        "router_rpc_call_duration_seconds",
        "service" => service.to_string(),
        "method" => method.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}
