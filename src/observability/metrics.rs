//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mcp_rpc_requests_total` (counter): RPC requests by method, outcome, transport
//! - `mcp_rpc_duration_seconds` (histogram): dispatch latency by method
//! - `mcp_origin_rejections_total` (counter): failed origin validations by route
//! - `mcp_bind_attempts_total` (counter): bind candidates by family, result
//! - `mcp_inflight_requests` (gauge): requests currently handled over HTTP
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::AddressFamily;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

/// Record one handled RPC request.
pub fn record_rpc(method: &str, outcome: &'static str, transport: &'static str, start: Instant) {
    counter!(
        "mcp_rpc_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome,
        "transport" => transport
    )
    .increment(1);
    histogram!("mcp_rpc_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_origin_rejected(route: &'static str) {
    counter!("mcp_origin_rejections_total", "route" => route).increment(1);
}

pub fn record_bind_attempt(family: AddressFamily, success: bool) {
    counter!(
        "mcp_bind_attempts_total",
        "family" => family.as_str(),
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

pub fn set_inflight_requests(count: u64) {
    gauge!("mcp_inflight_requests").set(count as f64);
}
