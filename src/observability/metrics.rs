//! Metrics collection and exposition.
//!
//! # Metrics
//! - `security_auth_decisions_total` (counter): decisions by protocol, outcome
//! - `security_auth_failures_recorded_total` (counter): failures by listener
//! - `security_clients_blocked_total` (counter): new blocks by listener
//! - `security_blocked_requests_total` (counter): requests refused by a block
//! - `security_config_reloads_total` (counter): reloads by result
//! - `security_config_generation` (gauge): generation of the live snapshot
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exposition is opt-in from the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_auth_decision(protocol: &'static str, outcome: &'static str) {
    metrics::counter!(
        "security_auth_decisions_total",
        "protocol" => protocol,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_auth_failure(listener: &str) {
    metrics::counter!(
        "security_auth_failures_recorded_total",
        "listener" => listener.to_string()
    )
    .increment(1);
}

pub fn record_client_blocked(listener: &str) {
    metrics::counter!(
        "security_clients_blocked_total",
        "listener" => listener.to_string()
    )
    .increment(1);
}

pub fn record_blocked_request(scope: &'static str) {
    metrics::counter!("security_blocked_requests_total", "scope" => scope).increment(1);
}

pub fn record_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("security_config_reloads_total", "result" => result).increment(1);
}

pub fn record_generation(generation: u64) {
    metrics::gauge!("security_config_generation").set(generation as f64);
}
