//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, evaluations, connections)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `jqplay_http_requests_total` (counter): requests by status
//! - `jqplay_http_request_duration_seconds` (histogram): latency distribution
//! - `jqplay_evaluations_total` (counter): evaluations by outcome
//! - `jqplay_handler_panics_total` (counter): panics caught by recovery
//! - `jqplay_active_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - Low-overhead metric updates; without an installed exporter the macros
//!   are no-ops
//! - Labels kept low-cardinality (status code, outcome kind)

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(address: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;
    tracing::info!(address = %address, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(status: u16, latency: Duration) {
    counter!("jqplay_http_requests_total", "status" => status.to_string()).increment(1);
    histogram!("jqplay_http_request_duration_seconds").record(latency.as_secs_f64());
}

pub fn record_evaluation(outcome: &'static str) {
    counter!("jqplay_evaluations_total", "outcome" => outcome).increment(1);
}

pub fn record_panic() {
    counter!("jqplay_handler_panics_total").increment(1);
}

pub fn set_active_connections(count: u64) {
    gauge!("jqplay_active_connections").set(count as f64);
}
