//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_connect_total` (counter): connect outcomes by `outcome`
//! - `wallet_transfer_total` (counter): transfer outcomes by `outcome`
//! - `wallet_transfer_confirmation_seconds` (histogram): submit-to-receipt latency

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connect(outcome: &'static str) {
    metrics::counter!("wallet_connect_total", "outcome" => outcome).increment(1);
}

pub fn record_transfer(outcome: &'static str) {
    metrics::counter!("wallet_transfer_total", "outcome" => outcome).increment(1);
}

pub fn record_confirmation_latency(seconds: f64) {
    metrics::histogram!("wallet_transfer_confirmation_seconds").record(seconds);
}
