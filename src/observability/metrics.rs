//! Metrics collection and exposition.
//!
//! # Metrics
//! - `keyflow_derivations_total` (counter): key derivations by outcome
//! - `keyflow_transfer_transitions_total` (counter): published transfer states
//! - `keyflow_transfer_rejected_total` (counter): sends refused while busy
//! - `keyflow_transfer_duration_seconds` (histogram): Sending → terminal latency

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with an HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of a key derivation.
pub fn record_derivation(success: bool) {
    let outcome = if success { "ok" } else { "error" };
    metrics::counter!("keyflow_derivations_total", "outcome" => outcome).increment(1);
}

/// Record a published transfer state.
pub fn record_transition(state: &'static str) {
    metrics::counter!("keyflow_transfer_transitions_total", "state" => state).increment(1);
}

/// Record a send refused by the single-flight guard.
pub fn record_rejected_send() {
    metrics::counter!("keyflow_transfer_rejected_total").increment(1);
}

/// Record how long an attempt spent in `Sending`.
pub fn record_transfer_duration(elapsed: Duration) {
    metrics::histogram!("keyflow_transfer_duration_seconds").record(elapsed.as_secs_f64());
}
