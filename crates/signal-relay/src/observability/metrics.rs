//! Metrics definitions for the signaling relay.
//!
//! Naming follows Prometheus conventions: `sr_` prefix, `_total` suffix for
//! counters. The only labelled metric is `sr_events_total`, whose `event`
//! label is bounded by the client event vocabulary (12 values).

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus metrics recorder and return the handle used to
/// serve `/metrics`. Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns an error if a recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Set the number of attached WebSocket connections.
///
/// Metric: `sr_connections_active`
pub fn set_connections_active(count: usize) {
    // usize to f64 is lossless for realistic connection counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("sr_connections_active").set(count as f64);
}

/// Set the number of live rooms.
///
/// Metric: `sr_rooms_active`
pub fn set_rooms_active(count: usize) {
    // usize to f64 is lossless for realistic room counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("sr_rooms_active").set(count as f64);
}

/// Count one routed client event.
///
/// Metric: `sr_events_total`
/// Labels: `event` (bounded by the client event vocabulary)
pub fn record_event(event: &'static str) {
    counter!("sr_events_total", "event" => event).increment(1);
}
