//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - plain names for gauges

use crate::supervisor::ConnectionState;
use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register all core metrics with descriptions.
///
/// This ensures metrics appear in `/metrics` with proper metadata.
pub fn register_core_metrics() {
    // Ingestion metrics
    describe_counter!("telemon_ingest_accepted_total", "Payloads decoded and recorded");
    describe_counter!(
        "telemon_ingest_rejected_total",
        "Payloads dropped before recording (by reason)"
    );
    describe_counter!(
        "telemon_fields_defaulted_total",
        "Metric fields missing from a payload and replaced by their default (by metric)"
    );
    describe_gauge!("telemon_series_len", "Samples currently held per metric series");

    // Connection metrics
    describe_gauge!(
        "telemon_connection_state",
        "Broker connection state (0 disconnected, 1 connecting, 2 connected, 3 failed)"
    );
    describe_counter!("telemon_reconnect_attempts_total", "Reconnect attempts after backoff");
}

pub fn record_ingest_accepted() {
    counter!("telemon_ingest_accepted_total").increment(1);
}

pub fn record_ingest_rejected(reason: &'static str) {
    counter!("telemon_ingest_rejected_total", "reason" => reason).increment(1);
}

pub fn record_field_defaulted(metric: &str) {
    counter!("telemon_fields_defaulted_total", "metric" => metric.to_string()).increment(1);
}

pub fn set_series_len(metric: &str, len: usize) {
    gauge!("telemon_series_len", "metric" => metric.to_string()).set(len as f64);
}

pub fn set_connection_state(state: ConnectionState) {
    gauge!("telemon_connection_state").set(state.code() as f64);
}

pub fn record_reconnect_attempt() {
    counter!("telemon_reconnect_attempts_total").increment(1);
}
