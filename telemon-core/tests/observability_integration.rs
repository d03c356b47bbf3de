//! Integration tests for observability infrastructure.
//!
//! These tests validate that health checks, metrics, and tracing work
//! end-to-end against the real ingestion pipeline.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test observability_integration
//! ```
//!
//! Run with output to see tracing logs:
//! ```bash
//! cargo test --test observability_integration -- --nocapture
//! ```
//!
//! Metrics are captured with a thread-local Prometheus recorder, so no scrape
//! endpoint or global recorder is needed and tests stay isolated.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;
use telemon_core::observability::{health::*, metrics::*};
use telemon_core::{ConnectionState, IngestionPipeline, MetricSpec};
use tokio::time::sleep;

/// Run `f` with a fresh recorder and return the rendered exposition text.
fn render_with(f: impl FnOnce()) -> String {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::with_local_recorder(&recorder, f);
    handle.render()
}

/// Test that the health checker correctly tracks subsystem status.
///
/// Validates:
/// - Registration of subsystems
/// - Overall status is computed correctly (healthy/degraded/unhealthy)
/// - Readiness follows the worst subsystem
#[tokio::test]
async fn test_health_checker_lifecycle() {
    let checker = HealthChecker::new();

    let health = checker.get_health().await;
    assert_eq!(health.status, HealthStatus::Healthy);
    assert!(health.subsystems.is_empty());
    assert!(checker.is_ready().await, "Should be ready with no subsystems");

    checker.register_subsystem(BROKER_SUBSYSTEM.to_string()).await;
    checker.register_subsystem(INGEST_SUBSYSTEM.to_string()).await;

    let health = checker.get_health().await;
    assert_eq!(health.subsystems.len(), 2);
    for subsystem in &health.subsystems {
        assert_eq!(subsystem.status, HealthStatus::Healthy);
        assert!(subsystem.message.is_none());
    }

    checker
        .update_subsystem(BROKER_SUBSYSTEM, HealthStatus::Degraded, Some("connecting".to_string()))
        .await;
    assert_eq!(checker.get_health().await.status, HealthStatus::Degraded);
    assert!(!checker.is_ready().await, "Should not be ready when degraded");

    checker
        .update_subsystem(BROKER_SUBSYSTEM, HealthStatus::Unhealthy, Some("refused".to_string()))
        .await;
    assert_eq!(checker.get_health().await.status, HealthStatus::Unhealthy);

    checker.update_subsystem(BROKER_SUBSYSTEM, HealthStatus::Healthy, None).await;
    let health = checker.get_health().await;
    assert_eq!(health.status, HealthStatus::Healthy, "Should be fully healthy again");
    assert!(checker.is_ready().await);
}

/// Test concurrent access to health checker from multiple tasks.
///
/// Validates:
/// - Thread-safety of health checker
/// - Consistent state under concurrent load
#[tokio::test]
async fn test_health_checker_concurrent_updates() {
    let checker = HealthChecker::new();
    checker.register_subsystem(BROKER_SUBSYSTEM.to_string()).await;
    checker.register_subsystem(INGEST_SUBSYSTEM.to_string()).await;

    let mut handles = vec![];
    for name in [BROKER_SUBSYSTEM, INGEST_SUBSYSTEM] {
        let checker = checker.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..10 {
                let status = if j % 3 == 0 { HealthStatus::Degraded } else { HealthStatus::Healthy };
                checker.update_subsystem(name, status, Some(format!("Update {}", j))).await;
                sleep(Duration::from_millis(1)).await;
            }
        }));
    }
    for handle in handles {
        handle.await.expect("Task should complete successfully");
    }

    let health = checker.get_health().await;
    assert_eq!(health.subsystems.len(), 2);
    for subsystem in &health.subsystems {
        assert_eq!(subsystem.message.as_deref(), Some("Update 9"));
        assert_eq!(subsystem.status, HealthStatus::Degraded);
    }
}

/// Test that health check serialization works correctly.
///
/// Validates:
/// - HealthCheck serializes to the JSON shape `telemon health` prints
#[tokio::test]
async fn test_health_check_serialization() {
    let checker = HealthChecker::new();
    checker.register_subsystem(BROKER_SUBSYSTEM.to_string()).await;
    checker
        .update_subsystem(BROKER_SUBSYSTEM, HealthStatus::Degraded, Some("connecting".to_string()))
        .await;

    let health = checker.get_health().await;
    let json = serde_json::to_string(&health).expect("Should serialize to JSON");

    assert!(json.contains(r#""status":"degraded""#));
    assert!(json.contains(r#""name":"broker""#));
    assert!(json.contains(r#""message":"connecting""#));

    let parsed: serde_json::Value =
        serde_json::from_str(&json).expect("Should parse as valid JSON");
    assert_eq!(parsed["status"], "degraded");
    assert!(parsed["version"].is_string());
    assert!(parsed["subsystems"].is_array());
}

/// Test metric helper functions.
///
/// Validates:
/// - Helpers record under the documented names and labels
/// - Counters accumulate and gauges hold the last value
#[test]
fn test_metric_helpers() {
    let rendered = render_with(|| {
        register_core_metrics();

        record_ingest_accepted();
        record_ingest_accepted();
        record_ingest_rejected("malformed_payload");
        record_field_defaulted("humedad");
        set_series_len("temperatura", 3);
        set_series_len("temperatura", 7);
        set_connection_state(ConnectionState::Connecting);
        set_connection_state(ConnectionState::Connected);
        record_reconnect_attempt();
    });

    assert!(rendered.contains("telemon_ingest_accepted_total 2"), "{}", rendered);
    assert!(rendered.contains(r#"telemon_ingest_rejected_total{reason="malformed_payload"} 1"#));
    assert!(rendered.contains(r#"telemon_fields_defaulted_total{metric="humedad"} 1"#));
    assert!(rendered.contains(r#"telemon_series_len{metric="temperatura"} 7"#));
    assert!(rendered.contains("telemon_connection_state 2"));
    assert!(rendered.contains("telemon_reconnect_attempts_total 1"));
}

/// Test that the pipeline reports through the metric helpers.
///
/// Validates:
/// - Accepted, rejected, and defaulted payloads are counted
/// - Series length gauges follow the window size
#[test]
fn test_pipeline_metrics() {
    let rendered = render_with(|| {
        let pipeline = IngestionPipeline::with_metrics(
            &[MetricSpec::new("Temperatura"), MetricSpec::new("Humedad")],
            2,
            5,
        );
        for payload in [
            r#"{"Temperatura": 20, "Humedad": 50}"#,
            r#"{"Temperatura": 21}"#,
            r#"{"Temperatura": 22, "Humedad": 52}"#,
        ] {
            pipeline.ingest(payload.as_bytes()).expect("valid payload");
        }
        pipeline.ingest(b"not json").expect_err("malformed payload");
    });

    assert!(rendered.contains("telemon_ingest_accepted_total 3"), "{}", rendered);
    assert!(rendered.contains(r#"telemon_ingest_rejected_total{reason="malformed_payload"} 1"#));
    assert!(rendered.contains(r#"telemon_fields_defaulted_total{metric="humedad"} 1"#));
    assert!(rendered.contains(r#"telemon_series_len{metric="temperatura"} 2"#));
}

/// Test tracing across async boundaries.
///
/// Validates:
/// - Span context is maintained across await points
/// - Instrumented functions record arguments and errors without panicking
#[tokio::test]
async fn test_tracing_instrumentation() {
    #[tracing::instrument(skip(payload))]
    async fn handle_message(topic: &str, payload: Vec<u8>) -> Result<(), String> {
        tracing::debug!(bytes = payload.len(), "Message received");
        sleep(Duration::from_millis(1)).await;
        if payload.is_empty() {
            return Err("empty payload".to_string());
        }
        Ok(())
    }

    let span = tracing::info_span!("supervisor", topic = "sensor_st");
    let _guard = span.enter();

    handle_message("sensor_st", br#"{"Temperatura":23}"#.to_vec()).await.expect("Should succeed");
    assert!(handle_message("sensor_st", Vec::new()).await.is_err());
    tracing::info!(state = %ConnectionState::Connected, "Connection state changed");
}
