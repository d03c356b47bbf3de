//! Observability infrastructure: tracing, metrics, health checks.
//!
//! Binaries call [`init`] once at startup. Library code only uses the
//! `tracing` and `metrics` macros, which are no-ops until a subscriber or
//! recorder is installed.

use crate::config::ObservabilityConfig;
use crate::error::{Result, TelemonError};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod health;
pub mod metrics;

/// Initialize the global observability infrastructure.
///
/// `RUST_LOG` takes precedence over the configured log level. Logs go to
/// stderr so they never interleave with rendered output on stdout. When a
/// metrics port is configured a Prometheus scrape endpoint is started; this
/// must then be called from within a tokio runtime.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemonError::ObservabilitySetup {
            reason: format!("invalid log level {:?}: {}", config.log_level, e),
        })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .try_init()
        .map_err(|e| TelemonError::ObservabilitySetup { reason: e.to_string() })?;

    if let Some(port) = config.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .map_err(|e| TelemonError::ObservabilitySetup { reason: e.to_string() })?;
        tracing::info!(port, "Prometheus exporter listening");
    }

    metrics::register_core_metrics();

    Ok(())
}
