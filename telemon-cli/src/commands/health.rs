//! `telemon health` command

use anyhow::{bail, Result};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};
use telemon_core::observability::health::{HealthStatus, SubsystemHealth, BROKER_SUBSYSTEM};
use telemon_core::{
    init_observability, Config, ConnectionSupervisor, HealthChecker, IngestionPipeline,
    MqttTransport,
};
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Tabled)]
struct SubsystemRow {
    #[tabled(rename = "SUBSYSTEM")]
    name: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "MESSAGE")]
    message: String,
}

impl From<SubsystemHealth> for SubsystemRow {
    fn from(s: SubsystemHealth) -> Self {
        Self {
            name: s.name,
            status: status_label(s.status).to_string(),
            message: s.message.unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Connect, wait for the subscription, and print subsystem health.
///
/// Fails if the broker is not reachable within `timeout`.
pub async fn run(config: Config, timeout: Duration) -> Result<()> {
    init_observability(&config.observability)?;

    let pipeline = Arc::new(IngestionPipeline::new(&config));
    let health = HealthChecker::new();
    let supervisor =
        ConnectionSupervisor::from_config(&config, pipeline).with_health(health.clone());
    let handle = supervisor.start(MqttTransport::new(&config.broker))?;

    let deadline = Instant::now() + timeout;
    let mut connected = false;
    while Instant::now() < deadline {
        if health.subsystem_status(BROKER_SUBSYSTEM).await == Some(HealthStatus::Healthy) {
            connected = true;
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    let report = health.get_health().await;
    supervisor.stop();
    handle.await?;

    println!("Status: {}", status_label(report.status));
    println!("Version: {}", report.version);
    if !report.subsystems.is_empty() {
        let rows: Vec<SubsystemRow> = report.subsystems.into_iter().map(Into::into).collect();
        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{}", table);
    }

    if !connected {
        bail!(
            "broker {}:{} not reachable within {}s",
            config.broker.host,
            config.broker.port,
            timeout.as_secs()
        );
    }
    Ok(())
}

fn status_label(status: HealthStatus) -> colored::ColoredString {
    match status {
        HealthStatus::Healthy => "healthy".green(),
        HealthStatus::Degraded => "degraded".yellow(),
        HealthStatus::Unhealthy => "unhealthy".red(),
    }
}
