//! `telemon monitor` command

use crate::shutdown::shutdown_signal;
use anyhow::Result;
use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use telemon_core::{
    init_observability, Config, ConnectionState, ConnectionSupervisor, DiagnosticLevel,
    HealthChecker, IngestionPipeline, MqttTransport, ObservabilityConfig, SampleOrder,
    SnapshotReader,
};
use tabled::{builder::Builder, settings::Style};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::info;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Width of the sparkline column, in samples.
const SPARK_WIDTH: usize = 40;

/// Diagnostics shown under the dashboard.
const DIAGNOSTIC_ROWS: usize = 5;

/// Keyboard commands, one per input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ClearLogs,
    Quit,
}

impl Action {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "c" | "clear" => Some(Action::ClearLogs),
            "q" | "quit" => Some(Action::Quit),
            _ => None,
        }
    }
}

/// Run the dashboard until Ctrl-C, SIGTERM, or `q`.
pub async fn run(config: Config, refresh: Duration, history: usize) -> Result<()> {
    init_observability(&dashboard_logging(&config.observability))?;

    let pipeline = Arc::new(IngestionPipeline::new(&config));
    let supervisor = ConnectionSupervisor::from_config(&config, Arc::clone(&pipeline))
        .with_health(HealthChecker::new());
    let reader = supervisor.reader();
    let handle = supervisor.start(MqttTransport::new(&config.broker))?;

    let mut shutdown = shutdown_signal();
    let mut ticker = tokio::time::interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            line = input.next_line(), if input_open => match line {
                Ok(Some(line)) => match Action::parse(&line) {
                    Some(Action::ClearLogs) => {
                        pipeline.diagnostics().clear();
                        print!("\x1B[2J\x1B[H{}", render(&config, &reader, history));
                    }
                    Some(Action::Quit) => break,
                    None => {}
                },
                // stdin closed or unreadable: keep rendering, stop listening.
                Ok(None) | Err(_) => input_open = false,
            },
            _ = ticker.tick() => {
                print!("\x1B[2J\x1B[H{}", render(&config, &reader, history));
            }
        }
    }

    info!("Stopping monitor");
    supervisor.stop();
    handle.await?;
    println!("\n{} Monitor stopped", "✓".green().bold());
    Ok(())
}

/// The dashboard owns the terminal, so an unchanged default log level is
/// lowered to warnings. An explicitly configured level (or RUST_LOG) wins.
fn dashboard_logging(configured: &ObservabilityConfig) -> ObservabilityConfig {
    let mut logging = configured.clone();
    if logging.log_level == ObservabilityConfig::default().log_level {
        logging.log_level = "warn".to_string();
    }
    logging
}

/// Render one dashboard frame.
fn render(config: &Config, reader: &SnapshotReader, history: usize) -> String {
    let mut out = String::new();
    let now: DateTime<Local> = Local::now();

    let _ = writeln!(out, "{}", "Sensor Dashboard".bold().underline());
    let _ = writeln!(
        out,
        "{} {}:{}  {} {}  {}",
        "Broker:".bold(),
        config.broker.host,
        config.broker.port,
        "Topic:".bold(),
        config.broker.topic,
        now.format("%H:%M:%S").to_string().dimmed()
    );
    let _ = writeln!(out, "{}\n", badge(reader.connection_state()));

    let names = reader.metric_names();
    let width = names.iter().map(|n| n.len()).max().unwrap_or(0);
    for name in &names {
        let values: Vec<f64> = reader
            .recent_samples(name, SPARK_WIDTH, SampleOrder::OldestFirst)
            .iter()
            .filter_map(|s| s.value(name))
            .collect();
        let current = reader
            .latest_value(name)
            .map(|v| format!("{:>8.1}", v))
            .unwrap_or_else(|| format!("{:>8}", "-"));
        let _ = writeln!(
            out,
            "  {:<width$} {}  {}",
            capitalize(name).bold(),
            current.cyan(),
            sparkline(&values),
            width = width
        );
    }

    if history > 0 {
        let _ = writeln!(out, "\n{}", "History".bold());
        let _ = writeln!(out, "{}", history_table(reader, &names, history));
    }

    let stats = reader.stats();
    let _ = write!(
        out,
        "\n{} {} accepted, {} rejected, {} defaulted fields, window {}",
        "Ingest:".bold(),
        stats.accepted,
        stats.rejected,
        stats.defaulted_fields,
        reader.capacity()
    );
    if let Some(error) = &stats.last_error {
        let _ = write!(out, "  {}", format!("last error: {}", error).red());
    }
    out.push('\n');

    let diagnostics = reader.diagnostics(DIAGNOSTIC_ROWS);
    if !diagnostics.is_empty() {
        let _ = writeln!(out, "\n{}", "Debug Info".bold());
        for entry in diagnostics {
            let at: DateTime<Local> = entry.at.into();
            let level = match entry.level {
                DiagnosticLevel::Info => entry.level.as_str().blue(),
                DiagnosticLevel::Warn => entry.level.as_str().yellow(),
                DiagnosticLevel::Error => entry.level.as_str().red(),
            };
            let _ = writeln!(
                out,
                "  {} {:<5} {}",
                at.format("%H:%M:%S").to_string().dimmed(),
                level,
                entry.message
            );
        }
    }

    let _ = writeln!(out, "\n{}", "Enter c to clear logs, q to quit".dimmed());
    out
}

fn badge(state: ConnectionState) -> ColoredString {
    let label = format!("● {}", capitalize(state.as_str()));
    match state {
        ConnectionState::Connected => label.green().bold(),
        ConnectionState::Connecting => label.yellow().bold(),
        ConnectionState::Failed => label.red().bold(),
        ConnectionState::Disconnected => label.dimmed(),
    }
}

/// Newest-first table of the last `rows` samples.
fn history_table(reader: &SnapshotReader, names: &[String], rows: usize) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };

    let mut builder = Builder::default();
    let mut header = vec!["Time".to_string()];
    header.extend(names.iter().map(|n| capitalize(n)));
    builder.push_record(header);

    // Every accepted payload lands in every series, so one series' samples
    // carry all fields.
    for sample in reader.recent_samples(first, rows, SampleOrder::NewestFirst) {
        let at: DateTime<Local> = sample.timestamp().into();
        let mut record = vec![at.format("%H:%M:%S").to_string()];
        record.extend(
            names
                .iter()
                .map(|n| sample.value(n).map(|v| format!("{:.1}", v)).unwrap_or_default()),
        );
        builder.push_record(record);
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table.to_string()
}

/// Unicode block sparkline scaled between the series min and max.
fn sparkline(values: &[f64]) -> String {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let span = max - min;
    let top = (SPARK_LEVELS.len() - 1) as f64;

    values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                SPARK_LEVELS[SPARK_LEVELS.len() / 2]
            } else {
                SPARK_LEVELS[(((v - min) / span) * top).round() as usize]
            }
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
