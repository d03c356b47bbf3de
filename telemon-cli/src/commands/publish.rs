//! `telemon publish` command

use crate::shutdown::shutdown_signal;
use anyhow::Result;
use colored::Colorize;
use rand::Rng;
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, Packet, QoS};
use serde_json::{json, Value};
use std::time::Duration;
use telemon_core::{init_observability, Config};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Pause between reconnect polls after a connection error.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Publish simulated readings until stopped or `count` is reached.
pub async fn run(config: Config, interval: Duration, count: Option<u64>) -> Result<()> {
    init_observability(&config.observability)?;

    let client_id = format!("telemon-sensor-{}", rand::thread_rng().gen_range(0..10_000));
    let mut options = MqttOptions::new(client_id, config.broker.host.clone(), config.broker.port);
    options.set_keep_alive(config.broker.keep_alive());
    let (client, mut eventloop) = AsyncClient::new(options, 10);

    // rumqttc only makes progress while polled; it reconnects on the next
    // poll after an error.
    let driver = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => info!("Publisher connected"),
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Publisher connection error");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    });

    println!(
        "{} Publishing to {} on {}:{}",
        "→".cyan().bold(),
        config.broker.topic.bold(),
        config.broker.host,
        config.broker.port
    );

    let mut shutdown = shutdown_signal();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sent = 0u64;

    while !limit_reached(count, sent) {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {}
        }

        let payload = reading().to_string();
        match client.try_publish(&config.broker.topic, QoS::AtMostOnce, false, payload.clone()) {
            Ok(()) => {
                sent += 1;
                println!("  {} {}", "•".dimmed(), payload);
            }
            Err(e) => warn!(error = %e, "Reading dropped"),
        }
    }

    if let Err(e) = client.try_disconnect() {
        warn!(error = %e, "Disconnect request failed");
    }
    if tokio::time::timeout(Duration::from_secs(2), driver).await.is_err() {
        warn!("Publisher did not disconnect in time");
    }

    println!("{} Published {} reading(s)", "✓".green().bold(), sent);
    Ok(())
}

fn limit_reached(count: Option<u64>, sent: u64) -> bool {
    count.is_some_and(|limit| sent >= limit)
}

/// One simulated sensor reading.
fn reading() -> Value {
    let mut rng = rand::thread_rng();
    json!({
        "Temperatura": round1(rng.gen_range(20.0..30.0)),
        "Humedad": round1(rng.gen_range(40.0..80.0)),
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
