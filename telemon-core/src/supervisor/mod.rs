//! Broker connection supervision.
//!
//! A [`ConnectionSupervisor`] owns the lifecycle of one topic subscription:
//! it drives a [`Transport`], forwards every message to the
//! [`IngestionPipeline`], and reconnects with exponential backoff until
//! [`ConnectionSupervisor::stop`] is called.
//!
//! # Example
//!
//! ```ignore
//! let pipeline = Arc::new(IngestionPipeline::new(&config));
//! let supervisor = ConnectionSupervisor::from_config(&config, pipeline);
//! let reader = supervisor.reader();
//!
//! let handle = supervisor.start(MqttTransport::new(&config.broker))?;
//! // ... render reader.latest_value("temperatura") periodically ...
//! supervisor.stop();
//! handle.await?;
//! ```

mod backoff;
mod mqtt;
mod state;
mod transport;

pub use backoff::Backoff;
pub use mqtt::MqttTransport;
pub use state::ConnectionState;
pub use transport::{Transport, TransportEvent};

use crate::config::{BackoffConfig, Config};
use crate::error::{IngestError, Result, TelemonError};
use crate::observability::health::{HealthChecker, HealthStatus, BROKER_SUBSYSTEM, INGEST_SUBSYSTEM};
use crate::observability::metrics as telemetry;
use crate::series::IngestionPipeline;
use crate::snapshot::SnapshotReader;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Supervises one subscription and feeds its messages into a pipeline.
///
/// Cloning yields another handle to the same supervisor.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    topic: String,
    pipeline: Arc<IngestionPipeline>,
    backoff: BackoffConfig,
    state: Arc<watch::Sender<ConnectionState>>,
    stop: Arc<watch::Sender<bool>>,
    started: Arc<AtomicBool>,
    reconnect_attempts: Arc<AtomicU64>,
    health: Option<HealthChecker>,
}

impl ConnectionSupervisor {
    pub fn new(
        topic: impl Into<String>,
        pipeline: Arc<IngestionPipeline>,
        backoff: BackoffConfig,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (stop, _) = watch::channel(false);
        Self {
            topic: topic.into(),
            pipeline,
            backoff,
            state: Arc::new(state),
            stop: Arc::new(stop),
            started: Arc::new(AtomicBool::new(false)),
            reconnect_attempts: Arc::new(AtomicU64::new(0)),
            health: None,
        }
    }

    pub fn from_config(config: &Config, pipeline: Arc<IngestionPipeline>) -> Self {
        Self::new(config.broker.topic.clone(), pipeline, config.backoff.clone())
    }

    /// Report broker and ingest health to `health`.
    pub fn with_health(mut self, health: HealthChecker) -> Self {
        self.health = Some(health);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Read-only view over the pipeline and this supervisor's state.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader::new(Arc::clone(&self.pipeline), self.state_receiver())
    }

    /// Reconnect attempts made since start.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Begin connecting in a background task.
    ///
    /// Must be called from within a tokio runtime. A supervisor can be
    /// started once; starting after [`stop`](Self::stop) is an error.
    pub fn start<T: Transport>(&self, transport: T) -> Result<JoinHandle<()>> {
        if self.is_stopped() {
            return Err(TelemonError::Internal("supervisor has been stopped".to_string()));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(TelemonError::Internal("supervisor already started".to_string()));
        }

        info!(topic = %self.topic, transport = transport.name(), "Starting connection supervisor");
        self.pipeline.diagnostics().info(format!("Connecting to broker for topic {}", self.topic));
        self.transition(ConnectionState::Connecting);

        Ok(tokio::spawn(self.clone().run(transport)))
    }

    /// Close the connection and suppress all further reconnects.
    ///
    /// Safe to call from any thread, any number of times. Takes effect before
    /// the next reconnect attempt; an ingest already in progress completes.
    pub fn stop(&self) {
        if self.stop.send_replace(true) {
            return;
        }
        info!(topic = %self.topic, "Stop requested");
        self.transition(ConnectionState::Disconnected);
        self.pipeline.diagnostics().info("Supervisor stopped");
    }

    /// Apply a state change if it is legal and the supervisor is still
    /// running (only `Disconnected` is accepted after stop).
    fn transition(&self, next: ConnectionState) -> bool {
        let mut previous = next;
        let changed = self.state.send_if_modified(|current| {
            previous = *current;
            if *current == next {
                return false;
            }
            if self.is_stopped() && next != ConnectionState::Disconnected {
                return false;
            }
            if !current.can_transition_to(next) {
                warn!(from = %current, to = %next, "Ignoring illegal connection state transition");
                return false;
            }
            *current = next;
            true
        });

        if changed {
            info!(from = %previous, to = %next, topic = %self.topic, "Connection state changed");
            telemetry::set_connection_state(next);
        }
        changed
    }

    #[instrument(skip_all, fields(topic = %self.topic, transport = transport.name()))]
    async fn run<T: Transport>(self, mut transport: T) {
        let mut backoff = Backoff::from_config(&self.backoff);
        let mut stop_rx = self.stop.subscribe();
        let mut ingest_healthy = true;

        if let Some(health) = &self.health {
            health.register_subsystem(BROKER_SUBSYSTEM.to_string()).await;
            health.register_subsystem(INGEST_SUBSYSTEM.to_string()).await;
        }
        self.report_broker_health(ConnectionState::Connecting, None).await;

        loop {
            let event = tokio::select! {
                biased;
                _ = stopped(&mut stop_rx) => break,
                event = transport.poll() => event,
            };
            if self.is_stopped() {
                break;
            }

            match event {
                TransportEvent::Connected => {
                    self.transition(ConnectionState::Connected);
                    backoff.reset();

                    if let Err(e) = transport.subscribe(&self.topic).await {
                        if !self.reconnect_after(&e.to_string(), &mut backoff, &mut stop_rx).await {
                            break;
                        }
                        continue;
                    }

                    info!("Connected and subscribed");
                    self.pipeline
                        .diagnostics()
                        .info(format!("Connected to broker, subscribed to {}", self.topic));
                    self.report_broker_health(ConnectionState::Connected, None).await;
                }
                TransportEvent::Message { topic, payload } => {
                    let ok = self.deliver(&topic, &payload).is_ok();
                    if ok != ingest_healthy {
                        ingest_healthy = ok;
                        self.report_ingest_health(ok).await;
                    }
                }
                TransportEvent::Disconnected { reason } => {
                    if !self.reconnect_after(&reason, &mut backoff, &mut stop_rx).await {
                        break;
                    }
                }
            }
        }

        transport.close().await;
        self.transition(ConnectionState::Disconnected);
        self.report_broker_health(ConnectionState::Disconnected, Some("stopped".to_string())).await;
        info!("Connection supervisor stopped");
    }

    /// Hand one payload to the pipeline. Failures are recorded, never raised.
    fn deliver(&self, topic: &str, payload: &[u8]) -> std::result::Result<(), IngestError> {
        debug!(topic, bytes = payload.len(), "Message received");
        self.pipeline.ingest(payload).map_err(|e| {
            warn!(topic, error = %e, "Dropping message");
            self.pipeline.diagnostics().warn(format!("Error processing message on {}: {}", topic, e));
            e
        })
    }

    /// Record the lost connection, wait out the backoff, and move back to
    /// `Connecting`. Returns `false` if stopped meanwhile.
    async fn reconnect_after(
        &self,
        reason: &str,
        backoff: &mut Backoff,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> bool {
        let lost = match self.state() {
            ConnectionState::Connecting => ConnectionState::Failed,
            _ => ConnectionState::Disconnected,
        };
        self.transition(lost);
        warn!(reason, state = %lost, "Broker connection unavailable");
        self.pipeline.diagnostics().warn(format!("Disconnected from broker: {}", reason));
        self.report_broker_health(lost, Some(reason.to_string())).await;

        let delay = backoff.next_delay();
        info!(delay_ms = delay.as_millis() as u64, attempt = backoff.attempt(), "Scheduling reconnect");

        tokio::select! {
            biased;
            _ = stopped(stop_rx) => return false,
            _ = tokio::time::sleep(delay) => {}
        }
        if self.is_stopped() {
            return false;
        }

        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
        telemetry::record_reconnect_attempt();
        self.transition(ConnectionState::Connecting);
        self.report_broker_health(ConnectionState::Connecting, None).await;
        true
    }

    async fn report_broker_health(&self, state: ConnectionState, message: Option<String>) {
        let Some(health) = &self.health else {
            return;
        };
        let status = match state {
            ConnectionState::Connected => HealthStatus::Healthy,
            ConnectionState::Failed => HealthStatus::Unhealthy,
            ConnectionState::Connecting | ConnectionState::Disconnected => HealthStatus::Degraded,
        };
        health.update_subsystem(BROKER_SUBSYSTEM, status, message).await;
    }

    async fn report_ingest_health(&self, ok: bool) {
        let Some(health) = &self.health else {
            return;
        };
        if ok {
            health.update_subsystem(INGEST_SUBSYSTEM, HealthStatus::Healthy, None).await;
        } else {
            let message = self.pipeline.stats().last_error;
            health.update_subsystem(INGEST_SUBSYSTEM, HealthStatus::Degraded, message).await;
        }
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("topic", &self.topic)
            .field("state", &self.state())
            .field("stopped", &self.is_stopped())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish()
    }
}

/// Resolves once the stop flag is set.
async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    while !*stop_rx.borrow_and_update() {
        if stop_rx.changed().await.is_err() {
            // Sender gone: nobody can stop us any more.
            std::future::pending::<()>().await;
        }
    }
}
