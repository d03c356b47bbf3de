//! MQTT transport backed by `rumqttc`.
//!
//! `rumqttc` reconnects on the next `poll` after an error, which is exactly
//! the contract [`Transport`] asks for; this type only translates its events.

use crate::config::BrokerConfig;
use crate::error::{Result, TelemonError};
use crate::supervisor::transport::{Transport, TransportEvent};
use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use std::time::Duration;
use tracing::{debug, trace};

/// Capacity of the request channel between client handle and event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Sensor readings are fire-and-forget.
const SUBSCRIBE_QOS: QoS = QoS::AtMostOnce;

/// Upper bound on flushing DISCONNECT during close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A single MQTT v3.1.1 connection.
pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl MqttTransport {
    /// Configure a connection; nothing is dialed until the first poll.
    pub fn new(broker: &BrokerConfig) -> Self {
        let client_id = broker.resolved_client_id();
        debug!(host = %broker.host, port = broker.port, client_id = %client_id, "Configuring MQTT transport");

        let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
        options.set_keep_alive(broker.keep_alive());
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        Self { client, eventloop }
    }

    /// Drive the event loop until DISCONNECT has been written or the
    /// connection is gone.
    async fn flush_disconnect(&mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return,
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Connection closed before DISCONNECT was sent");
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.client.subscribe(topic, SUBSCRIBE_QOS).await.map_err(|e| TelemonError::SubscribeFailed {
            topic: topic.to_string(),
            reason: e.to_string(),
        })
    }

    async fn poll(&mut self) -> TransportEvent {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        return TransportEvent::Connected;
                    }
                    return TransportEvent::Disconnected {
                        reason: format!("connection refused: {:?}", ack.code),
                    };
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return TransportEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    };
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    return TransportEvent::Disconnected {
                        reason: "broker closed the session".to_string(),
                    };
                }
                Ok(event) => {
                    trace!(?event, "Ignoring MQTT event");
                }
                Err(e) => {
                    return TransportEvent::Disconnected { reason: e.to_string() };
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect request failed");
            return;
        }
        if tokio::time::timeout(CLOSE_TIMEOUT, self.flush_disconnect()).await.is_err() {
            debug!("Timed out flushing MQTT disconnect");
        }
    }
}
