//! Transport abstraction driven by the supervisor.

use crate::error::Result;
use async_trait::async_trait;

/// Something that happened on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker accepted the connection.
    Connected,
    /// A message arrived on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },
    /// The connection was lost, refused, or could not be established.
    Disconnected { reason: String },
}

/// A broker connection the supervisor can drive.
///
/// Implementations own reconnection mechanics: calling [`Transport::poll`]
/// after a `Disconnected` event starts a fresh connection attempt. Timing
/// between attempts is the supervisor's job.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Human-readable transport name for logs.
    fn name(&self) -> &'static str;

    /// Request a subscription on the current connection.
    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// Wait for the next event.
    async fn poll(&mut self) -> TransportEvent;

    /// Close the connection. Errors are ignored.
    async fn close(&mut self);
}
