//! Best-effort publish/subscribe channel carrying JSON readings.

use std::time::Duration;

use thiserror::Error;

pub mod memory;
pub mod mqtt;

pub use memory::InMemoryBus;
pub use mqtt::MqttBus;

/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot connect to broker: {0}")]
    Connect(String),
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
    #[error("subscribe to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },
    #[error("cannot decode payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("connection closed")]
    Closed,
}

/// At-most-once pub/sub connection.
///
/// Delivery order is best-effort FIFO per publishing connection; nothing
/// is retried or acknowledged.
pub trait PubSub {
    /// Publishes `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the message cannot be queued.
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Starts delivering messages from `topic` to this connection.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the subscription request fails.
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Waits up to `timeout` for the next message.
    ///
    /// Returns `Ok(None)` when the wait times out.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Closed` once the connection is gone.
    fn next_message(&mut self, timeout: Duration) -> Result<Option<Message>, TransportError>;

    /// Releases the connection. Further calls fail with `Closed`.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the disconnect request fails.
    fn disconnect(&mut self) -> Result<(), TransportError>;
}
