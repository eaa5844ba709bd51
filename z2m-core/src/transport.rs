//! Bus transport interface.
//!
//! The bridge talks to the broker through this trait only. Inbound traffic
//! (messages and connection-state changes) arrives as [`BusEvent`]s on an
//! mpsc channel owned by the transport, which keeps every state transition
//! on the bridge's single event loop.

use async_trait::async_trait;

use crate::error::Result;
use crate::lifecycle::ConnectionState;

/// An event delivered by the bus transport.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// The transport's connection state changed.
    ConnectionChanged(ConnectionState),
    /// A message arrived on a subscribed topic.
    Message {
        /// Topic the message arrived on.
        topic: String,
        /// Raw, unparsed payload.
        payload: Vec<u8>,
    },
}

/// Asynchronous pub/sub transport collaborator.
///
/// Operations resolve to `Ok(true)` on success and `Ok(false)` when the
/// broker is not connected yet; the bridge observes the result for
/// diagnostic logging only and never blocks its event path on it, except
/// for the initial [`connect`](BusTransport::connect) at startup.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Establish the broker connection.
    async fn connect(&self) -> Result<bool>;

    /// Tear the broker connection down.
    async fn disconnect(&self) -> Result<bool>;

    /// Subscribe to a topic.
    async fn subscribe(&self, topic: &str) -> Result<bool>;

    /// Unsubscribe from a topic.
    async fn unsubscribe(&self, topic: &str) -> Result<bool>;

    /// Publish a payload to a topic.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<bool>;
}
