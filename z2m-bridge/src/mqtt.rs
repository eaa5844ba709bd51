//! MQTT transport over rumqttc.
//!
//! The rumqttc event loop owns the TCP connection and reconnects on its
//! own; this module pumps its events into the bridge's [`BusEvent`] channel
//! and maps the client handle onto the [`BusTransport`] trait.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::sync::{mpsc, watch};

use z2m_core::{BridgeError, BusEvent, BusTransport, ConnectionState, MqttConfig, Result};

const KEEP_ALIVE: Duration = Duration::from_secs(5);
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const CHANNEL_CAPACITY: usize = 100;

/// Bus transport backed by a rumqttc client.
pub struct MqttTransport {
    client: AsyncClient,
    connected: watch::Receiver<bool>,
}

impl MqttTransport {
    /// Create the transport and start its event pump.
    ///
    /// The returned receiver carries connection-state changes and inbound
    /// messages for the bridge event loop.
    pub fn start(config: &MqttConfig) -> (Self, mpsc::Receiver<BusEvent>) {
        let client_id = format!("z2m-bridge-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, &config.address, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let Some((username, password)) = config.credentials() {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (connected_tx, connected_rx) = watch::channel(false);

        tokio::spawn(pump(eventloop, event_tx, connected_tx));

        (
            Self {
                client,
                connected: connected_rx,
            },
            event_rx,
        )
    }
}

#[async_trait]
impl BusTransport for MqttTransport {
    async fn connect(&self) -> Result<bool> {
        let mut connected = self.connected.clone();
        connected
            .wait_for(|up| *up)
            .await
            .map(|_| true)
            .map_err(|_| BridgeError::transport("event pump stopped"))
    }

    async fn disconnect(&self) -> Result<bool> {
        self.client
            .disconnect()
            .await
            .map(|_| true)
            .map_err(|e| BridgeError::transport(e.to_string()))
    }

    async fn subscribe(&self, topic: &str) -> Result<bool> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map(|_| true)
            .map_err(|e| BridgeError::transport(e.to_string()))
    }

    async fn unsubscribe(&self, topic: &str) -> Result<bool> {
        self.client
            .unsubscribe(topic)
            .await
            .map(|_| true)
            .map_err(|e| BridgeError::transport(e.to_string()))
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<bool> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .await
            .map(|_| true)
            .map_err(|e| BridgeError::transport(e.to_string()))
    }
}

/// Drive the rumqttc event loop and forward what the bridge cares about.
///
/// Stops when the bridge side of the channel is dropped.
async fn pump(
    mut eventloop: EventLoop,
    events: mpsc::Sender<BusEvent>,
    connected: watch::Sender<bool>,
) {
    if events
        .send(BusEvent::ConnectionChanged(ConnectionState::Connecting))
        .await
        .is_err()
    {
        return;
    }

    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                connected.send_replace(true);
                BusEvent::ConnectionChanged(ConnectionState::Connected)
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => BusEvent::Message {
                topic: publish.topic.clone(),
                payload: publish.payload.to_vec(),
            },
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                connected.send_replace(false);
                BusEvent::ConnectionChanged(ConnectionState::Disconnected)
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "MQTT connection error");
                connected.send_replace(false);
                if events
                    .send(BusEvent::ConnectionChanged(ConnectionState::Disconnected))
                    .await
                    .is_err()
                {
                    return;
                }
                // The next poll reconnects; pace the attempts.
                tokio::time::sleep(RECONNECT_DELAY).await;
                BusEvent::ConnectionChanged(ConnectionState::Connecting)
            }
        };

        if events.send(event).await.is_err() {
            return;
        }
    }
}
