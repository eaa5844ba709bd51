//! Bridge composition and event loop.
//!
//! [`Z2mBridge`] wires the topic scheme, normalizer, lifecycle, router and
//! discovery coordinator together around a [`BusTransport`]. All state
//! transitions happen on the single event loop in [`Z2mBridge::run`], so no
//! mutex is needed around the lifecycle or the scan state.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::config::BridgeConfig;
use crate::discovery::DiscoveryCoordinator;
use crate::envelope::{MESSAGE_KEY, MessageEnvelope};
use crate::error::{BridgeError, Result};
use crate::lifecycle::{BridgeStatus, ConnectionLifecycle, ConnectionState};
use crate::registry::{ChannelSink, DeviceRegistry};
use crate::router::{BridgeAction, LogEvent};
use crate::topic::TopicScheme;
use crate::transport::{BusEvent, BusTransport};

/// The bridge engine.
pub struct Z2mBridge {
    config: BridgeConfig,
    scheme: TopicScheme,
    lifecycle: ConnectionLifecycle,
    discovery: Option<DiscoveryCoordinator>,
    transport: Arc<dyn BusTransport>,
    registry: Arc<dyn DeviceRegistry>,
    channels: Arc<dyn ChannelSink>,
}

impl Z2mBridge {
    /// Create a bridge from its configuration and collaborators.
    ///
    /// Fails with [`BridgeError::Config`] on an invalid configuration; the
    /// bridge never starts then. The returned watch receiver is the host's
    /// view of the bridge status.
    pub fn new(
        config: BridgeConfig,
        transport: Arc<dyn BusTransport>,
        registry: Arc<dyn DeviceRegistry>,
        channels: Arc<dyn ChannelSink>,
    ) -> Result<(Self, watch::Receiver<BridgeStatus>)> {
        config.validate()?;

        let scheme = TopicScheme::new(&config.topics.base, &config.topics.discovery);
        let (lifecycle, status_rx) = ConnectionLifecycle::new();

        Ok((
            Self {
                config,
                scheme,
                lifecycle,
                discovery: None,
                transport,
                registry,
                channels,
            },
            status_rx,
        ))
    }

    /// Attach a discovery coordinator. Set once at composition time.
    pub fn with_discovery(mut self) -> Self {
        self.discovery = Some(DiscoveryCoordinator::new());
        self
    }

    /// The bridge's topic scheme.
    pub fn scheme(&self) -> &TopicScheme {
        &self.scheme
    }

    /// Current transport connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// Start the bridge: await the initial broker connect, bounded by the
    /// configured connect timeout.
    ///
    /// This is the only operation that blocks on a transport result. On
    /// failure the bridge reports offline/communication-error and returns
    /// [`BridgeError::Connect`]; reconnection stays with the transport.
    pub async fn start(&mut self) -> Result<()> {
        self.lifecycle.transition(ConnectionState::Connecting);

        let timeout = Duration::from_secs(self.config.mqtt.connect_timeout_secs);
        let connected = match tokio::time::timeout(timeout, self.transport.connect()).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                self.lifecycle.report_offline("communication error");
                return Err(BridgeError::connect(e.to_string()));
            }
            Err(_) => {
                self.lifecycle.report_offline("communication error");
                return Err(BridgeError::connect(format!(
                    "no connection after {}s",
                    timeout.as_secs()
                )));
            }
        };

        if !connected {
            tracing::error!(
                address = %self.config.mqtt.address,
                port = self.config.mqtt.port,
                "Cannot connect to MQTT broker"
            );
            self.lifecycle.report_offline("communication error");
            return Err(BridgeError::connect(self.config.mqtt.address.clone()));
        }

        Ok(())
    }

    /// Process transport events until the channel closes.
    ///
    /// The discovery scan deadline is the only timer; everything else is
    /// driven by inbound events.
    pub async fn run(&mut self, mut events: mpsc::Receiver<BusEvent>) {
        loop {
            let deadline = self.discovery.as_ref().and_then(|d| d.deadline());
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = async { tokio::time::sleep_until(deadline.unwrap()).await },
                        if deadline.is_some() => {
                    if let Some(discovery) = &mut self.discovery {
                        discovery.expire();
                    }
                }
            }
        }
    }

    /// Dispatch one transport event.
    pub async fn handle_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::ConnectionChanged(state) => self.connection_changed(state).await,
            BusEvent::Message { topic, payload } => self.handle_message(&topic, &payload).await,
        }
    }

    /// Tear the bridge down: drop any in-flight scan, unsubscribe, and
    /// disconnect from the broker.
    pub async fn stop(&mut self) {
        if let Some(discovery) = &mut self.discovery {
            discovery.cancel();
        }

        for topic in self.subscribed_topics() {
            if let Err(e) = self.transport.unsubscribe(&topic).await {
                tracing::warn!(topic = %topic, error = %e, "Unsubscribe failed");
            }
        }

        if let Err(e) = self.transport.disconnect().await {
            tracing::warn!(error = %e, "Error while disconnecting from broker");
        }
    }

    async fn connection_changed(&mut self, state: ConnectionState) {
        if !self.lifecycle.transition(state) {
            return;
        }

        match state {
            ConnectionState::Connected => {
                self.resubscribe().await;
                self.trigger_discovery().await;
            }
            ConnectionState::Disconnected => {
                // A scan cannot complete without a connection; drop it now
                // instead of waiting out the deadline.
                if let Some(discovery) = &mut self.discovery {
                    discovery.cancel();
                }
            }
            ConnectionState::Connecting | ConnectionState::Unknown => {}
        }
    }

    async fn handle_message(&mut self, topic: &str, payload: &[u8]) {
        let envelope = match MessageEnvelope::normalize(topic, payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Dropped; one bad message never affects the next one.
                tracing::warn!(topic = %topic, error = %e, "Dropping unparseable message");
                return;
            }
        };

        match BridgeAction::parse(self.scheme.action_from_topic(topic)) {
            BridgeAction::NetworkMapGraphviz => {
                if let Some(dot) = envelope.message_str() {
                    self.channels.network_map(dot);
                }
            }
            BridgeAction::State => self.handle_state(&envelope).await,
            BridgeAction::Config => self.handle_config(&envelope),
            BridgeAction::Log => self.handle_log(&envelope).await,
            BridgeAction::ConfigDevices => self.handle_discovery_response(&envelope),
            BridgeAction::Unhandled(action) => {
                tracing::trace!(topic = %topic, action = %action, "Unhandled topic");
            }
        }
    }

    async fn handle_state(&mut self, envelope: &MessageEnvelope) {
        let Some(label) = envelope.message_str() else {
            return;
        };
        let Some(status) = BridgeStatus::parse_label(label) else {
            tracing::trace!(label = %label, "Unknown connection-state label");
            return;
        };

        if self.lifecycle.update_status(status) {
            self.trigger_discovery().await;
        }
    }

    fn handle_config(&mut self, envelope: &MessageEnvelope) {
        let mut properties = std::collections::BTreeMap::new();

        // Iterates the wrapped object form, so a plain-text payload is
        // forwarded as a property under the message key.
        for (key, value) in envelope.to_object() {
            match key.as_str() {
                "log_level" => {
                    if let Some(level) = value.as_str() {
                        self.channels.log_level_changed(level);
                    }
                }
                "permit_join" => {
                    self.channels.permit_join_changed(as_flag(&value));
                }
                _ => {
                    if let Some(text) = scalar_text(&value) {
                        tracing::debug!(key = %key, value = %text, "Bridge property received");
                        properties.insert(key, text);
                    }
                }
            }
        }

        if !properties.is_empty() {
            self.registry.update_bridge_properties(properties);
        }
    }

    async fn handle_log(&mut self, envelope: &MessageEnvelope) {
        let Some(log_type) = envelope.get("type").and_then(Value::as_str) else {
            return;
        };
        // Structured message payloads are informational only; numeric and
        // boolean scalars are rendered as text before dispatch.
        let Some(message) = envelope.get(MESSAGE_KEY).and_then(scalar_text) else {
            return;
        };

        match LogEvent::parse(log_type) {
            LogEvent::DeviceConnected => {
                tracing::info!(log_type = %log_type, message = %message, "Gateway log");
                self.registry.update_device_status(
                    &device_id_of(&message),
                    true,
                    "device paired again to controller",
                );
                self.trigger_discovery().await;
            }
            LogEvent::PublishError => {
                tracing::error!(log_type = %log_type, message = %message, "Gateway log");
            }
            LogEvent::DeviceRemoved | LogEvent::DeviceBanned => {
                tracing::warn!(log_type = %log_type, message = %message, "Gateway log");
                self.registry.update_device_status(
                    &device_id_of(&message),
                    false,
                    "device removed from controller",
                );
            }
            LogEvent::Other => {
                tracing::info!(log_type = %log_type, message = %message, "Gateway log");
            }
        }
    }

    fn handle_discovery_response(&mut self, envelope: &MessageEnvelope) {
        let Some(discovery) = &mut self.discovery else {
            return;
        };

        for device in discovery.handle_response(envelope) {
            tracing::debug!(
                device_id = %device.device_id,
                device_type = %device.device_type,
                model = %device.model,
                friendly_name = %device.friendly_name,
                "Device discovered"
            );
            self.registry.upsert_device(device);
        }
    }

    /// Start a discovery scan as a side effect. A no-op without a
    /// coordinator, while disconnected, or while a scan is running.
    async fn trigger_discovery(&mut self) {
        if self.lifecycle.state() != ConnectionState::Connected {
            return;
        }
        let Some(discovery) = &mut self.discovery else {
            return;
        };
        if !discovery.begin_scan() {
            return;
        }

        let response_topic = self.scheme.bridge_config_devices();
        let request_topic = self.scheme.bridge_config_devices_get();
        self.subscribe_logged(&response_topic).await;
        self.publish_logged(&request_topic, b"get").await;
    }

    async fn resubscribe(&self) {
        for topic in self.scheme.subscription_topics() {
            self.subscribe_logged(&topic).await;
        }
    }

    /// Publish the gateway's permit-join flag.
    pub async fn set_permit_join(&self, permit: bool) {
        let payload = if permit { "true" } else { "false" };
        self.publish_logged(&self.scheme.bridge_permit_join(), payload.as_bytes())
            .await;
    }

    /// Publish the gateway's log level.
    pub async fn set_log_level(&self, level: &str) {
        self.publish_logged(&self.scheme.bridge_log_level(), level.as_bytes())
            .await;
    }

    /// Ask the gateway for a fresh graphviz network map.
    pub async fn request_network_map(&self) {
        self.publish_logged(&self.scheme.bridge_networkmap(), b"graphviz")
            .await;
    }

    /// Publish a command payload to a device's command topic.
    pub async fn publish_device_command(&self, device_id: &str, payload: &[u8]) {
        self.publish_logged(&self.scheme.device(device_id), payload).await;
    }

    /// Ask a device for its current state.
    pub async fn request_device_refresh(&self, device_id: &str) {
        self.publish_logged(&self.scheme.device_get(device_id), b"").await;
    }

    async fn subscribe_logged(&self, topic: &str) {
        match self.transport.subscribe(topic).await {
            Ok(true) => tracing::debug!(topic = %topic, "Subscribed"),
            Ok(false) => tracing::warn!(topic = %topic, "Subscribe skipped, broker not connected"),
            Err(e) => tracing::warn!(topic = %topic, error = %e, "Subscribe failed"),
        }
    }

    async fn publish_logged(&self, topic: &str, payload: &[u8]) {
        match self.transport.publish(topic, payload).await {
            Ok(true) => tracing::debug!(topic = %topic, "Published"),
            Ok(false) => tracing::warn!(topic = %topic, "Publish skipped, broker not connected"),
            Err(e) => tracing::warn!(topic = %topic, error = %e, "Publish failed"),
        }
    }

    fn subscribed_topics(&self) -> Vec<String> {
        let mut topics = self.scheme.subscription_topics();
        if self.discovery.is_some() {
            topics.push(self.scheme.bridge_config_devices());
        }
        topics
    }
}

/// Device ids in log messages may carry a trailing CRLF; strip it before
/// the registry lookup.
fn device_id_of(message: &str) -> String {
    message.replace("\r\n", "")
}

fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
