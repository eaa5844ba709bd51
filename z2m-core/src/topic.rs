//! Topic scheme for the zigbee2mqtt namespace.
//!
//! All well-known bridge topics live under `<base>/bridge/...`; per-device
//! topics are `<base>/<deviceId>` and `<base>/<deviceId>/get`. Vendor
//! discovery announcements use `<discovery>/<type>/<deviceId>/<objectId>/...`.

use crate::error::{BridgeError, Result};

/// Default base topic of a zigbee2mqtt gateway.
pub const DEFAULT_BASE_TOPIC: &str = "zigbee2mqtt";

/// Default discovery topic prefix.
pub const DEFAULT_DISCOVERY_TOPIC: &str = "homeassistant";

/// Computes the fixed topic set from configurable base and discovery
/// prefixes, and parses incoming topics back into routing actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    base: String,
    discovery: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_TOPIC, DEFAULT_DISCOVERY_TOPIC)
    }
}

impl TopicScheme {
    /// Create a scheme for the given base and discovery prefixes.
    pub fn new(base: impl Into<String>, discovery: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            discovery: discovery.into(),
        }
    }

    /// The configured base topic.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The configured discovery topic prefix.
    pub fn discovery(&self) -> &str {
        &self.discovery
    }

    /// `<base>/bridge/state`
    pub fn bridge_state(&self) -> String {
        format!("{}/bridge/state", self.base)
    }

    /// `<base>/bridge/config`
    pub fn bridge_config(&self) -> String {
        format!("{}/bridge/config", self.base)
    }

    /// `<base>/bridge/log`
    pub fn bridge_log(&self) -> String {
        format!("{}/bridge/log", self.base)
    }

    /// `<base>/bridge/networkmap`
    pub fn bridge_networkmap(&self) -> String {
        format!("{}/bridge/networkmap", self.base)
    }

    /// `<base>/bridge/networkmap/graphviz`
    pub fn bridge_networkmap_graphviz(&self) -> String {
        format!("{}/bridge/networkmap/graphviz", self.base)
    }

    /// `<base>/bridge/config/permit_join`
    pub fn bridge_permit_join(&self) -> String {
        format!("{}/bridge/config/permit_join", self.base)
    }

    /// `<base>/bridge/config/log_level`
    pub fn bridge_log_level(&self) -> String {
        format!("{}/bridge/config/log_level", self.base)
    }

    /// `<base>/bridge/config/devices`, where device list responses arrive.
    pub fn bridge_config_devices(&self) -> String {
        format!("{}/bridge/config/devices", self.base)
    }

    /// `<base>/bridge/config/devices/get`, where device list requests go.
    pub fn bridge_config_devices_get(&self) -> String {
        format!("{}/bridge/config/devices/get", self.base)
    }

    /// `<base>/<deviceId>`, the per-device command topic.
    pub fn device(&self, device_id: &str) -> String {
        format!("{}/{}", self.base, device_id)
    }

    /// `<base>/<deviceId>/get`, the per-device state request topic.
    pub fn device_get(&self, device_id: &str) -> String {
        format!("{}/{}/get", self.base, device_id)
    }

    /// The topics the bridge subscribes to while connected.
    pub fn subscription_topics(&self) -> Vec<String> {
        vec![
            self.bridge_state(),
            self.bridge_config(),
            self.bridge_log(),
            self.bridge_networkmap_graphviz(),
        ]
    }

    /// Extract the routing action from a topic.
    ///
    /// Strips the `<base>/bridge/` prefix; a topic outside that prefix is
    /// returned unmodified. Never fails.
    ///
    /// # Example
    /// ```
    /// use z2m_core::topic::TopicScheme;
    ///
    /// let scheme = TopicScheme::default();
    /// assert_eq!(scheme.action_from_topic("zigbee2mqtt/bridge/state"), "state");
    /// assert_eq!(scheme.action_from_topic("other/topic"), "other/topic");
    /// ```
    pub fn action_from_topic<'a>(&self, topic: &'a str) -> &'a str {
        let prefix = format!("{}/bridge/", self.base);
        topic.strip_prefix(&prefix).unwrap_or(topic)
    }
}

/// Parsed vendor discovery topic.
///
/// Example: `homeassistant/sensor/0x00158d0002320b4f/battery/config`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryTopic {
    /// The unparsed topic string.
    pub topic: String,
    /// Device type segment (e.g. "sensor").
    pub device_type: String,
    /// Device identifier segment (the ieeeAddr).
    pub device_id: String,
    /// Object identifier segment (e.g. "battery").
    pub object_id: String,
}

impl DiscoveryTopic {
    /// Parse a discovery topic of the shape
    /// `<discovery>/<type>/<deviceId>/<objectId>/<suffix>`.
    ///
    /// Fails with [`BridgeError::TopicFormat`] when fewer than 4 segments are
    /// present. Callers must treat this as "ignore", not as fatal.
    pub fn parse(topic: &str) -> Result<Self> {
        let parts: Vec<&str> = topic.split('/').collect();
        if parts.len() < 4 {
            return Err(BridgeError::topic_format(topic));
        }

        Ok(Self {
            topic: topic.to_string(),
            device_type: parts[1].to_string(),
            device_id: parts[2].to_string(),
            object_id: parts[3].to_string(),
        })
    }
}
