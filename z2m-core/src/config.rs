//! Bridge configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BridgeError, Result};
use crate::topic::{DEFAULT_BASE_TOPIC, DEFAULT_DISCOVERY_TOPIC};

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address. Required, must be non-empty.
    pub address: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Broker username.
    #[serde(default)]
    pub username: Option<String>,

    /// Broker password. Ignored when no username is set.
    #[serde(default)]
    pub password: Option<String>,

    /// Maximum time to wait for the initial connect, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_port() -> u16 {
    1883
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl MqttConfig {
    /// Credentials to apply to the broker connection.
    ///
    /// A password without a username is ignored; an empty password with a
    /// username is allowed.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self.username.as_deref() {
            Some(username) if !username.trim().is_empty() => {
                Some((username, self.password.as_deref().unwrap_or("")))
            }
            _ => None,
        }
    }
}

/// Topic namespace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Base topic the zigbee2mqtt gateway publishes under.
    #[serde(default = "default_base_topic")]
    pub base: String,

    /// Discovery topic prefix for vendor device announcements.
    #[serde(default = "default_discovery_topic")]
    pub discovery: String,
}

fn default_base_topic() -> String {
    DEFAULT_BASE_TOPIC.to_string()
}

fn default_discovery_topic() -> String {
    DEFAULT_DISCOVERY_TOPIC.to_string()
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            base: default_base_topic(),
            discovery: default_discovery_topic(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Complete bridge configuration.
///
/// Immutable after bridge start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Broker connection settings.
    pub mqtt: MqttConfig,

    /// Topic namespace settings.
    #[serde(default)]
    pub topics: TopicsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Load configuration from a JSON5 file. Validates after parsing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string. Validates after parsing.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)
            .map_err(|e| BridgeError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.address.trim().is_empty() {
            return Err(BridgeError::config("MQTT broker address is empty"));
        }
        Ok(())
    }
}
