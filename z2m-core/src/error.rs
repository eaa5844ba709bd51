//! Error types for the bridge core.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the bridge.
///
/// Only [`BridgeError::Config`] and [`BridgeError::Connect`] surface as
/// bridge-level failures. All per-message errors are contained at the call
/// site: a bad message is logged and dropped without affecting later
/// messages or the connection state.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Invalid configuration. Fatal at construction, the bridge never starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broker unreachable at startup.
    #[error("Cannot connect to MQTT broker: {0}")]
    Connect(String),

    /// Payload irrecoverably unparseable, even after the escape fallback.
    #[error("Unparseable payload on topic '{topic}': {reason}")]
    Envelope { topic: String, reason: String },

    /// Topic string does not match the expected shape.
    #[error("Topic does not match expected shape: {0}")]
    TopicFormat(String),

    /// Bus transport failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connect error.
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// Create an envelope error for a payload received on `topic`.
    pub fn envelope(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Envelope {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create a topic format error.
    pub fn topic_format(msg: impl Into<String>) -> Self {
        Self::TopicFormat(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}
