//! Action classification for incoming bridge topics.
//!
//! The gateway's topic suffixes are dispatched through explicit enums;
//! anything the bridge does not understand maps to an inert
//! [`BridgeAction::Unhandled`] variant, since the bus may carry topics this
//! bridge has no business with.

/// Routing action parsed from a bridge topic suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeAction {
    /// Graphviz network map text to hand off to the rendering collaborator.
    NetworkMapGraphviz,
    /// Gateway connection-state label.
    State,
    /// Gateway configuration object.
    Config,
    /// Gateway log event.
    Log,
    /// Device list response for a discovery scan.
    ConfigDevices,
    /// Anything else. Inert by design.
    Unhandled(String),
}

impl BridgeAction {
    /// Classify an action string produced by
    /// [`TopicScheme::action_from_topic`](crate::topic::TopicScheme::action_from_topic).
    pub fn parse(action: &str) -> Self {
        match action {
            "networkmap/graphviz" => Self::NetworkMapGraphviz,
            "state" => Self::State,
            "config" => Self::Config,
            "log" => Self::Log,
            "config/devices" => Self::ConfigDevices,
            other => Self::Unhandled(other.to_string()),
        }
    }
}

/// Gateway log event types, sub-dispatched from the `log` action by the
/// payload's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// A device (re)paired with the gateway.
    DeviceConnected,
    /// The gateway failed to publish to a device.
    PublishError,
    /// A device was removed from the gateway.
    DeviceRemoved,
    /// A device was banned from the gateway.
    DeviceBanned,
    /// Informational only; no state change.
    Other,
}

impl LogEvent {
    /// Classify a log `type` field.
    pub fn parse(log_type: &str) -> Self {
        match log_type {
            "device_connected" => Self::DeviceConnected,
            "zigbee_publish_error" => Self::PublishError,
            "device_removed" => Self::DeviceRemoved,
            "device_banned" => Self::DeviceBanned,
            _ => Self::Other,
        }
    }
}
