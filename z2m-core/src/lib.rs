//! Bridge engine for zigbee2mqtt gateways.
//!
//! This crate integrates a fleet of Zigbee devices, reachable only through
//! a zigbee2mqtt gateway on an MQTT bus, with a host application that
//! models each device as an addressable entity:
//!
//! - [`topic`] - Topic scheme: well-known topic set and action parsing
//! - [`envelope`] - Payload normalization into a canonical envelope
//! - [`lifecycle`] - Connection state machine and bridge status
//! - [`router`] - Action and log-event classification
//! - [`discovery`] - Device discovery scans
//! - [`bridge`] - Composition and event loop
//! - [`transport`] / [`registry`] - Collaborator interfaces
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`error`] - Error types

pub mod bridge;
pub mod config;
pub mod discovery;
pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod router;
pub mod topic;
pub mod transport;

// Re-export commonly used types at the crate root
pub use bridge::Z2mBridge;
pub use config::{BridgeConfig, LogFormat, LoggingConfig, MqttConfig, TopicsConfig};
pub use discovery::{COORDINATOR_TYPE, DiscoveryCoordinator, SCAN_TIMEOUT, ScanState};
pub use envelope::{MESSAGE_KEY, MessageEnvelope};
pub use error::{BridgeError, Result};
pub use lifecycle::{BridgeStatus, ConnectionLifecycle, ConnectionState};
pub use registry::{ChannelSink, DeviceRecord, DeviceRegistry, DiscoveryResult};
pub use router::{BridgeAction, LogEvent};
pub use topic::{DEFAULT_BASE_TOPIC, DEFAULT_DISCOVERY_TOPIC, DiscoveryTopic, TopicScheme};
pub use transport::{BusEvent, BusTransport};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| {
                    BridgeError::config(format!("Failed to initialize tracing: {}", e))
                })?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| {
                    BridgeError::config(format!("Failed to initialize tracing: {}", e))
                })?;
        }
    }

    Ok(())
}
