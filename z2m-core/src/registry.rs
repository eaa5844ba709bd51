//! Collaborator interfaces for the host application.
//!
//! The core never mutates host state directly. Discovered devices, status
//! changes and channel updates are emitted through these traits; the host
//! decides what to do with them.

use std::collections::BTreeMap;

/// A device discovered through a scan.
///
/// Ephemeral: produced per scan, handed to the registry, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryResult {
    /// Unique device identifier (the ieeeAddr).
    pub device_id: String,
    /// Device type as reported by the gateway (e.g. "Router", "EndDevice").
    pub device_type: String,
    /// Model string, sanitized (`.` replaced by `_`).
    pub model: String,
    /// Human-readable name.
    pub friendly_name: String,
    /// All remaining scalar descriptor fields.
    pub properties: BTreeMap<String, String>,
}

/// A device record held by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Unique device identifier.
    pub device_id: String,
    /// Whether the device is currently reachable.
    pub online: bool,
    /// Description of the last status change.
    pub description: String,
    /// Device properties.
    pub properties: BTreeMap<String, String>,
}

/// Device registry collaborator.
pub trait DeviceRegistry: Send + Sync {
    /// Create or update a device from a discovery result. A result for an
    /// already-known device supersedes the previous one.
    fn upsert_device(&self, device: DiscoveryResult);

    /// Update the online status of a known device. Unknown device ids are
    /// ignored.
    fn update_device_status(&self, device_id: &str, online: bool, description: &str);

    /// Look up a device by id.
    fn find_device(&self, device_id: &str) -> Option<DeviceRecord>;

    /// Merge key/value pairs into the bridge-level properties.
    fn update_bridge_properties(&self, properties: BTreeMap<String, String>);
}

/// Host-visible channel collaborator for the bridge's own channels.
pub trait ChannelSink: Send + Sync {
    /// The gateway's log level changed.
    fn log_level_changed(&self, level: &str);

    /// The gateway's permit-join flag changed.
    fn permit_join_changed(&self, permit: bool);

    /// A graphviz network map arrived; hand it to the rendering
    /// collaborator.
    fn network_map(&self, dot: &str);
}
