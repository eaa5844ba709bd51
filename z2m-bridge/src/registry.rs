//! In-memory device registry and channel sink.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use z2m_core::{ChannelSink, DeviceRecord, DeviceRegistry, DiscoveryResult};

/// Device registry backed by an in-memory map.
///
/// Discovered devices are not persisted across restarts; a scan after
/// startup repopulates the map.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    devices: Mutex<HashMap<String, DeviceRecord>>,
    bridge_properties: Mutex<BTreeMap<String, String>>,
}

impl InMemoryRegistry {
    /// Number of known devices.
    pub fn device_count(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    /// Snapshot of the bridge-level properties.
    pub fn bridge_properties(&self) -> BTreeMap<String, String> {
        self.bridge_properties.lock().unwrap().clone()
    }
}

impl DeviceRegistry for InMemoryRegistry {
    fn upsert_device(&self, device: DiscoveryResult) {
        tracing::info!(
            device_id = %device.device_id,
            friendly_name = %device.friendly_name,
            model = %device.model,
            "Device registered"
        );

        let mut devices = self.devices.lock().unwrap();
        let record = devices
            .entry(device.device_id.clone())
            .or_insert_with(|| DeviceRecord {
                device_id: device.device_id.clone(),
                online: true,
                description: "discovered".to_string(),
                properties: BTreeMap::new(),
            });
        record.properties.extend(device.properties);
    }

    fn update_device_status(&self, device_id: &str, online: bool, description: &str) {
        let mut devices = self.devices.lock().unwrap();
        match devices.get_mut(device_id) {
            Some(record) => {
                record.online = online;
                record.description = description.to_string();
                tracing::info!(device_id = %device_id, online, description, "Device status changed");
            }
            None => {
                tracing::debug!(device_id = %device_id, "Status update for unknown device ignored");
            }
        }
    }

    fn find_device(&self, device_id: &str) -> Option<DeviceRecord> {
        self.devices.lock().unwrap().get(device_id).cloned()
    }

    fn update_bridge_properties(&self, properties: BTreeMap<String, String>) {
        // Merge: unrelated keys survive, conflicting keys take the new value.
        self.bridge_properties.lock().unwrap().extend(properties);
    }
}

/// Channel sink that logs channel updates and optionally writes network
/// maps to a file for an external renderer.
#[derive(Debug, Default)]
pub struct LoggingChannelSink {
    networkmap_file: Option<PathBuf>,
}

impl LoggingChannelSink {
    pub fn new(networkmap_file: Option<PathBuf>) -> Self {
        Self { networkmap_file }
    }
}

impl ChannelSink for LoggingChannelSink {
    fn log_level_changed(&self, level: &str) {
        tracing::info!(level = %level, "Gateway log level changed");
    }

    fn permit_join_changed(&self, permit: bool) {
        tracing::info!(permit, "Gateway permit-join changed");
    }

    fn network_map(&self, dot: &str) {
        tracing::info!(bytes = dot.len(), "Network map received");
        if let Some(path) = &self.networkmap_file {
            if let Err(e) = std::fs::write(path, dot) {
                tracing::error!(path = %path.display(), error = %e, "Error while writing network map");
            }
        }
    }
}
