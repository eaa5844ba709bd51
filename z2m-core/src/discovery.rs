//! Device discovery over the gateway's device-list protocol.
//!
//! The bus offers no request/response correlation, so a scan is: subscribe
//! to the device-list topic, publish a `get` request, and take the first
//! list that arrives within the scan window. The coordinator here is the
//! pure state machine; the bridge performs the I/O around it.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::envelope::MessageEnvelope;
use crate::registry::DiscoveryResult;

/// Device type the gateway reports for itself. Never emitted as a device.
pub const COORDINATOR_TYPE: &str = "Coordinator";

/// Maximum time to wait for a device-list response.
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(20);

/// Scan state. At most one scan is active per bridge instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
}

/// Coordinates discovery scans.
///
/// Driven entirely from the bridge event loop; no I/O of its own.
#[derive(Debug, Default)]
pub struct DiscoveryCoordinator {
    state: ScanState,
    deadline: Option<Instant>,
    seen: HashSet<String>,
}

impl DiscoveryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scan state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Deadline of the active scan, if one is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Arm a scan. Returns false when one is already running; the caller
    /// must also ensure the connection is up before starting the protocol.
    pub fn begin_scan(&mut self) -> bool {
        if self.state == ScanState::Scanning {
            return false;
        }

        self.seen.clear();
        self.state = ScanState::Scanning;
        self.deadline = Some(Instant::now() + SCAN_TIMEOUT);
        true
    }

    /// The scan deadline passed without a response. Quietly returns to idle;
    /// "nothing found this round" is not an error.
    pub fn expire(&mut self) {
        if self.state == ScanState::Scanning {
            tracing::debug!("Discovery scan timed out without a response");
        }
        self.reset();
    }

    /// Abort an in-flight scan, e.g. when the bridge goes offline mid-scan.
    pub fn cancel(&mut self) {
        if self.state == ScanState::Scanning {
            tracing::debug!("Discovery scan cancelled");
        }
        self.reset();
    }

    /// Consume the device-list response and finish the scan.
    ///
    /// Entries whose `type` is the coordinator sentinel are skipped, as are
    /// duplicate device ids within the response. Responses outside an
    /// active scan yield nothing.
    pub fn handle_response(&mut self, envelope: &MessageEnvelope) -> Vec<DiscoveryResult> {
        if self.state != ScanState::Scanning {
            return Vec::new();
        }

        let mut results = Vec::new();
        for descriptor in envelope.message_list().unwrap_or_default() {
            if let Some(device) = parse_descriptor(descriptor) {
                if self.seen.insert(device.device_id.clone()) {
                    results.push(device);
                }
            }
        }

        self.reset();
        results
    }

    fn reset(&mut self) {
        self.state = ScanState::Idle;
        self.deadline = None;
    }
}

/// Convert one device descriptor into a discovery result.
///
/// Returns `None` for the coordinator entry and for descriptors missing an
/// id. The model string is sanitized by replacing every `.` with `_`; all
/// remaining scalar fields are folded into the properties map.
fn parse_descriptor(descriptor: &Value) -> Option<DiscoveryResult> {
    let descriptor = descriptor.as_object()?;

    let device_type = descriptor.get("type").and_then(Value::as_str)?;
    if device_type == COORDINATOR_TYPE {
        return None;
    }

    let device_id = descriptor.get("ieeeAddr").and_then(Value::as_str)?;
    let model = descriptor
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .replace('.', "_");
    let friendly_name = descriptor
        .get("friendly_name")
        .and_then(Value::as_str)
        .unwrap_or(device_id);

    let mut properties = BTreeMap::new();
    for (key, value) in descriptor {
        if let Some(scalar) = scalar_to_string(value) {
            tracing::trace!(key = %key, value = %scalar, "Property discovered");
            properties.insert(key.clone(), scalar);
        }
    }

    Some(DiscoveryResult {
        device_id: device_id.to_string(),
        device_type: device_type.to_string(),
        model,
        friendly_name: friendly_name.to_string(),
        properties,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
