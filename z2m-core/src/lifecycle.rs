//! Connection lifecycle and host-visible bridge status.

use tokio::sync::watch;

/// Transport-level connection state.
///
/// Exactly one current value per bridge instance; transitions only through
/// [`ConnectionLifecycle`], driven by transport callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempt observed yet.
    #[default]
    Unknown,
    /// Transport is establishing a connection.
    Connecting,
    /// Transport is connected to the broker.
    Connected,
    /// Transport lost the connection. The transport owns reconnection; the
    /// lifecycle only reflects state.
    Disconnected,
}

/// Host-visible bridge status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeStatus {
    /// Status not determined yet, with a short detail text.
    Unknown { detail: String },
    /// The gateway reported itself online.
    Online,
    /// The bridge is offline, with a description of why.
    Offline { description: String },
}

impl Default for BridgeStatus {
    fn default() -> Self {
        Self::Unknown {
            detail: String::new(),
        }
    }
}

impl BridgeStatus {
    /// Parse a connection-state label from the gateway's state topic.
    ///
    /// Unknown labels yield `None` and are inert.
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "online" | "connected" => Some(Self::Online),
            "offline" | "disconnected" => Some(Self::Offline {
                description: "communication error".to_string(),
            }),
            "connecting" | "connection" => Some(Self::Unknown {
                detail: "connecting to broker".to_string(),
            }),
            _ => None,
        }
    }

    /// Whether this is the online state.
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

/// State machine tracking bus connectivity.
///
/// Owned by the bridge event loop, so at most one transition is ever in
/// flight. Status changes are published on a watch channel for the host.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
    status_tx: watch::Sender<BridgeStatus>,
}

impl ConnectionLifecycle {
    /// Create a lifecycle in the `Unknown` state, plus the host's view of
    /// the bridge status.
    pub fn new() -> (Self, watch::Receiver<BridgeStatus>) {
        let (status_tx, status_rx) = watch::channel(BridgeStatus::default());
        (
            Self {
                state: ConnectionState::Unknown,
                status_tx,
            },
            status_rx,
        )
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current bridge status.
    pub fn status(&self) -> BridgeStatus {
        self.status_tx.borrow().clone()
    }

    /// Apply a transport-driven transition.
    ///
    /// Repeated notifications of the current state are ignored, so entering
    /// `Connected` has its side effects (resubscription, discovery) exactly
    /// once per connection. Returns whether the state changed.
    pub fn transition(&mut self, next: ConnectionState) -> bool {
        if next == self.state {
            return false;
        }

        tracing::debug!(from = ?self.state, to = ?next, "Broker connection changed");
        self.state = next;

        let status = match next {
            ConnectionState::Disconnected => BridgeStatus::Offline {
                description: "disconnected from broker".to_string(),
            },
            ConnectionState::Connecting => BridgeStatus::Unknown {
                detail: "connecting to broker".to_string(),
            },
            ConnectionState::Connected => BridgeStatus::Unknown {
                detail: "connected to broker".to_string(),
            },
            ConnectionState::Unknown => BridgeStatus::default(),
        };
        self.status_tx.send_replace(status);

        true
    }

    /// Update the host-visible status from the gateway's state topic.
    ///
    /// Returns true when the bridge just entered the online state; the
    /// caller triggers a discovery scan then.
    pub fn update_status(&mut self, status: BridgeStatus) -> bool {
        let was_online = self.status_tx.borrow().is_online();
        let is_online = status.is_online();
        self.status_tx.send_replace(status);
        is_online && !was_online
    }

    /// Force an offline status without a connection-state transition.
    pub fn report_offline(&mut self, description: impl Into<String>) {
        self.status_tx.send_replace(BridgeStatus::Offline {
            description: description.into(),
        });
    }
}
