//! End-to-end bridge tests against mock collaborators.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use z2m_core::{
    BridgeConfig, BridgeError, BridgeStatus, BusEvent, BusTransport, ChannelSink, ConnectionState,
    DeviceRecord, DeviceRegistry, DiscoveryResult, Result, Z2mBridge,
};

#[derive(Default)]
struct MockTransport {
    connect_result: Option<bool>,
    subscriptions: Mutex<Vec<String>>,
    unsubscriptions: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
    disconnected: Mutex<bool>,
}

impl MockTransport {
    fn published_to(&self, topic: &str) -> usize {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .count()
    }
}

#[async_trait]
impl BusTransport for MockTransport {
    async fn connect(&self) -> Result<bool> {
        match self.connect_result {
            Some(result) => Ok(result),
            None => Err(BridgeError::transport("broker unreachable")),
        }
    }

    async fn disconnect(&self) -> Result<bool> {
        *self.disconnected.lock().unwrap() = true;
        Ok(true)
    }

    async fn subscribe(&self, topic: &str) -> Result<bool> {
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(true)
    }

    async fn unsubscribe(&self, topic: &str) -> Result<bool> {
        self.unsubscriptions.lock().unwrap().push(topic.to_string());
        Ok(true)
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<bool> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
        Ok(true)
    }
}

#[derive(Default)]
struct MockRegistry {
    upserts: Mutex<Vec<DiscoveryResult>>,
    status_updates: Mutex<Vec<(String, bool, String)>>,
    bridge_properties: Mutex<BTreeMap<String, String>>,
}

impl DeviceRegistry for MockRegistry {
    fn upsert_device(&self, device: DiscoveryResult) {
        self.upserts.lock().unwrap().push(device);
    }

    fn update_device_status(&self, device_id: &str, online: bool, description: &str) {
        self.status_updates.lock().unwrap().push((
            device_id.to_string(),
            online,
            description.to_string(),
        ));
    }

    fn find_device(&self, device_id: &str) -> Option<DeviceRecord> {
        self.upserts
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.device_id == device_id)
            .map(|d| DeviceRecord {
                device_id: d.device_id.clone(),
                online: true,
                description: String::new(),
                properties: d.properties.clone(),
            })
    }

    fn update_bridge_properties(&self, properties: BTreeMap<String, String>) {
        self.bridge_properties.lock().unwrap().extend(properties);
    }
}

#[derive(Default)]
struct MockChannels {
    log_levels: Mutex<Vec<String>>,
    permit_joins: Mutex<Vec<bool>>,
    network_maps: Mutex<Vec<String>>,
}

impl ChannelSink for MockChannels {
    fn log_level_changed(&self, level: &str) {
        self.log_levels.lock().unwrap().push(level.to_string());
    }

    fn permit_join_changed(&self, permit: bool) {
        self.permit_joins.lock().unwrap().push(permit);
    }

    fn network_map(&self, dot: &str) {
        self.network_maps.lock().unwrap().push(dot.to_string());
    }
}

struct Fixture {
    bridge: Z2mBridge,
    status_rx: tokio::sync::watch::Receiver<BridgeStatus>,
    transport: Arc<MockTransport>,
    registry: Arc<MockRegistry>,
    channels: Arc<MockChannels>,
}

fn fixture_with(transport: MockTransport) -> Fixture {
    let config = BridgeConfig::parse(r#"{ mqtt: { address: "broker.local" } }"#).unwrap();
    let transport = Arc::new(transport);
    let registry = Arc::new(MockRegistry::default());
    let channels = Arc::new(MockChannels::default());

    let (bridge, status_rx) = Z2mBridge::new(
        config,
        transport.clone(),
        registry.clone(),
        channels.clone(),
    )
    .unwrap();

    Fixture {
        bridge: bridge.with_discovery(),
        status_rx,
        transport,
        registry,
        channels,
    }
}

fn fixture() -> Fixture {
    fixture_with(MockTransport {
        connect_result: Some(true),
        ..MockTransport::default()
    })
}

async fn message(fixture: &mut Fixture, topic: String, payload: &[u8]) {
    fixture
        .bridge
        .handle_event(BusEvent::Message {
            topic,
            payload: payload.to_vec(),
        })
        .await;
}

async fn connect(fixture: &mut Fixture) {
    fixture
        .bridge
        .handle_event(BusEvent::ConnectionChanged(ConnectionState::Connected))
        .await;
}

/// Finish the scan that connecting armed, so later events can start a new one.
async fn drain_initial_scan(fixture: &mut Fixture) {
    let topic = fixture.bridge.scheme().bridge_config_devices();
    message(fixture, topic, b"[]").await;
}

#[tokio::test]
async fn test_connected_resubscribes_and_scans_once() {
    let mut fx = fixture();
    connect(&mut fx).await;

    let scheme = fx.bridge.scheme().clone();
    let subscriptions = fx.transport.subscriptions.lock().unwrap().clone();
    for topic in scheme.subscription_topics() {
        assert!(subscriptions.contains(&topic), "missing {}", topic);
    }
    assert!(subscriptions.contains(&scheme.bridge_config_devices()));

    // Exactly one scan request, and a repeated Connected notification does
    // not start another.
    let get_topic = scheme.bridge_config_devices_get();
    assert_eq!(fx.transport.published_to(&get_topic), 1);

    connect(&mut fx).await;
    assert_eq!(fx.transport.published_to(&get_topic), 1);
}

#[tokio::test]
async fn test_state_disconnected_reports_offline() {
    let mut fx = fixture();
    connect(&mut fx).await;

    let topic = fx.bridge.scheme().bridge_state();
    message(&mut fx, topic, b"DISCONNECTED").await;

    assert_eq!(
        *fx.status_rx.borrow(),
        BridgeStatus::Offline {
            description: "communication error".to_string()
        }
    );
}

#[tokio::test]
async fn test_state_online_triggers_scan() {
    let mut fx = fixture();
    connect(&mut fx).await;
    drain_initial_scan(&mut fx).await;

    let topic = fx.bridge.scheme().bridge_state();
    message(&mut fx, topic, b"online").await;

    assert_eq!(*fx.status_rx.borrow(), BridgeStatus::Online);
    let get_topic = fx.bridge.scheme().bridge_config_devices_get();
    assert_eq!(fx.transport.published_to(&get_topic), 2);
}

#[tokio::test]
async fn test_config_log_level_updates_channel_only() {
    let mut fx = fixture();

    let topic = fx.bridge.scheme().bridge_config();
    message(&mut fx, topic, br#"{"log_level":"debug"}"#).await;

    assert_eq!(*fx.channels.log_levels.lock().unwrap(), vec!["debug"]);
    assert!(fx.registry.bridge_properties.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_config_unknown_keys_become_bridge_properties() {
    let mut fx = fixture();

    let topic = fx.bridge.scheme().bridge_config();
    message(
        &mut fx,
        topic,
        br#"{"permit_join":true,"pan_id":6754,"version":"1.13.0"}"#,
    )
    .await;

    assert_eq!(*fx.channels.permit_joins.lock().unwrap(), vec![true]);
    let properties = fx.registry.bridge_properties.lock().unwrap();
    assert_eq!(properties.get("pan_id"), Some(&"6754".to_string()));
    assert_eq!(properties.get("version"), Some(&"1.13.0".to_string()));
    assert!(!properties.contains_key("permit_join"));
}

#[tokio::test]
async fn test_discovery_response_upserts_devices() {
    let mut fx = fixture();
    connect(&mut fx).await;

    let topic = fx.bridge.scheme().bridge_config_devices();
    message(
        &mut fx,
        topic,
        br#"[
            {"ieeeAddr":"0x0","type":"Coordinator"},
            {"ieeeAddr":"0x1","type":"Router","model":"TS0001"}
        ]"#,
    )
    .await;

    let upserts = fx.registry.upserts.lock().unwrap();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].device_id, "0x1");
    assert_eq!(upserts[0].model, "TS0001");
}

#[tokio::test]
async fn test_log_device_removed_sets_device_offline() {
    let mut fx = fixture();

    let topic = fx.bridge.scheme().bridge_log();
    message(
        &mut fx,
        topic,
        br#"{"type":"device_removed","message":"0x1\r\n"}"#,
    )
    .await;

    let updates = fx.registry.status_updates.lock().unwrap();
    assert_eq!(
        *updates,
        vec![(
            "0x1".to_string(),
            false,
            "device removed from controller".to_string()
        )]
    );
}

#[tokio::test]
async fn test_log_device_connected_sets_online_and_scans() {
    let mut fx = fixture();
    connect(&mut fx).await;
    drain_initial_scan(&mut fx).await;

    let topic = fx.bridge.scheme().bridge_log();
    message(
        &mut fx,
        topic,
        br#"{"type":"device_connected","message":"0x2"}"#,
    )
    .await;

    let updates = fx.registry.status_updates.lock().unwrap();
    assert_eq!(updates[0].0, "0x2");
    assert!(updates[0].1);
    let get_topic = fx.bridge.scheme().bridge_config_devices_get();
    assert_eq!(fx.transport.published_to(&get_topic), 2);
}

#[tokio::test]
async fn test_log_publish_error_changes_nothing() {
    let mut fx = fixture();

    let topic = fx.bridge.scheme().bridge_log();
    message(
        &mut fx,
        topic,
        br#"{"type":"zigbee_publish_error","message":"failed"}"#,
    )
    .await;

    assert!(fx.registry.status_updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_networkmap_forwarded() {
    let mut fx = fixture();

    let topic = fx.bridge.scheme().bridge_networkmap_graphviz();
    message(&mut fx, topic, b"digraph G {}").await;

    assert_eq!(*fx.channels.network_maps.lock().unwrap(), vec!["digraph G {}"]);
}

#[tokio::test]
async fn test_unknown_topics_are_inert() {
    let mut fx = fixture();

    message(&mut fx, "zigbee2mqtt/bridge/whatever".to_string(), b"{}").await;
    message(&mut fx, "other/topic".to_string(), b"payload").await;

    assert!(fx.registry.upserts.lock().unwrap().is_empty());
    assert!(fx.registry.status_updates.lock().unwrap().is_empty());
    assert!(fx.transport.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_message_does_not_affect_later_ones() {
    let mut fx = fixture();
    connect(&mut fx).await;
    drain_initial_scan(&mut fx).await;

    // Bare newline survives the escape fallback as still-invalid JSON.
    let state_topic = fx.bridge.scheme().bridge_state();
    message(&mut fx, state_topic.clone(), b"broken\npayload").await;
    message(&mut fx, state_topic, b"online").await;

    assert_eq!(*fx.status_rx.borrow(), BridgeStatus::Online);
}

#[tokio::test]
async fn test_start_reports_offline_when_connect_fails() {
    let mut fx = fixture_with(MockTransport {
        connect_result: Some(false),
        ..MockTransport::default()
    });

    let result = fx.bridge.start().await;

    assert!(matches!(result, Err(BridgeError::Connect(_))));
    assert!(matches!(
        *fx.status_rx.borrow(),
        BridgeStatus::Offline { .. }
    ));
}

#[tokio::test]
async fn test_start_reports_offline_on_transport_error() {
    let mut fx = fixture_with(MockTransport::default());

    let result = fx.bridge.start().await;

    assert!(matches!(result, Err(BridgeError::Connect(_))));
    assert!(matches!(
        *fx.status_rx.borrow(),
        BridgeStatus::Offline { .. }
    ));
}

#[tokio::test]
async fn test_outbound_commands_use_bridge_topics() {
    let fx = fixture();
    let scheme = fx.bridge.scheme().clone();

    fx.bridge.set_permit_join(true).await;
    fx.bridge.set_permit_join(false).await;
    fx.bridge.set_log_level("debug").await;
    fx.bridge.request_network_map().await;

    let published = fx.transport.published.lock().unwrap();
    assert_eq!(
        *published,
        vec![
            (scheme.bridge_permit_join(), b"true".to_vec()),
            (scheme.bridge_permit_join(), b"false".to_vec()),
            (scheme.bridge_log_level(), b"debug".to_vec()),
            (scheme.bridge_networkmap(), b"graphviz".to_vec()),
        ]
    );
}

#[tokio::test]
async fn test_device_commands_use_device_topics() {
    let fx = fixture();
    let scheme = fx.bridge.scheme().clone();

    fx.bridge
        .publish_device_command("0x1", br#"{"state":"ON"}"#)
        .await;
    fx.bridge.request_device_refresh("0x1").await;

    let published = fx.transport.published.lock().unwrap();
    assert_eq!(
        *published,
        vec![
            (scheme.device("0x1"), br#"{"state":"ON"}"#.to_vec()),
            (scheme.device_get("0x1"), Vec::new()),
        ]
    );
}

#[tokio::test]
async fn test_log_numeric_message_rendered_as_text() {
    let mut fx = fixture();

    let topic = fx.bridge.scheme().bridge_log();
    message(
        &mut fx,
        topic,
        br#"{"type":"device_removed","message":4779}"#,
    )
    .await;

    let updates = fx.registry.status_updates.lock().unwrap();
    assert_eq!(updates[0].0, "4779");
    assert!(!updates[0].1);
}

#[tokio::test]
async fn test_config_plain_text_becomes_message_property() {
    let mut fx = fixture();

    let topic = fx.bridge.scheme().bridge_config();
    message(&mut fx, topic, b"restarting").await;

    let properties = fx.registry.bridge_properties.lock().unwrap();
    assert_eq!(properties.get("message"), Some(&"restarting".to_string()));
}

#[tokio::test]
async fn test_stop_unsubscribes_and_disconnects() {
    let mut fx = fixture();
    connect(&mut fx).await;

    fx.bridge.stop().await;

    let unsubscriptions = fx.transport.unsubscriptions.lock().unwrap();
    for topic in fx.bridge.scheme().subscription_topics() {
        assert!(unsubscriptions.contains(&topic));
    }
    assert!(*fx.transport.disconnected.lock().unwrap());
}
