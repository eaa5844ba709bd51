//! MQTT bridge daemon for zigbee2mqtt gateways.
//!
//! Connects to the MQTT broker, subscribes to the gateway's bridge topics,
//! discovers the devices the gateway manages, and keeps an in-memory
//! registry of them until shut down with Ctrl+C.

mod mqtt;
mod registry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use z2m_core::{BridgeConfig, Z2mBridge, init_tracing};

use crate::mqtt::MqttTransport;
use crate::registry::{InMemoryRegistry, LoggingChannelSink};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(about = "MQTT bridge for zigbee2mqtt gateways")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "z2m.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Write received graphviz network maps to this file.
    #[arg(long)]
    networkmap_file: Option<PathBuf>,

    /// Set the gateway's permit-join flag on startup.
    #[arg(long)]
    permit_join: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BridgeConfig::load(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    init_tracing(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.mqtt.address,
        port = config.mqtt.port,
        base_topic = %config.topics.base,
        "Starting zigbee2mqtt bridge"
    );

    let (transport, events) = MqttTransport::start(&config.mqtt);
    let registry = Arc::new(InMemoryRegistry::default());
    let channels = Arc::new(LoggingChannelSink::new(args.networkmap_file));

    let (bridge, mut status_rx) =
        Z2mBridge::new(config, Arc::new(transport), registry, channels)?;
    let mut bridge = bridge.with_discovery();

    if let Err(e) = bridge.start().await {
        // The transport keeps reconnecting on its own; the bridge reflects
        // the state once the broker comes up.
        tracing::warn!(error = %e, "Initial broker connect failed");
    }

    if let Some(permit) = args.permit_join {
        bridge.set_permit_join(permit).await;
    }

    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            tracing::info!(status = ?status, "Bridge status changed");
        }
    });

    tokio::select! {
        _ = bridge.run(events) => {
            tracing::warn!("Transport event stream closed");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            tracing::info!("Received shutdown signal");
        }
    }

    bridge.stop().await;
    tracing::info!("Goodbye!");

    Ok(())
}
