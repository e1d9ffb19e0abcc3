//! Shutter daemon.
//!
//! Runs one cover against an MQTT broker. Switch actions are published as
//! action requests, sensor reports and commands arrive on the cover's
//! topics, and the last settled position is optionally kept in a state file.
//!
//! ```toml
//! state_file = "/var/lib/shutterd/kitchen.json"
//!
//! [mqtt]
//! host = "broker.local"
//! topic_prefix = "home/kitchen/shutter"
//!
//! [cover]
//! name = "Kitchen"
//! open_switch = "switch.kitchen_up"
//! close_switch = "switch.kitchen_down"
//! open_time = 18.0
//! close_time = 16.5
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use rs_shutters::hal::FileStateStore;
use rs_shutters::services::{MqttBridge, MqttRuntimeConfig};
use rs_shutters::{spawn_cover, CoverConfig, CoverController};

/// Time-based shutter controller
#[derive(Parser, Debug)]
#[command(name = "shutterd")]
#[command(version)]
#[command(about = "Tracks and drives a switch-operated shutter over MQTT")]
struct Args {
    /// Path to the daemon configuration TOML.
    #[arg(short, long, default_value = "shutterd.toml")]
    config: PathBuf,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct DaemonConfig {
    #[serde(default)]
    mqtt: MqttRuntimeConfig,
    cover: CoverConfig,
    state_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("shutterd v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args).await {
        error!("FATAL: {e:#}");
        std::process::exit(1);
    }

    info!("shutterd shutdown complete");
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    let config: DaemonConfig = toml::from_str(&text).context("parsing configuration")?;
    info!(
        cover = %config.cover.name,
        broker = %config.mqtt.host,
        prefix = %config.mqtt.topic_prefix,
        "config OK"
    );

    let store = config.state_file.map(|path| Arc::new(FileStateStore::new(path)));
    let (bridge, eventloop) = MqttBridge::new(config.mqtt);

    let mut controller = CoverController::new(
        config.cover,
        bridge.clone(),
        (bridge.clone(), store.clone()),
    )?;
    if let Some(store) = &store {
        controller.restore(store.as_ref());
    }

    let (cover, cover_task) = spawn_cover(controller);
    let mut bridge_task = tokio::spawn(bridge.run(eventloop, cover.clone()));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for shutdown signal")?;
            info!("received shutdown signal");
        }
        result = &mut bridge_task => {
            result.context("MQTT bridge panicked")??;
        }
    }

    let _ = cover.shutdown().await;
    let controller = cover_task.await.context("cover task panicked")?;
    info!(position = controller.position(), "cover stopped");
    bridge_task.abort();
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}
