//! # linkingd
//!
//! Composition root: wires the btleplug adapter into the Linking stack.
//!
//! ## Responsibilities
//! - Parse configuration (`linking.toml`, env vars)
//! - Install the tracing subscriber
//! - Open the BLE radio and wait for it to power on
//! - Discover Linking devices and log their advertisements
//! - Optionally connect to the first one and log its events until Ctrl-C,
//!   then disconnect cleanly
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no protocol logic belongs here.

mod config;

use linking_adapter_btleplug::{BtleplugAdapter, BtleplugPeripheral};
use linking_app::{Advertisement, DeviceConnection, DeviceEvent, Discovery};
use tokio::sync::broadcast::error::RecvError;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.filter))
        .init();

    // Radio
    let adapter = BtleplugAdapter::new(&config.bluetooth).await?;
    let discovery = Discovery::new(adapter, config.connection.clone(), &config.discovery);
    discovery.init().await?;

    // Discovery
    let options = config.discovery.options();
    tracing::info!(duration = ?options.duration, "discovering Linking devices");
    let devices = discovery.discover(&options, None).await?;
    for device in &devices {
        match Advertisement::parse(device.advertisement()) {
            Some(advertisement) => {
                tracing::info!(advertisement = %serde_json::to_string(&advertisement)?, "found");
            }
            None => tracing::info!(address = %device.address(), name = device.local_name(), "found"),
        }
    }

    let Some(device) = devices.into_iter().next() else {
        tracing::warn!("no Linking device found");
        return Ok(());
    };
    if !config.session.connect {
        return Ok(());
    }

    follow(device).await?;
    Ok(())
}

/// Connect to `device` and log what it reports until Ctrl-C.
async fn follow(
    device: DeviceConnection<BtleplugPeripheral>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = device.subscribe();
    device.connect().await?;
    if let Some(info) = device.info() {
        tracing::info!(info = %serde_json::to_string(&info)?, "device information");
    }
    if let Some(capabilities) = device.capabilities() {
        tracing::info!(capabilities = %serde_json::to_string(&capabilities)?, "capabilities");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(DeviceEvent::Disconnected { was_clean: false }) => {
                    tracing::warn!(address = %device.address(), "link lost");
                    return Ok(());
                }
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    device.disconnect().await?;
    Ok(())
}

fn log_event(event: &DeviceEvent) {
    match event {
        DeviceEvent::Progress { description, .. } => tracing::debug!(%description, "progress"),
        DeviceEvent::Connected => tracing::info!("connected"),
        DeviceEvent::Disconnected { was_clean } => tracing::info!(was_clean, "disconnected"),
        DeviceEvent::Notification(message) => {
            tracing::info!(
                service = message.service_name,
                message = message.message_name,
                "notification"
            );
        }
        DeviceEvent::Button {
            button_id,
            button_name,
        } => tracing::info!(button_id, %button_name, "button pressed"),
        DeviceEvent::Sensor { capability, fields } => {
            tracing::info!(?capability, ?fields, "sensor reading");
        }
    }
}
