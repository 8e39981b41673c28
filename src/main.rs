use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use log::{Level, info, warn};
use polar_ble_bridge_lib::config::{AppConfig, CONFIG_FILE_NAME};
use polar_ble_bridge_lib::core::bluetooth::{DeviceInfo, LoopbackModule};
use polar_ble_bridge_lib::{AppState, PolarBleManager, logging};

fn sample_devices() -> Vec<DeviceInfo> {
    vec![
        DeviceInfo::new("7E37D222")
            .with_name("Polar H10 7E37D222")
            .with_address("A0:9E:1A:7E:37:D2")
            .with_rssi(-58)
            .with_connectable(true),
        DeviceInfo::new("B5A1C3F0")
            .with_name("Polar OH1 B5A1C3F0")
            .with_address("A0:9E:1A:B5:A1:C3")
            .with_rssi(-71)
            .with_connectable(true),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut logs = match logging::ForwardingLogger::init(Level::Info) {
        Ok(rx) => Some(rx),
        Err(_) => {
            // Only fall back to env_logger if the forwarding logger could not be installed
            polar_ble_bridge_lib::setup_logging();
            None
        }
    };

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let config = AppConfig::load_config(&config_path).await?;
    log::set_max_level(config.log_level());

    let native = Arc::new(LoopbackModule::new().with_advertised(sample_devices()));
    let manager = Arc::new(PolarBleManager::new(native));
    let session = AppState::new(manager.clone())?;

    let features = config.feature_mask(manager.constants())?;
    session.configure(features).await?;
    if let Err(e) = session.start_auto_connect(config.auto_connect.params()).await {
        warn!("Auto-connect did not connect a device: {}", e);
    }
    session.search_for_device().await?;

    let mut found = session.devices();
    found.sort_by(|a, b| a.device_id.cmp(&b.device_id));
    info!("Search finished, {} device(s) found", found.len());
    for device in found.iter().filter(|device| !device.is_connected()) {
        if let Err(e) = session.connect_to_device(&device.device_id).await {
            warn!("Could not connect to {}: {}", device.device_id, e);
        }
    }
    manager.flush().await?;

    let snapshot = session.snapshot();
    println!("{}", serde_json::to_string_pretty(&*snapshot)?);

    if let Some(rx) = logs.as_mut() {
        let mut forwarded = 0;
        while rx.try_recv().is_ok() {
            forwarded += 1;
        }
        info!("{} log message(s) forwarded during the session", forwarded);
    }
    Ok(())
}
