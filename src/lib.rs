//! Polar BLE bridge library
//! This is the synchronization layer between the native Polar BLE SDK and an
//! application: typed commands in, device events out, and a reducer that
//! keeps one consistent record per known sensor.

// Module declarations
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod state;
pub mod utils;

use std::io::Write;

pub use crate::core::bluetooth::{
    BridgeState, CommandHandle, ConnectionState, DeviceInfo, EventKind, Features, NativeEvent,
    NativeModule, PolarBleManager, PolarDevice, PolarEvent, reduce,
};
pub use error::{BridgeError, NativeError, Result};
pub use state::{AppState, DeviceStore};

/// Initializes env_logger at `info` unless `RUST_LOG` says otherwise.
///
/// Does nothing if a logger is already installed.
pub fn setup_logging() {
    let initialized = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}: {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    })
    .try_init()
    .is_ok();

    if initialized {
        log::info!("Logging initialized");
    }
}
