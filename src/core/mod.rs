//! Core functionality for the Polar BLE bridge
//! This module contains the layer between the native Polar SDK and the application

pub mod bluetooth;

// Re-export commonly used types
pub use bluetooth::{BridgeState, PolarBleManager, PolarDevice, PolarEvent};
