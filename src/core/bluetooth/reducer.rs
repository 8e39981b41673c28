//! Device state reducer
//! Folds native events into the registry of known devices. The fold is pure
//! and total: it never blocks, never fails, and touches at most the one
//! record the event names.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::bluetooth::events::PolarEvent;
use crate::core::bluetooth::types::{ConnectionState, DeviceInfo, PolarDevice};

/// Device identifier -> everything known about that device.
pub type DeviceRegistry = HashMap<String, PolarDevice>;

/// The registry plus the adapter power flag, which no device record owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeState {
    pub devices: DeviceRegistry,
    /// `None` until the first power event arrives
    pub ble_powered_on: Option<bool>,
}

impl BridgeState {
    pub fn device(&self, identifier: &str) -> Option<&PolarDevice> {
        self.devices.get(identifier)
    }

    /// Current records; order is unspecified.
    pub fn device_list(&self) -> Vec<PolarDevice> {
        self.devices.values().cloned().collect()
    }
}

/// Returns the state after `event`, leaving `state` untouched.
pub fn reduce(state: &BridgeState, event: &PolarEvent) -> BridgeState {
    let mut next = state.clone();
    apply(&mut next, event);
    next
}

/// Applies `event` to `state` in place.
pub fn apply(state: &mut BridgeState, event: &PolarEvent) {
    match event {
        PolarEvent::DeviceFound(info) => {
            merge_lifecycle(&mut state.devices, info, ConnectionState::Disconnected)
        }
        PolarEvent::DeviceConnecting(info) => {
            merge_lifecycle(&mut state.devices, info, ConnectionState::Connecting)
        }
        PolarEvent::DeviceConnected(info) => {
            merge_lifecycle(&mut state.devices, info, ConnectionState::Connected)
        }
        PolarEvent::DeviceDisconnected(info) => {
            // Unlike the other lifecycle events the disconnect snapshot replaces
            // the record outright, dropping battery, DIS and telemetry. Kept for
            // compatibility with the existing consumers even though it looks
            // unintentional.
            let device = record(&mut state.devices, &info.device_id);
            device.replace_info(info);
            device.state = Some(ConnectionState::Disconnected);
        }
        PolarEvent::BatteryLevelReceived {
            identifier,
            battery_level,
        } => {
            record(&mut state.devices, identifier).battery_level = *battery_level;
        }
        PolarEvent::DisInformationReceived { identifier, dis } => {
            record(&mut state.devices, identifier).dis = Some(dis.clone());
        }
        PolarEvent::HrFeatureReady(identifier) => {
            record(&mut state.devices, identifier).hr_feature_ready = true;
        }
        PolarEvent::FtpFeatureReady(identifier) => {
            record(&mut state.devices, identifier).ftp_feature_ready = true;
        }
        PolarEvent::StreamingFeaturesReady {
            identifier,
            features,
        } => {
            record(&mut state.devices, identifier).streaming_features = features.clone();
        }
        PolarEvent::HrValueReceived { identifier, data } => {
            record(&mut state.devices, identifier).heart_rate = Some(data.clone());
        }
        PolarEvent::BlePowerOn => state.ble_powered_on = Some(true),
        PolarEvent::BlePowerOff => state.ble_powered_on = Some(false),
    }
}

fn record<'a>(devices: &'a mut DeviceRegistry, identifier: &str) -> &'a mut PolarDevice {
    devices
        .entry(identifier.to_string())
        .or_insert_with(|| PolarDevice::new(identifier))
}

fn merge_lifecycle(devices: &mut DeviceRegistry, info: &DeviceInfo, state: ConnectionState) {
    let device = record(devices, &info.device_id);
    device.merge_info(info);
    device.state = Some(state);
}
