//! Defines shared data structures for the Bluetooth module.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    BLUETOOTH_BASE_UUID, UUID_FIRMWARE_REVISION, UUID_HARDWARE_REVISION, UUID_MANUFACTURER_NAME,
    UUID_MODEL_NUMBER, UUID_SERIAL_NUMBER, UUID_SOFTWARE_REVISION, UUID_SYSTEM_ID,
};

/// Connection lifecycle of a sensor. Only lifecycle events ever set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Discovery metadata carried by found/connecting/connected/disconnected events.
///
/// Every field but the identifier is optional: the native payload is trusted
/// and not validated, so whatever it omits is simply absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Opaque identifier, stable for the lifetime of the physical sensor
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// iOS reports this as `connectable`
    #[serde(default, alias = "connectable", skip_serializing_if = "Option::is_none")]
    pub is_connectable: Option<bool>,
}

impl DeviceInfo {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_rssi(mut self, rssi: i32) -> Self {
        self.rssi = Some(rssi);
        self
    }

    pub fn with_connectable(mut self, is_connectable: bool) -> Self {
        self.is_connectable = Some(is_connectable);
        self
    }
}

/// One heart-rate notification. Replaced wholesale on every new sample.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRate {
    /// Beats per minute
    #[serde(default)]
    pub hr: u16,
    /// RR intervals in 1/1024 s
    #[serde(default)]
    pub rrs: Vec<u32>,
    /// RR intervals in milliseconds
    #[serde(default)]
    pub rrs_ms: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rr_available: Option<bool>,
    #[serde(default, alias = "contactStatus", skip_serializing_if = "Option::is_none")]
    pub contact: Option<bool>,
    #[serde(
        default,
        alias = "contactStatusSupported",
        skip_serializing_if = "Option::is_none"
    )]
    pub contact_supported: Option<bool>,
}

/// A Device Information Service entry: characteristic UUID and its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisInformation {
    pub uuid: String,
    pub value: String,
}

impl DisInformation {
    pub fn new(uuid: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            value: value.into(),
        }
    }

    /// Parses the characteristic UUID. iOS reports standard characteristics in
    /// their 16-bit short form (`2A29`), Android always in full.
    pub fn characteristic_uuid(&self) -> Option<Uuid> {
        let uuid = self.uuid.trim();
        if uuid.len() == 4 {
            let short = u16::from_str_radix(uuid, 16).ok()?;
            return Some(Uuid::from_u128(BLUETOOTH_BASE_UUID | (u128::from(short) << 96)));
        }
        Uuid::parse_str(uuid).ok()
    }

    /// Readable name of a well-known Device Information characteristic.
    pub fn characteristic_name(&self) -> Option<&'static str> {
        let uuid = self.characteristic_uuid()?;
        let name = match uuid {
            u if u == UUID_MANUFACTURER_NAME => "Manufacturer Name",
            u if u == UUID_MODEL_NUMBER => "Model Number",
            u if u == UUID_SERIAL_NUMBER => "Serial Number",
            u if u == UUID_HARDWARE_REVISION => "Hardware Revision",
            u if u == UUID_FIRMWARE_REVISION => "Firmware Revision",
            u if u == UUID_SOFTWARE_REVISION => "Software Revision",
            u if u == UUID_SYSTEM_ID => "System ID",
            _ => return None,
        };
        Some(name)
    }
}

/// Everything known about one physical sensor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolarDevice {
    /// Registry key; never changes once the record exists
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_connectable: Option<bool>,
    /// Absent until the first lifecycle event for this device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ConnectionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dis: Option<DisInformation>,
    #[serde(default)]
    pub hr_feature_ready: bool,
    #[serde(default)]
    pub ftp_feature_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_features: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<HeartRate>,
}

impl PolarDevice {
    /// An otherwise-empty record for a device seen for the first time.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == Some(ConnectionState::Connected)
    }

    /// Overwrites the discovery fields the payload carries, keeps the rest.
    pub(crate) fn merge_info(&mut self, info: &DeviceInfo) {
        if let Some(address) = &info.address {
            self.address = Some(address.clone());
        }
        if let Some(name) = &info.name {
            self.name = Some(name.clone());
        }
        if let Some(rssi) = info.rssi {
            self.rssi = Some(rssi);
        }
        if let Some(is_connectable) = info.is_connectable {
            self.is_connectable = Some(is_connectable);
        }
    }

    /// Rebuilds the record from the payload alone. Only the feature-ready
    /// flags survive, since those never revert.
    pub(crate) fn replace_info(&mut self, info: &DeviceInfo) {
        *self = PolarDevice {
            device_id: info.device_id.clone(),
            address: info.address.clone(),
            name: info.name.clone(),
            rssi: info.rssi,
            is_connectable: info.is_connectable,
            hr_feature_ready: self.hr_feature_ready,
            ftp_feature_ready: self.ftp_feature_ready,
            ..PolarDevice::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn device_info_accepts_both_platform_spellings() {
        let android: DeviceInfo = serde_json::from_value(json!({
            "deviceId": "A1B2C3D4",
            "address": "A0:9E:1A:00:00:01",
            "rssi": -58,
            "name": "Polar H10 A1B2C3D4",
            "isConnectable": true,
        }))
        .unwrap();
        let ios: DeviceInfo = serde_json::from_value(json!({
            "deviceId": "A1B2C3D4",
            "address": "A0:9E:1A:00:00:01",
            "rssi": -58,
            "name": "Polar H10 A1B2C3D4",
            "connectable": true,
        }))
        .unwrap();
        assert_eq!(android, ios);
        assert_eq!(android.is_connectable, Some(true));
    }

    #[test]
    fn device_info_missing_fields_are_absent() {
        let info: DeviceInfo = serde_json::from_value(json!({ "deviceId": "X" })).unwrap();
        assert_eq!(info, DeviceInfo::new("X"));
    }

    #[test]
    fn heart_rate_accepts_android_contact_fields() {
        let hr: HeartRate = serde_json::from_value(json!({
            "hr": 72,
            "rrs": [850, 870],
            "rrsMs": [830, 849],
            "contactStatus": true,
            "contactStatusSupported": true,
            "rrAvailable": true,
        }))
        .unwrap();
        assert_eq!(hr.hr, 72);
        assert_eq!(hr.rrs_ms, vec![830, 849]);
        assert_eq!(hr.contact, Some(true));
        assert_eq!(hr.contact_supported, Some(true));
    }

    #[test]
    fn dis_short_and_long_uuid_resolve_to_same_name() {
        let short = DisInformation::new("2A29", "Polar Electro Oy");
        let long = DisInformation::new("00002a29-0000-1000-8000-00805f9b34fb", "Polar Electro Oy");
        assert_eq!(short.characteristic_uuid(), long.characteristic_uuid());
        assert_eq!(short.characteristic_name(), Some("Manufacturer Name"));
        assert_eq!(
            DisInformation::new("2A26", "3.0.35").characteristic_name(),
            Some("Firmware Revision")
        );
        assert_eq!(DisInformation::new("not-a-uuid", "x").characteristic_name(), None);
    }

    #[test]
    fn record_serializes_state_in_lowercase() {
        let mut device = PolarDevice::new("A");
        device.state = Some(ConnectionState::Connecting);
        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["state"], "connecting");
        assert_eq!(value["deviceId"], "A");
        assert!(value.get("batteryLevel").is_none());
    }
}
