//! Events produced by the native SDK
//! The SDK's multi-method observer is flattened into one tagged enum so the
//! transport and the reducer only ever deal with plain values.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::bluetooth::codec::event_name_to_wire_key;
use crate::core::bluetooth::types::{DeviceInfo, DisInformation, HeartRate};

/// The twelve event kinds the native layer can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DeviceFound,
    DeviceConnecting,
    DeviceConnected,
    DeviceDisconnected,
    BatteryLevelReceived,
    DisInformationReceived,
    BlePowerOn,
    BlePowerOff,
    HrFeatureReady,
    FtpFeatureReady,
    StreamingFeaturesReady,
    HrValueReceived,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::DeviceFound,
        EventKind::DeviceConnecting,
        EventKind::DeviceConnected,
        EventKind::DeviceDisconnected,
        EventKind::BatteryLevelReceived,
        EventKind::DisInformationReceived,
        EventKind::BlePowerOn,
        EventKind::BlePowerOff,
        EventKind::HrFeatureReady,
        EventKind::FtpFeatureReady,
        EventKind::StreamingFeaturesReady,
        EventKind::HrValueReceived,
    ];

    /// Camel case name used by application code.
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::DeviceFound => "deviceFound",
            EventKind::DeviceConnecting => "deviceConnecting",
            EventKind::DeviceConnected => "deviceConnected",
            EventKind::DeviceDisconnected => "deviceDisconnected",
            EventKind::BatteryLevelReceived => "batteryLevelReceived",
            EventKind::DisInformationReceived => "disInformationReceived",
            EventKind::BlePowerOn => "blePowerOn",
            EventKind::BlePowerOff => "blePowerOff",
            EventKind::HrFeatureReady => "hrFeatureReady",
            EventKind::FtpFeatureReady => "ftpFeatureReady",
            EventKind::StreamingFeaturesReady => "streamingFeaturesReady",
            EventKind::HrValueReceived => "hrValueReceived",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Key under which the native constant table exports this event.
    pub fn wire_key(self) -> String {
        event_name_to_wire_key(self.name())
    }
}

/// A decoded native event.
#[derive(Debug, Clone, PartialEq)]
pub enum PolarEvent {
    DeviceFound(DeviceInfo),
    DeviceConnecting(DeviceInfo),
    DeviceConnected(DeviceInfo),
    DeviceDisconnected(DeviceInfo),
    BatteryLevelReceived { identifier: String, battery_level: Option<u8> },
    DisInformationReceived { identifier: String, dis: DisInformation },
    BlePowerOn,
    BlePowerOff,
    HrFeatureReady(String),
    FtpFeatureReady(String),
    StreamingFeaturesReady { identifier: String, features: Option<Vec<u32>> },
    HrValueReceived { identifier: String, data: HeartRate },
}

/// First of `keys` present in `payload` that decodes as `T`. A field of the
/// wrong type or out of range counts as absent.
fn field<T: DeserializeOwned>(payload: &Value, keys: &[&str]) -> Option<T> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .find_map(|value| T::deserialize(value).ok())
}

/// Text of a field as the native layer sent it; non-string values keep their
/// JSON form.
fn text(payload: &Value, key: &str) -> String {
    match payload.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn identifier(payload: &Value, key: &str) -> Option<String> {
    match payload {
        Value::String(identifier) => Some(identifier.clone()),
        _ => field(payload, &[key]),
    }
}

fn device_info(payload: &Value) -> Option<DeviceInfo> {
    Some(DeviceInfo {
        device_id: identifier(payload, "deviceId")?,
        address: field(payload, &["address"]),
        rssi: field(payload, &["rssi"]),
        name: field(payload, &["name"]),
        is_connectable: field(payload, &["isConnectable", "connectable"]),
    })
}

fn heart_rate(data: &Value) -> HeartRate {
    HeartRate {
        hr: field(data, &["hr"]).unwrap_or_default(),
        rrs: field(data, &["rrs"]).unwrap_or_default(),
        rrs_ms: field(data, &["rrsMs"]).unwrap_or_default(),
        rr_available: field(data, &["rrAvailable"]),
        contact: field(data, &["contact", "contactStatus"]),
        contact_supported: field(data, &["contactSupported", "contactStatusSupported"]),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HrPayloadOut<'a> {
    identifier: &'a str,
    data: &'a HeartRate,
}

impl PolarEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PolarEvent::DeviceFound(_) => EventKind::DeviceFound,
            PolarEvent::DeviceConnecting(_) => EventKind::DeviceConnecting,
            PolarEvent::DeviceConnected(_) => EventKind::DeviceConnected,
            PolarEvent::DeviceDisconnected(_) => EventKind::DeviceDisconnected,
            PolarEvent::BatteryLevelReceived { .. } => EventKind::BatteryLevelReceived,
            PolarEvent::DisInformationReceived { .. } => EventKind::DisInformationReceived,
            PolarEvent::BlePowerOn => EventKind::BlePowerOn,
            PolarEvent::BlePowerOff => EventKind::BlePowerOff,
            PolarEvent::HrFeatureReady(_) => EventKind::HrFeatureReady,
            PolarEvent::FtpFeatureReady(_) => EventKind::FtpFeatureReady,
            PolarEvent::StreamingFeaturesReady { .. } => EventKind::StreamingFeaturesReady,
            PolarEvent::HrValueReceived { .. } => EventKind::HrValueReceived,
        }
    }

    /// Identifier of the device the event is about; power events have none.
    pub fn device_id(&self) -> Option<&str> {
        match self {
            PolarEvent::DeviceFound(info)
            | PolarEvent::DeviceConnecting(info)
            | PolarEvent::DeviceConnected(info)
            | PolarEvent::DeviceDisconnected(info) => Some(&info.device_id),
            PolarEvent::BatteryLevelReceived { identifier, .. }
            | PolarEvent::DisInformationReceived { identifier, .. }
            | PolarEvent::StreamingFeaturesReady { identifier, .. }
            | PolarEvent::HrValueReceived { identifier, .. }
            | PolarEvent::HrFeatureReady(identifier)
            | PolarEvent::FtpFeatureReady(identifier) => Some(identifier),
            PolarEvent::BlePowerOn | PolarEvent::BlePowerOff => None,
        }
    }

    /// Decodes the payload the native layer attached to an event of `kind`.
    ///
    /// Nothing is validated: a field that is missing, of the wrong type or out
    /// of range is taken as absent and the rest of the event still applies.
    /// Only a device event without an identifier yields `None`.
    pub fn decode(kind: EventKind, payload: &Value) -> Option<Self> {
        let event = match kind {
            EventKind::DeviceFound => PolarEvent::DeviceFound(device_info(payload)?),
            EventKind::DeviceConnecting => PolarEvent::DeviceConnecting(device_info(payload)?),
            EventKind::DeviceConnected => PolarEvent::DeviceConnected(device_info(payload)?),
            EventKind::DeviceDisconnected => {
                PolarEvent::DeviceDisconnected(device_info(payload)?)
            }
            EventKind::BatteryLevelReceived => PolarEvent::BatteryLevelReceived {
                identifier: identifier(payload, "identifier")?,
                battery_level: field(payload, &["level", "batteryLevel"]),
            },
            EventKind::DisInformationReceived => PolarEvent::DisInformationReceived {
                identifier: identifier(payload, "identifier")?,
                dis: DisInformation::new(text(payload, "uuid"), text(payload, "value")),
            },
            EventKind::BlePowerOn => PolarEvent::BlePowerOn,
            EventKind::BlePowerOff => PolarEvent::BlePowerOff,
            EventKind::HrFeatureReady => {
                PolarEvent::HrFeatureReady(identifier(payload, "identifier")?)
            }
            EventKind::FtpFeatureReady => {
                PolarEvent::FtpFeatureReady(identifier(payload, "identifier")?)
            }
            EventKind::StreamingFeaturesReady => PolarEvent::StreamingFeaturesReady {
                identifier: identifier(payload, "identifier")?,
                features: field(payload, &["features", "streamingFeatures"]),
            },
            EventKind::HrValueReceived => PolarEvent::HrValueReceived {
                identifier: identifier(payload, "identifier")?,
                data: heart_rate(payload.get("data").unwrap_or(&Value::Null)),
            },
        };
        Some(event)
    }

    /// The payload the Android module would attach to this event.
    pub fn to_payload(&self) -> Value {
        match self {
            PolarEvent::DeviceFound(info)
            | PolarEvent::DeviceConnecting(info)
            | PolarEvent::DeviceConnected(info)
            | PolarEvent::DeviceDisconnected(info) => json!(info),
            PolarEvent::BatteryLevelReceived {
                identifier,
                battery_level,
            } => json!({ "identifier": identifier, "level": battery_level }),
            PolarEvent::DisInformationReceived { identifier, dis } => {
                json!({ "identifier": identifier, "uuid": dis.uuid, "value": dis.value })
            }
            PolarEvent::BlePowerOn | PolarEvent::BlePowerOff => Value::Null,
            PolarEvent::HrFeatureReady(identifier) | PolarEvent::FtpFeatureReady(identifier) => {
                json!(identifier)
            }
            PolarEvent::StreamingFeaturesReady {
                identifier,
                features,
            } => json!({ "identifier": identifier, "features": features }),
            PolarEvent::HrValueReceived { identifier, data } => json!(HrPayloadOut {
                identifier,
                data
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_wire_keys() {
        assert_eq!(EventKind::DeviceFound.wire_key(), "DEVICE_FOUND");
        assert_eq!(EventKind::HrValueReceived.wire_key(), "HR_VALUE_RECEIVED");
        assert_eq!(EventKind::from_name("ftpFeatureReady"), Some(EventKind::FtpFeatureReady));
        assert_eq!(EventKind::from_name("FTP_FEATURE_READY"), None);
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn decode_battery_from_either_platform() {
        let android = json!({ "identifier": "A", "level": 87 });
        let ios = json!({ "identifier": "A", "batteryLevel": 87 });
        let expected = PolarEvent::BatteryLevelReceived {
            identifier: "A".into(),
            battery_level: Some(87),
        };
        assert_eq!(PolarEvent::decode(EventKind::BatteryLevelReceived, &android).unwrap(), expected);
        assert_eq!(PolarEvent::decode(EventKind::BatteryLevelReceived, &ios).unwrap(), expected);
    }

    #[test]
    fn decode_feature_ready_takes_bare_identifier() {
        let event = PolarEvent::decode(EventKind::HrFeatureReady, &json!("A")).unwrap();
        assert_eq!(event, PolarEvent::HrFeatureReady("A".into()));
        assert_eq!(event.device_id(), Some("A"));
    }

    #[test]
    fn decode_power_ignores_payload() {
        let event = PolarEvent::decode(EventKind::BlePowerOff, &Value::Null).unwrap();
        assert_eq!(event, PolarEvent::BlePowerOff);
        assert_eq!(event.device_id(), None);
    }

    #[test]
    fn decode_without_identifier_fails() {
        assert!(PolarEvent::decode(EventKind::DeviceFound, &json!({ "rssi": -40 })).is_none());
        assert!(PolarEvent::decode(EventKind::HrFeatureReady, &Value::Null).is_none());
        assert!(
            PolarEvent::decode(EventKind::BatteryLevelReceived, &json!({ "identifier": 7 }))
                .is_none()
        );
    }

    #[test]
    fn bad_fields_decode_as_absent() {
        let battery = json!({ "identifier": "A", "level": 300 });
        assert_eq!(
            PolarEvent::decode(EventKind::BatteryLevelReceived, &battery),
            Some(PolarEvent::BatteryLevelReceived {
                identifier: "A".into(),
                battery_level: None,
            })
        );

        let found = json!({ "deviceId": "B", "rssi": "strong", "name": "Polar H9" });
        assert_eq!(
            PolarEvent::decode(EventKind::DeviceFound, &found),
            Some(PolarEvent::DeviceFound(DeviceInfo::new("B").with_name("Polar H9")))
        );

        let hr = json!({ "identifier": "C", "data": { "hr": 70, "rrs": [-1] } });
        match PolarEvent::decode(EventKind::HrValueReceived, &hr) {
            Some(PolarEvent::HrValueReceived { identifier, data }) => {
                assert_eq!(identifier, "C");
                assert_eq!(data.hr, 70);
                assert!(data.rrs.is_empty());
            }
            other => panic!("expected heart rate event, got {:?}", other),
        }

        let dis = json!({ "identifier": "D", "uuid": "2A29", "value": 42 });
        assert_eq!(
            PolarEvent::decode(EventKind::DisInformationReceived, &dis),
            Some(PolarEvent::DisInformationReceived {
                identifier: "D".into(),
                dis: DisInformation::new("2A29", "42"),
            })
        );

        let streaming = json!({ "identifier": "E", "features": "all" });
        assert_eq!(
            PolarEvent::decode(EventKind::StreamingFeaturesReady, &streaming),
            Some(PolarEvent::StreamingFeaturesReady {
                identifier: "E".into(),
                features: None,
            })
        );
    }

    #[test]
    fn payload_decodes_back_to_the_same_event() {
        let events = [
            PolarEvent::DeviceConnected(DeviceInfo::new("A").with_rssi(-50).with_name("Polar H10")),
            PolarEvent::HrValueReceived {
                identifier: "A".into(),
                data: HeartRate {
                    hr: 64,
                    rrs: vec![960],
                    rrs_ms: vec![937],
                    ..HeartRate::default()
                },
            },
            PolarEvent::StreamingFeaturesReady {
                identifier: "A".into(),
                features: Some(vec![0, 1, 4]),
            },
        ];
        for event in events {
            let decoded = PolarEvent::decode(event.kind(), &event.to_payload()).unwrap();
            assert_eq!(decoded, event);
        }
    }
}
