use serde::{Deserialize, Serialize};

use crate::core::bluetooth::{AutoConnectParams, DEFAULT_AUTO_CONNECT_RSSI};

/// Auto-connect settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoConnectConfig {
    /// Weakest signal, in dBm, a device may have to be picked.
    pub rssi_threshold: i32,
    /// Restrict to devices advertising this service, e.g. "180D".
    pub service: Option<String>,
    /// Restrict to a Polar device type, e.g. "H10".
    pub device_type: Option<String>,
}

impl Default for AutoConnectConfig {
    fn default() -> Self {
        AutoConnectConfig {
            rssi_threshold: DEFAULT_AUTO_CONNECT_RSSI,
            service: None,
            device_type: None,
        }
    }
}

impl AutoConnectConfig {
    pub fn params(&self) -> AutoConnectParams {
        AutoConnectParams {
            rssi_threshold: self.rssi_threshold,
            service: self.service.clone(),
            device_type: self.device_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_carry_threshold_and_filters() {
        let config = AutoConnectConfig {
            rssi_threshold: -70,
            service: Some("180D".into()),
            device_type: Some("H10".into()),
        };
        let params = config.params();
        assert_eq!(params.rssi_threshold, -70);
        assert_eq!(params.service.as_deref(), Some("180D"));
        assert_eq!(params.device_type.as_deref(), Some("H10"));
        assert_eq!(AutoConnectConfig::default().params().rssi_threshold, -60);
    }
}
