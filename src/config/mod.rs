pub mod auto_connect_config;

use std::path::Path;

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::auto_connect_config::AutoConnectConfig;
use crate::core::bluetooth::{ConstantTable, Features};
use crate::error::BridgeError;
use crate::utils::ensure_directory_exists;

pub const CONFIG_FILE_NAME: &str = "polar_ble_config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Feature names as exported by the native module, e.g. "HR".
    pub features: Vec<String>,
    pub log_level: String,
    pub auto_connect: AutoConnectConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            features: vec!["ALL_FEATURES".to_string()],
            log_level: "info".to_string(),
            auto_connect: AutoConnectConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from `path`, falling back to defaults when absent.
    pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", path);
        Ok(config)
    }

    /// Saves the config to `path`, creating its directory if needed.
    pub async fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            ensure_directory_exists(dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json).await?;
        info!("Config saved to {:?}", path);
        Ok(())
    }

    /// Combines the configured feature names into one bit set.
    pub fn feature_mask(&self, constants: &ConstantTable) -> Result<Features, BridgeError> {
        self.features.iter().try_fold(Features::empty(), |mask, name| {
            constants
                .feature(name)
                .map(|feature| mask | feature)
                .ok_or_else(|| BridgeError::UnknownFeature(name.clone()))
        })
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info.", self.log_level);
            log::LevelFilter::Info
        })
    }
}
