//! Polar BLE commands implementation
//! Wraps the one-shot native commands and gates them behind `configure`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};

use crate::core::bluetooth::constants::Features;
use crate::core::bluetooth::native::NativeModule;
use crate::error::{BridgeError, Result};

/// Command executor for the native module
pub struct CommandExecutor<N: NativeModule> {
    native: Arc<N>,
    configured: AtomicBool,
}

impl<N: NativeModule> CommandExecutor<N> {
    /// Create a new CommandExecutor
    pub fn new(native: Arc<N>) -> Self {
        Self {
            native,
            configured: AtomicBool::new(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    /// Fails with `Unconfigured` until `configure` has succeeded.
    pub fn ensure_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(BridgeError::Unconfigured)
        }
    }

    /// Configures the native SDK with the given feature set.
    pub async fn configure(&self, features: Features) -> Result<()> {
        if self.is_configured() {
            warn!("configure called again, reconfiguring native module with {}", features);
        }
        info!("Configuring native module with features {}", features);
        self.native.configure(features).await.map_err(|e| {
            error!("configure failed: {}", e);
            BridgeError::native("configure", e)
        })?;
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn connect_to_device(&self, identifier: &str) -> Result<()> {
        self.ensure_configured()?;
        info!("Connecting to device {}", identifier);
        self.native.connect_to_device(identifier).await.map_err(|e| {
            error!("connectToDevice {} failed: {}", identifier, e);
            BridgeError::native("connectToDevice", e)
        })
    }

    pub async fn disconnect_from_device(&self, identifier: &str) -> Result<()> {
        self.ensure_configured()?;
        info!("Disconnecting from device {}", identifier);
        self.native.disconnect_from_device(identifier).await.map_err(|e| {
            error!("disconnectFromDevice {} failed: {}", identifier, e);
            BridgeError::native("disconnectFromDevice", e)
        })
    }
}
