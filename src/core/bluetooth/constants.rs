//! Constants used throughout the bridge
//! Feature bits handed to `configure` and the Bluetooth SIG UUIDs of the
//! Device Information Service characteristics a sensor may report.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability flags passed through to the native `configure` call untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Features(u32);

impl Features {
    /// Heart rate notifications
    pub const HR: Features = Features(1);
    /// Device Information Service reads
    pub const DEVICE_INFO: Features = Features(1 << 1);
    /// Battery service reads
    pub const BATTERY_STATUS: Features = Features(1 << 2);
    /// Polar measurement data streaming
    pub const POLAR_SENSOR_STREAMING: Features = Features(1 << 3);
    /// Polar file transfer
    pub const POLAR_FILE_TRANSFER: Features = Features(1 << 4);
    pub const ALL_FEATURES: Features = Features(0xff);

    /// Names under which the native layer exports the feature bits.
    pub const NAMED: [(&'static str, Features); 6] = [
        ("HR", Features::HR),
        ("DEVICE_INFO", Features::DEVICE_INFO),
        ("BATTERY_STATUS", Features::BATTERY_STATUS),
        ("POLAR_SENSOR_STREAMING", Features::POLAR_SENSOR_STREAMING),
        ("POLAR_FILE_TRANSFER", Features::POLAR_FILE_TRANSFER),
        ("ALL_FEATURES", Features::ALL_FEATURES),
    ];

    pub const fn empty() -> Self {
        Features(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Features(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Features) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Features {
    type Output = Features;

    fn bitor(self, rhs: Features) -> Features {
        Features(self.0 | rhs.0)
    }
}

impl BitOrAssign for Features {
    fn bitor_assign(&mut self, rhs: Features) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Device Information Service characteristic UUIDs
pub const UUID_SYSTEM_ID: Uuid = Uuid::from_u128(0x00002a23_0000_1000_8000_00805f9b34fb);
pub const UUID_MODEL_NUMBER: Uuid = Uuid::from_u128(0x00002a24_0000_1000_8000_00805f9b34fb);
pub const UUID_SERIAL_NUMBER: Uuid = Uuid::from_u128(0x00002a25_0000_1000_8000_00805f9b34fb);
pub const UUID_FIRMWARE_REVISION: Uuid = Uuid::from_u128(0x00002a26_0000_1000_8000_00805f9b34fb);
pub const UUID_HARDWARE_REVISION: Uuid = Uuid::from_u128(0x00002a27_0000_1000_8000_00805f9b34fb);
pub const UUID_SOFTWARE_REVISION: Uuid = Uuid::from_u128(0x00002a28_0000_1000_8000_00805f9b34fb);
pub const UUID_MANUFACTURER_NAME: Uuid = Uuid::from_u128(0x00002a29_0000_1000_8000_00805f9b34fb);

/// Bluetooth base UUID; 16-bit short UUIDs occupy bits 96..112.
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Default RSSI threshold used by auto-connect when none is configured.
pub const DEFAULT_AUTO_CONNECT_RSSI: i32 = -60;
