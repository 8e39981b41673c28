//! Bluetooth functionality for the Polar BLE bridge
//! This module handles everything between the native SDK and the
//! application: event naming, listener registration, commands, and the
//! reduction of native events into device state.

mod codec;
mod commands;
mod constants;
mod emitter;
mod events;
mod loopback;
mod manager;
mod native;
mod reducer;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use codec::{ConstantTable, EventNameCodec, event_name_to_wire_key, wire_key_to_event_name};
pub use commands::CommandExecutor;
pub use constants::*; // Re-export all constants
pub use emitter::{EventEmitter, Subscription};
pub use events::{EventKind, PolarEvent};
pub use loopback::{AutoConnectFeed, LoopbackModule, SearchFeed};
pub use manager::PolarBleManager;
pub use native::{
    AutoConnectParams, EventSink, NativeEvent, NativeFuture, NativeModule, NativeStream,
};
pub use reducer::{BridgeState, DeviceRegistry, apply, reduce};
pub use scanner::{CommandHandle, DeviceScanner, SubscriptionSlot};
pub use types::{ConnectionState, DeviceInfo, DisInformation, HeartRate, PolarDevice};
