//! Application state management
//! Two consumers of the same reducer: `DeviceStore`, which the caller feeds
//! by hand, and `AppState`, which subscribes itself to every native event
//! and publishes a fresh immutable snapshot after each one.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::watch;

use crate::core::bluetooth::{
    AutoConnectParams, BridgeState, EventKind, EventNameCodec, Features, NativeEvent,
    NativeModule, PolarBleManager, PolarDevice, PolarEvent, Subscription, apply, reduce,
};
use crate::error::Result;

fn decode(kind: EventKind, body: &Value) -> Option<PolarEvent> {
    let event = PolarEvent::decode(kind, body);
    if event.is_none() {
        warn!("Skipping {} payload without an identifier: {}", kind.name(), body);
    }
    event
}

/// Device state driven explicitly by the caller.
#[derive(Debug, Clone, Default)]
pub struct DeviceStore {
    state: BridgeState,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &PolarEvent) {
        apply(&mut self.state, event);
    }

    /// Applies a raw native event. Unknown wire names and malformed payloads
    /// are logged and skipped. Returns whether the event was applied.
    pub fn handle_native(&mut self, codec: &EventNameCodec, event: &NativeEvent) -> bool {
        let Some(kind) = codec.kind_of(&event.name) else {
            warn!("Skipping unknown native event {}", event.name);
            return false;
        };
        match decode(kind, &event.body) {
            Some(decoded) => {
                self.apply(&decoded);
                true
            }
            None => false,
        }
    }

    /// Rebuilds state from a recorded sequence of native events.
    pub fn replay<'a>(
        codec: &EventNameCodec,
        events: impl IntoIterator<Item = &'a NativeEvent>,
    ) -> Self {
        let mut store = Self::new();
        for event in events {
            store.handle_native(codec, event);
        }
        store
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn devices(&self) -> Vec<PolarDevice> {
        self.state.device_list()
    }

    pub fn device(&self, identifier: &str) -> Option<&PolarDevice> {
        self.state.device(identifier)
    }

    pub fn ble_powered_on(&self) -> Option<bool> {
        self.state.ble_powered_on
    }
}

/// Live device state for one session over a `PolarBleManager`.
///
/// Created empty; every record comes from an event received after creation.
/// Dropping the session detaches all of its listeners.
pub struct AppState<N: NativeModule> {
    manager: Arc<PolarBleManager<N>>,
    state: Arc<watch::Sender<Arc<BridgeState>>>,
    subscriptions: Vec<Subscription>,
}

impl<N: NativeModule> AppState<N> {
    /// Subscribes to every device event of `manager`.
    pub fn new(manager: Arc<PolarBleManager<N>>) -> Result<Self> {
        let (sender, _) = watch::channel(Arc::new(BridgeState::default()));
        let state = Arc::new(sender);

        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let state = state.clone();
                manager.add_event_listener(kind.name(), move |body| {
                    if let Some(event) = decode(kind, body) {
                        debug!("Applying {}", kind.name());
                        state.send_modify(|current| *current = Arc::new(reduce(current, &event)));
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        info!("Session subscribed to {} event kinds", subscriptions.len());

        Ok(Self {
            manager,
            state,
            subscriptions,
        })
    }

    pub fn manager(&self) -> &Arc<PolarBleManager<N>> {
        &self.manager
    }

    /// Immutable snapshot of the current state.
    pub fn snapshot(&self) -> Arc<BridgeState> {
        self.state.borrow().clone()
    }

    /// Current device records; order is unspecified.
    pub fn devices(&self) -> Vec<PolarDevice> {
        self.snapshot().device_list()
    }

    pub fn device(&self, identifier: &str) -> Option<PolarDevice> {
        self.snapshot().device(identifier).cloned()
    }

    /// `None` until the first power event arrives.
    pub fn ble_powered_on(&self) -> Option<bool> {
        self.snapshot().ble_powered_on
    }

    /// Receiver that is notified whenever a new snapshot is published.
    pub fn watch(&self) -> watch::Receiver<Arc<BridgeState>> {
        self.state.subscribe()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriptions.iter().all(Subscription::is_active)
    }

    pub async fn configure(&self, features: Features) -> Result<()> {
        self.manager.configure(features).await
    }

    pub async fn connect_to_device(&self, identifier: &str) -> Result<()> {
        self.manager.connect_to_device(identifier).await
    }

    pub async fn disconnect_from_device(&self, identifier: &str) -> Result<()> {
        self.manager.disconnect_from_device(identifier).await
    }

    pub async fn search_for_device(&self) -> Result<()> {
        self.manager.search_for_device().await
    }

    pub async fn start_auto_connect_to_device(
        &self,
        rssi_threshold: i32,
        service: Option<&str>,
        device_type: Option<&str>,
    ) -> Result<()> {
        self.manager
            .start_auto_connect_to_device(rssi_threshold, service, device_type)
            .await
    }

    pub async fn start_auto_connect(&self, params: AutoConnectParams) -> Result<()> {
        self.manager.start_auto_connect(params)?.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::{ConnectionState, ConstantTable, DeviceInfo, LoopbackModule};
    use serde_json::json;

    #[test]
    fn store_replays_recorded_native_events() {
        let codec = EventNameCodec::new(ConstantTable::ios());
        let log = vec![
            NativeEvent::new(
                "deviceFound",
                json!({ "deviceId": "A", "rssi": -60, "name": "Polar OH1", "connectable": true }),
            ),
            NativeEvent::new("batteryLevelReceived", json!({ "identifier": "A", "batteryLevel": 87 })),
            NativeEvent::new("deviceConnected", json!({ "deviceId": "A", "rssi": -58 })),
            NativeEvent::new("blePowerOn", Value::Null),
        ];
        let store = DeviceStore::replay(&codec, &log);
        let device = store.device("A").unwrap();
        assert_eq!(device.state, Some(ConnectionState::Connected));
        assert_eq!(device.battery_level, Some(87));
        assert_eq!(device.rssi, Some(-58));
        assert_eq!(device.name.as_deref(), Some("Polar OH1"));
        assert_eq!(store.ble_powered_on(), Some(true));
    }

    #[test]
    fn store_skips_bad_events_and_keeps_going() {
        let codec = EventNameCodec::new(ConstantTable::android());
        let mut store = DeviceStore::new();
        assert!(!store.handle_native(&codec, &NativeEvent::new("DEVICE_VANISHED", json!({}))));
        assert!(!store.handle_native(
            &codec,
            &NativeEvent::new("BATTERY_LEVEL_RECEIVED", json!({ "level": "high" }))
        ));
        assert!(store.handle_native(&codec, &NativeEvent::new("HR_FEATURE_READY", json!("A"))));
        assert_eq!(store.devices().len(), 1);
        assert!(store.device("A").unwrap().hr_feature_ready);
    }

    #[test]
    fn store_keeps_records_for_events_with_bad_fields() {
        let codec = EventNameCodec::new(ConstantTable::android());
        let log = vec![
            NativeEvent::new("BATTERY_LEVEL_RECEIVED", json!({ "identifier": "A", "level": 300 })),
            NativeEvent::new("DEVICE_FOUND", json!({ "deviceId": "B", "rssi": "strong" })),
        ];
        let store = DeviceStore::replay(&codec, &log);
        assert_eq!(store.devices().len(), 2);
        assert_eq!(store.device("A").unwrap().battery_level, None);
        assert_eq!(store.device("B").unwrap().state, Some(ConnectionState::Disconnected));
        assert_eq!(store.device("B").unwrap().rssi, None);
    }

    #[tokio::test]
    async fn session_starts_empty_and_tracks_events() {
        let native = Arc::new(LoopbackModule::new());
        let manager = Arc::new(PolarBleManager::new(native.clone()));
        let session = AppState::new(manager.clone()).unwrap();
        assert!(session.devices().is_empty());
        assert_eq!(session.ble_powered_on(), None);

        native.emit(&PolarEvent::DeviceFound(DeviceInfo::new("A").with_rssi(-60)));
        native.emit(&PolarEvent::BlePowerOff);
        manager.flush().await.unwrap();

        assert_eq!(session.devices().len(), 1);
        assert_eq!(session.ble_powered_on(), Some(false));
    }

    #[tokio::test]
    async fn watchers_see_each_new_snapshot() {
        let native = Arc::new(LoopbackModule::new());
        let manager = Arc::new(PolarBleManager::new(native.clone()));
        let session = AppState::new(manager.clone()).unwrap();
        let mut watcher = session.watch();
        let before = session.snapshot();

        native.emit(&PolarEvent::HrFeatureReady("A".into()));
        watcher.changed().await.unwrap();
        assert!(watcher.borrow().device("A").unwrap().hr_feature_ready);
        assert!(before.devices.is_empty());
    }

    #[tokio::test]
    async fn sessions_do_not_share_state() {
        let native = Arc::new(LoopbackModule::new());
        let manager = Arc::new(PolarBleManager::new(native.clone()));
        let first = AppState::new(manager.clone()).unwrap();

        native.emit(&PolarEvent::HrFeatureReady("A".into()));
        manager.flush().await.unwrap();

        let second = AppState::new(manager.clone()).unwrap();
        native.emit(&PolarEvent::FtpFeatureReady("B".into()));
        manager.flush().await.unwrap();

        assert_eq!(first.devices().len(), 2);
        assert_eq!(second.devices().len(), 1);
        assert!(second.device("A").is_none());
    }

    #[tokio::test]
    async fn dropped_session_detaches_listeners() {
        let native = Arc::new(LoopbackModule::new());
        let manager = Arc::new(PolarBleManager::new(native.clone()));
        let session = AppState::new(manager.clone()).unwrap();
        assert!(session.is_subscribed());
        assert!(manager.emitter().has_listeners());
        drop(session);
        assert!(!manager.emitter().has_listeners());
    }
}
