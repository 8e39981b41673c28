//! In-memory native module
//! Behaves like the platform SDK from the bridge's point of view: it records
//! every command, answers with the lifecycle events a real sensor would
//! produce, and lets the caller push arbitrary events or drive search and
//! auto-connect by hand.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::{FutureExt, StreamExt, stream};
use log::debug;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::core::bluetooth::codec::{ConstantTable, EventNameCodec};
use crate::core::bluetooth::constants::Features;
use crate::core::bluetooth::events::{EventKind, PolarEvent};
use crate::core::bluetooth::native::{
    AutoConnectParams, EventSink, NativeFuture, NativeModule, NativeStream,
};
use crate::core::bluetooth::types::DeviceInfo;
use crate::error::NativeError;

type SearchItem = Result<DeviceInfo, NativeError>;

/// Hand-driven device search.
pub struct SearchFeed {
    tx: mpsc::UnboundedSender<SearchItem>,
}

impl SearchFeed {
    /// Reports a found device. Returns false once the search was dropped.
    pub fn found(&self, info: DeviceInfo) -> bool {
        self.tx.send(Ok(info)).is_ok()
    }

    pub fn fail(self, error: NativeError) {
        let _ = self.tx.send(Err(error));
    }

    /// Ends the scan successfully.
    pub fn complete(self) {}
}

/// Hand-driven auto-connect.
pub struct AutoConnectFeed {
    tx: oneshot::Sender<Result<(), NativeError>>,
    pub params: AutoConnectParams,
}

impl AutoConnectFeed {
    pub fn complete(self, outcome: Result<(), NativeError>) {
        let _ = self.tx.send(outcome);
    }
}

#[derive(Default)]
struct LoopbackState {
    sink: Option<EventSink>,
    features: Option<Features>,
    advertised: Vec<DeviceInfo>,
    calls: Vec<String>,
    fail_next: Option<NativeError>,
    manual_search: bool,
    manual_auto_connect: bool,
    search_feeds: Vec<SearchFeed>,
    auto_connect_feeds: Vec<AutoConnectFeed>,
}

/// A `NativeModule` backed by memory instead of a Bluetooth stack.
pub struct LoopbackModule {
    codec: EventNameCodec,
    state: Mutex<LoopbackState>,
}

impl Default for LoopbackModule {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackModule {
    /// A module exporting the Android constant table.
    pub fn new() -> Self {
        Self::with_constants(ConstantTable::android())
    }

    pub fn with_constants(constants: ConstantTable) -> Self {
        Self {
            codec: EventNameCodec::new(constants),
            state: Mutex::new(LoopbackState::default()),
        }
    }

    /// Devices the module pretends are in range.
    pub fn with_advertised(self, devices: Vec<DeviceInfo>) -> Self {
        self.state().advertised = devices;
        self
    }

    /// Searches stay open until driven through `take_search_feed`.
    pub fn with_manual_search(self) -> Self {
        self.state().manual_search = true;
        self
    }

    /// Auto-connects stay open until driven through `take_auto_connect_feed`.
    pub fn with_manual_auto_connect(self) -> Self {
        self.state().manual_auto_connect = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commands received so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn configured_features(&self) -> Option<Features> {
        self.state().features
    }

    /// Makes the next command reject with `error`.
    pub fn fail_next(&self, error: NativeError) {
        self.state().fail_next = Some(error);
    }

    /// Oldest search still waiting to be driven.
    pub fn take_search_feed(&self) -> Option<SearchFeed> {
        let mut state = self.state();
        (!state.search_feeds.is_empty()).then(|| state.search_feeds.remove(0))
    }

    /// Oldest auto-connect still waiting to be driven.
    pub fn take_auto_connect_feed(&self) -> Option<AutoConnectFeed> {
        let mut state = self.state();
        (!state.auto_connect_feeds.is_empty()).then(|| state.auto_connect_feeds.remove(0))
    }

    /// Emits `event` under the wire name this module exports for it.
    pub fn emit(&self, event: &PolarEvent) -> bool {
        match self.codec.resolve_kind(event.kind()) {
            Ok(wire) => self.emit_raw(&wire, event.to_payload()),
            Err(e) => {
                debug!("Loopback cannot emit {:?}: {}", event.kind(), e);
                false
            }
        }
    }

    /// Emits an arbitrary payload under an arbitrary wire name.
    pub fn emit_raw(&self, wire: &str, body: Value) -> bool {
        let sink = self.state().sink.clone();
        match sink {
            Some(sink) => sink.send_event(wire, body),
            None => false,
        }
    }

    fn record(&self, call: String) -> Result<(), NativeError> {
        let mut state = self.state();
        debug!("Loopback received {}", call);
        state.calls.push(call);
        match state.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn info_for(&self, identifier: &str) -> DeviceInfo {
        self.state()
            .advertised
            .iter()
            .find(|info| info.device_id == identifier)
            .cloned()
            .unwrap_or_else(|| DeviceInfo::new(identifier))
    }
}

#[async_trait]
impl NativeModule for LoopbackModule {
    fn constants(&self) -> ConstantTable {
        self.codec.constants().clone()
    }

    fn set_event_sink(&self, sink: EventSink) {
        self.state().sink = Some(sink);
    }

    async fn configure(&self, features: Features) -> Result<(), NativeError> {
        self.record(format!("configure({})", features))?;
        self.state().features = Some(features);
        self.emit(&PolarEvent::BlePowerOn);
        Ok(())
    }

    async fn connect_to_device(&self, identifier: &str) -> Result<(), NativeError> {
        self.record(format!("connectToDevice({})", identifier))?;
        let info = self.info_for(identifier);
        self.emit(&PolarEvent::DeviceConnecting(info.clone()));
        self.emit(&PolarEvent::DeviceConnected(info));
        Ok(())
    }

    async fn disconnect_from_device(&self, identifier: &str) -> Result<(), NativeError> {
        self.record(format!("disconnectFromDevice({})", identifier))?;
        self.emit(&PolarEvent::DeviceDisconnected(self.info_for(identifier)));
        Ok(())
    }

    fn search_for_device(&self) -> NativeStream<DeviceInfo> {
        if let Err(error) = self.record("searchForDevice".to_string()) {
            return stream::once(async move { Err(error) }).boxed();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        if state.manual_search {
            state.search_feeds.push(SearchFeed { tx });
        } else {
            for info in &state.advertised {
                let _ = tx.send(Ok(info.clone()));
            }
        }

        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
    }

    fn start_auto_connect_to_device(&self, params: AutoConnectParams) -> NativeFuture<()> {
        let call = format!(
            "startAutoConnectToDevice({}, {:?}, {:?})",
            params.rssi_threshold, params.service, params.device_type
        );
        if let Err(error) = self.record(call) {
            return async move { Err(error) }.boxed();
        }

        let mut state = self.state();
        if state.manual_auto_connect {
            let (tx, rx) = oneshot::channel();
            state.auto_connect_feeds.push(AutoConnectFeed { tx, params });
            return async move {
                rx.await
                    .unwrap_or_else(|_| Err(NativeError::new("auto-connect abandoned")))
            }
            .boxed();
        }

        let candidate = state
            .advertised
            .iter()
            .filter(|info| info.rssi.is_some_and(|rssi| rssi >= params.rssi_threshold))
            .max_by_key(|info| info.rssi)
            .cloned();
        let sink = state.sink.clone();
        drop(state);

        let connecting = self.codec.resolve_kind(EventKind::DeviceConnecting);
        let connected = self.codec.resolve_kind(EventKind::DeviceConnected);
        async move {
            let Some(info) = candidate else {
                return Err(NativeError::new("no device in range"));
            };
            if let (Some(sink), Ok(connecting), Ok(connected)) = (sink, connecting, connected) {
                sink.send_event(connecting, PolarEvent::DeviceConnecting(info.clone()).to_payload());
                sink.send_event(connected, PolarEvent::DeviceConnected(info).to_payload());
            }
            Ok(())
        }
        .boxed()
    }
}
