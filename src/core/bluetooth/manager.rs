//! Polar BLE manager
//! This module provides the main interface to the native SDK: the event
//! dispatcher, the command facade and the long-lived subscriptions.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::bluetooth::codec::{ConstantTable, EventNameCodec};
use crate::core::bluetooth::commands::CommandExecutor;
use crate::core::bluetooth::constants::Features;
use crate::core::bluetooth::emitter::{EventEmitter, Subscription};
use crate::core::bluetooth::native::{
    AutoConnectParams, Dispatch, EventSink, NativeEvent, NativeModule,
};
use crate::core::bluetooth::scanner::{CommandHandle, DeviceScanner};
use crate::error::Result;

#[derive(Debug, PartialEq, Eq)]
enum Delivery {
    UnknownName,
    NoListener,
    Delivered(usize),
}

fn deliver(emitter: &EventEmitter, event: &NativeEvent) -> Delivery {
    if emitter.codec().kind_of(&event.name).is_none() {
        warn!("Unknown native event {}, dropped", event.name);
        return Delivery::UnknownName;
    }
    if emitter.listener_count(&event.name) == 0 {
        debug!("No listener for {}, event dropped", event.name);
        return Delivery::NoListener;
    }
    let delivered = emitter.emit(&event.name, &event.body);
    debug!("Delivered {} to {} listener(s)", event.name, delivered);
    Delivery::Delivered(delivered)
}

/// Owns the native module and everything layered over it.
pub struct PolarBleManager<N: NativeModule> {
    native: Arc<N>,
    emitter: EventEmitter,
    sink: EventSink,
    executor: CommandExecutor<N>,
    scanner: DeviceScanner<N>,
    dispatcher: JoinHandle<()>,
}

impl<N: NativeModule> PolarBleManager<N> {
    /// Creates a new manager and starts its event dispatcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(native: Arc<N>) -> Self {
        let constants = native.constants();
        let codec = EventNameCodec::new(constants);
        let emitter = EventEmitter::new(codec.clone());
        let (sink, rx) = EventSink::channel();

        native.set_event_sink(sink.clone());
        let dispatcher = tokio::spawn(Self::dispatch_events(rx, emitter.clone()));
        info!("Polar BLE manager started, dispatcher running.");

        Self {
            executor: CommandExecutor::new(native.clone()),
            scanner: DeviceScanner::new(native.clone(), codec, sink.clone()),
            native,
            emitter,
            sink,
            dispatcher,
        }
    }

    /// Delivers queued native events one at a time, in arrival order.
    async fn dispatch_events(mut rx: mpsc::UnboundedReceiver<Dispatch>, emitter: EventEmitter) {
        while let Some(dispatch) = rx.recv().await {
            match dispatch {
                Dispatch::Event(event) => {
                    deliver(&emitter, &event);
                }
                Dispatch::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Event dispatcher stopped");
    }

    pub fn native(&self) -> &Arc<N> {
        &self.native
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    pub fn codec(&self) -> &EventNameCodec {
        self.emitter.codec()
    }

    pub fn constants(&self) -> &ConstantTable {
        self.codec().constants()
    }

    /// Attaches a listener to the camel case event `name`.
    pub fn add_event_listener<F>(&self, name: &str, handler: F) -> Result<Subscription>
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.emitter.add_event_listener(name, handler)
    }

    /// Waits until every event queued so far has reached its listeners.
    pub async fn flush(&self) -> Result<()> {
        self.sink.flush().await
    }

    pub fn is_configured(&self) -> bool {
        self.executor.is_configured()
    }

    pub async fn configure(&self, features: Features) -> Result<()> {
        self.executor.configure(features).await
    }

    pub async fn connect_to_device(&self, identifier: &str) -> Result<()> {
        self.executor.connect_to_device(identifier).await
    }

    pub async fn disconnect_from_device(&self, identifier: &str) -> Result<()> {
        self.executor.disconnect_from_device(identifier).await
    }

    /// Starts a device search, cancelling any search already running.
    pub fn start_search(&self) -> Result<CommandHandle> {
        self.executor.ensure_configured()?;
        self.scanner.start_search()
    }

    /// Searches for devices until the native scan completes.
    ///
    /// Superseded by a later search, this future never resolves.
    pub async fn search_for_device(&self) -> Result<()> {
        self.start_search()?.wait().await
    }

    /// Starts auto-connect, cancelling any auto-connect already running.
    pub fn start_auto_connect(&self, params: AutoConnectParams) -> Result<CommandHandle> {
        self.executor.ensure_configured()?;
        Ok(self.scanner.start_auto_connect(params))
    }

    pub async fn start_auto_connect_to_device(
        &self,
        rssi_threshold: i32,
        service: Option<&str>,
        device_type: Option<&str>,
    ) -> Result<()> {
        let params = AutoConnectParams {
            rssi_threshold,
            service: service.map(str::to_string),
            device_type: device_type.map(str::to_string),
        };
        self.start_auto_connect(params)?.wait().await
    }

    pub fn cancel_search(&self) {
        self.scanner.cancel_search();
    }

    pub fn cancel_auto_connect(&self) {
        self.scanner.cancel_auto_connect();
    }

    pub fn is_searching(&self) -> bool {
        self.scanner.is_searching()
    }
}

impl<N: NativeModule> Drop for PolarBleManager<N> {
    fn drop(&mut self) {
        self.scanner.cancel_search();
        self.scanner.cancel_auto_connect();
        self.dispatcher.abort();
    }
}
