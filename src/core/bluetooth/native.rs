//! Native SDK boundary
//! The platform module is opaque: it exports a constant table, accepts
//! commands, and pushes named events into the `EventSink` it is handed.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::core::bluetooth::codec::ConstantTable;
use crate::core::bluetooth::constants::Features;
use crate::core::bluetooth::types::DeviceInfo;
use crate::error::{BridgeError, NativeError, Result};

/// A native event exactly as the platform emits it: wire name plus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeEvent {
    pub name: String,
    #[serde(default)]
    pub body: Value,
}

impl NativeEvent {
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

/// Parameters of an auto-connect request, used opaquely by the native layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AutoConnectParams {
    pub rssi_threshold: i32,
    pub service: Option<String>,
    pub device_type: Option<String>,
}

pub type NativeStream<T> = BoxStream<'static, std::result::Result<T, NativeError>>;
pub type NativeFuture<T> = BoxFuture<'static, std::result::Result<T, NativeError>>;

/// The platform SDK as seen by the bridge.
#[async_trait]
pub trait NativeModule: Send + Sync + 'static {
    /// Event wire names and feature bits exported by the module.
    fn constants(&self) -> ConstantTable;

    /// Hands the module the channel it must emit every event through.
    fn set_event_sink(&self, sink: EventSink);

    async fn configure(&self, features: Features) -> std::result::Result<(), NativeError>;

    async fn connect_to_device(&self, identifier: &str) -> std::result::Result<(), NativeError>;

    async fn disconnect_from_device(&self, identifier: &str)
    -> std::result::Result<(), NativeError>;

    /// Discovery scan: yields found devices until the scan completes.
    /// Dropping the stream cancels the scan.
    fn search_for_device(&self) -> NativeStream<DeviceInfo>;

    /// Completes when auto-connect finishes. Dropping the future cancels it.
    fn start_auto_connect_to_device(&self, params: AutoConnectParams) -> NativeFuture<()>;
}

pub(crate) enum Dispatch {
    Event(NativeEvent),
    Flush(oneshot::Sender<()>),
}

/// Sending half of the single channel every native event travels through.
///
/// Events are delivered to listeners by one dispatcher task, in the order
/// they were sent.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Dispatch>,
}

impl EventSink {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Dispatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues an event. Returns false once the dispatcher has stopped.
    pub fn send(&self, event: NativeEvent) -> bool {
        self.tx.send(Dispatch::Event(event)).is_ok()
    }

    pub fn send_event(&self, name: impl Into<String>, body: Value) -> bool {
        self.send(NativeEvent::new(name, body))
    }

    /// Resolves once every event queued before this call has been delivered.
    pub async fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Dispatch::Flush(done_tx))
            .map_err(|_| BridgeError::DispatcherClosed)?;
        done_rx.await.map_err(|_| BridgeError::DispatcherClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
