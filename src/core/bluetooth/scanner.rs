//! Long-lived native commands: device search and auto-connect.
//! Each kind holds at most one live subscription; starting a new one cancels
//! the previous one first.

use std::future::pending;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::codec::EventNameCodec;
use crate::core::bluetooth::events::EventKind;
use crate::core::bluetooth::native::{AutoConnectParams, EventSink, NativeModule};
use crate::error::{BridgeError, NativeError, Result};

/// Holds the cancellation token of the live subscription of one command kind.
#[derive(Default)]
pub struct SubscriptionSlot {
    current: Mutex<Option<CancellationToken>>,
}

impl SubscriptionSlot {
    /// Cancels the previous subscription, if any, and installs a fresh token.
    pub fn replace(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    /// Cancels the live subscription, if any.
    pub fn cancel(&self) {
        if let Some(token) = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

/// Pending result of a search or auto-connect request.
#[must_use = "a CommandHandle does nothing unless waited on or cancelled"]
pub struct CommandHandle {
    command: &'static str,
    token: CancellationToken,
    result: oneshot::Receiver<std::result::Result<(), NativeError>>,
}

impl CommandHandle {
    /// Stops further delivery for this request.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the native command completes.
    ///
    /// A request that was cancelled or superseded is abandoned: this future
    /// then never resolves. There is no timeout either; a native command that
    /// never completes leaves the caller pending.
    pub async fn wait(self) -> Result<()> {
        let CommandHandle {
            command,
            token,
            result,
        } = self;
        tokio::select! {
            biased;
            outcome = result => match outcome {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(BridgeError::native(command, e)),
                Err(_) => pending().await,
            },
            _ = token.cancelled() => pending().await,
        }
    }
}

/// Runs the search and auto-connect subscriptions of the native module.
pub struct DeviceScanner<N: NativeModule> {
    native: Arc<N>,
    codec: EventNameCodec,
    sink: EventSink,
    search: SubscriptionSlot,
    auto_connect: SubscriptionSlot,
}

impl<N: NativeModule> DeviceScanner<N> {
    pub fn new(native: Arc<N>, codec: EventNameCodec, sink: EventSink) -> Self {
        Self {
            native,
            codec,
            sink,
            search: SubscriptionSlot::default(),
            auto_connect: SubscriptionSlot::default(),
        }
    }

    /// Starts a discovery scan. Every found device is emitted as a
    /// `deviceFound` event; the handle resolves once the scan completes and
    /// all of its events have been delivered.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_search(&self) -> Result<CommandHandle> {
        let wire = self.codec.resolve_kind(EventKind::DeviceFound)?;
        if self.search.is_active() {
            info!("Superseding running device search");
        }
        let token = self.search.replace();
        let (result_tx, result_rx) = oneshot::channel();
        let mut stream = self.native.search_for_device();
        let sink = self.sink.clone();
        let task_token = token.clone();

        tokio::spawn(async move {
            let outcome = loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => {
                        debug!("Device search cancelled");
                        return;
                    }
                    item = stream.next() => match item {
                        Some(Ok(info)) => {
                            debug!("Search found device {}", info.device_id);
                            match serde_json::to_value(&info) {
                                Ok(body) => {
                                    sink.send_event(wire.as_str(), body);
                                }
                                Err(e) => warn!("Failed to encode found device: {}", e),
                            }
                        }
                        Some(Err(e)) => {
                            error!("Device search failed: {}", e);
                            break Err(e);
                        }
                        None => {
                            info!("Device search completed");
                            break Ok(());
                        }
                    }
                }
            };
            drop(stream);

            if let Err(e) = sink.flush().await {
                warn!("Could not flush search events: {}", e);
            }
            if !task_token.is_cancelled() {
                let _ = result_tx.send(outcome);
            }
        });

        info!("Device search started");
        Ok(CommandHandle {
            command: "searchForDevice",
            token,
            result: result_rx,
        })
    }

    /// Starts auto-connect with the given RSSI threshold and filters.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_auto_connect(&self, params: AutoConnectParams) -> CommandHandle {
        if self.auto_connect.is_active() {
            info!("Superseding running auto-connect");
        }
        let token = self.auto_connect.replace();
        let (result_tx, result_rx) = oneshot::channel();
        info!(
            "Auto-connect started, rssi >= {}, service {:?}, device type {:?}",
            params.rssi_threshold, params.service, params.device_type
        );
        let operation = self.native.start_auto_connect_to_device(params);
        let sink = self.sink.clone();
        let task_token = token.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!("Auto-connect cancelled");
                    return;
                }
                outcome = operation => outcome,
            };
            match &outcome {
                Ok(()) => info!("Auto-connect completed"),
                Err(e) => error!("Auto-connect failed: {}", e),
            }

            if let Err(e) = sink.flush().await {
                warn!("Could not flush auto-connect events: {}", e);
            }
            if !task_token.is_cancelled() {
                let _ = result_tx.send(outcome);
            }
        });

        CommandHandle {
            command: "startAutoConnectToDevice",
            token,
            result: result_rx,
        }
    }

    pub fn cancel_search(&self) {
        self.search.cancel();
    }

    pub fn cancel_auto_connect(&self) {
        self.auto_connect.cancel();
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_a_slot_cancels_the_previous_token() {
        let slot = SubscriptionSlot::default();
        assert!(!slot.is_active());
        let first = slot.replace();
        let second = slot.replace();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(slot.is_active());
        slot.cancel();
        assert!(second.is_cancelled());
        assert!(!slot.is_active());
    }

    #[tokio::test]
    async fn cancelled_handle_never_resolves() {
        let (_tx, rx) = oneshot::channel();
        let handle = CommandHandle {
            command: "searchForDevice",
            token: CancellationToken::new(),
            result: rx,
        };
        handle.cancel();
        let waited = tokio::time::timeout(std::time::Duration::from_millis(20), handle.wait()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn completed_handle_resolves_even_if_cancelled_later() {
        let (tx, rx) = oneshot::channel();
        let handle = CommandHandle {
            command: "searchForDevice",
            token: CancellationToken::new(),
            result: rx,
        };
        tx.send(Ok(())).unwrap();
        handle.cancel();
        assert!(handle.wait().await.is_ok());
    }
}
