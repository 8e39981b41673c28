//! Subscription registry
//! Listeners are attached per wire event name and detached through the
//! `Subscription` handle returned on registration.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};

use log::{debug, error, warn};
use serde_json::Value;

use crate::core::bluetooth::codec::EventNameCodec;
use crate::error::Result;

type Handler = Box<dyn FnMut(&Value) + Send>;

struct Listener {
    id: u64,
    active: Arc<AtomicBool>,
    handler: Mutex<Handler>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_event: HashMap<String, Vec<Arc<Listener>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A listener that panicked must not take the whole registry down with it.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Dispatches native events to the listeners registered for them.
#[derive(Clone)]
pub struct EventEmitter {
    codec: EventNameCodec,
    listeners: Arc<Mutex<Listeners>>,
}

impl EventEmitter {
    pub fn new(codec: EventNameCodec) -> Self {
        Self {
            codec,
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    pub fn codec(&self) -> &EventNameCodec {
        &self.codec
    }

    /// Attaches `handler` to the camel case event `name`.
    ///
    /// The wire name is resolved through the codec on every call; a name the
    /// native layer does not export is an error.
    pub fn add_event_listener<F>(&self, name: &str, handler: F) -> Result<Subscription>
    where
        F: FnMut(&Value) + Send + 'static,
    {
        let wire = self.codec.resolve(name)?;
        Ok(self.add_listener(&wire, handler))
    }

    /// Attaches `handler` directly to a wire event name.
    pub fn add_listener<F>(&self, wire: &str, handler: F) -> Subscription
    where
        F: FnMut(&Value) + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners
            .by_event
            .entry(wire.to_string())
            .or_default()
            .push(Arc::new(Listener {
                id,
                active: active.clone(),
                handler: Mutex::new(Box::new(handler)),
            }));
        debug!("Listener {} attached to {}", id, wire);

        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            event: wire.to_string(),
            id,
            active,
        }
    }

    /// Delivers `payload` to every listener currently attached to `wire`.
    /// Returns how many listeners were called.
    ///
    /// A listener that emits from inside its own handler is not re-entered;
    /// the nested delivery to that listener is skipped.
    pub fn emit(&self, wire: &str, payload: &Value) -> usize {
        let targets: Vec<Arc<Listener>> = lock(&self.listeners)
            .by_event
            .get(wire)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for listener in targets {
            let mut handler = match listener.handler.try_lock() {
                Ok(handler) => handler,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    warn!(
                        "Listener {} is already handling {}, nested emit skipped",
                        listener.id, wire
                    );
                    continue;
                }
            };
            if !listener.active.load(Ordering::SeqCst) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| (*handler)(payload))).is_err() {
                error!("Listener {} for {} panicked", listener.id, wire);
            }
            delivered += 1;
        }
        delivered
    }

    pub fn listener_count(&self, wire: &str) -> usize {
        lock(&self.listeners)
            .by_event
            .get(wire)
            .map_or(0, Vec::len)
    }

    pub fn has_listeners(&self) -> bool {
        lock(&self.listeners)
            .by_event
            .values()
            .any(|listeners| !listeners.is_empty())
    }

    /// Detaches every listener of `wire`. Outstanding handles become no-ops.
    pub fn remove_all_listeners(&self, wire: &str) {
        if let Some(removed) = lock(&self.listeners).by_event.remove(wire) {
            for listener in removed {
                listener.active.store(false, Ordering::SeqCst);
            }
        }
    }
}

/// Handle to one attached listener. Dropping it detaches the listener.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    listeners: Weak<Mutex<Listeners>>,
    event: String,
    id: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Detaches the listener. Safe to call repeatedly, and after the emitter
    /// itself is gone.
    pub fn remove(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let mut listeners = lock(&listeners);
        if let Some(attached) = listeners.by_event.get_mut(&self.event) {
            attached.retain(|listener| listener.id != self.id);
            if attached.is_empty() {
                listeners.by_event.remove(&self.event);
            }
        }
        debug!("Listener {} detached from {}", self.id, self.event);
    }

    pub fn event_name(&self) -> &str {
        &self.event
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
