//! Typed event bus over the fixed session event catalog
//!
//! The session publishes its lifecycle to listeners through a small
//! publish/subscribe surface. The catalog is closed: there are exactly seven
//! events, each with a typed payload, so listeners match on an enum instead
//! of parsing stringly-typed event names.
//!
//! # Delivery rules
//!
//! - Listeners run in subscription order.
//! - An emit delivers to the listeners registered at the moment of emit; a
//!   listener added during an emit does not receive that emit.
//! - A panicking listener is caught and logged; the remaining listeners
//!   still run.
//! - Re-subscribing the same shared listener (`Arc` identity) is a no-op,
//!   returning the existing registration.

use mprow_core::Response;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock};

/// Names of the session events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Transport opened.
    Open,
    /// Transport closed.
    Close,
    /// Transport or connect failure.
    Error,
    /// A decoded inbound message.
    Message,
    /// A reconnect attempt is about to run.
    Reconnecting,
    /// A reconnect attempt succeeded.
    Reconnected,
    /// The reconnect attempt budget is exhausted.
    ReconnectFailed,
}

/// A session event with its payload.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The transport reached the open state.
    Open,
    /// The transport closed with the peer's code and reason.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// A transport error or failed connect attempt.
    Error {
        /// Human-readable failure description.
        message: String,
    },
    /// A decoded inbound JSON-RPC message.
    Message(Response),
    /// A reconnect attempt is about to run.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Configured attempt budget.
        max_attempts: u32,
    },
    /// A reconnect attempt succeeded.
    Reconnected,
    /// Reconnection was abandoned after the configured attempt budget.
    ReconnectFailed,
}

impl ClientEvent {
    /// The catalog name of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Open => EventKind::Open,
            ClientEvent::Close { .. } => EventKind::Close,
            ClientEvent::Error { .. } => EventKind::Error,
            ClientEvent::Message(_) => EventKind::Message,
            ClientEvent::Reconnecting { .. } => EventKind::Reconnecting,
            ClientEvent::Reconnected => EventKind::Reconnected,
            ClientEvent::ReconnectFailed => EventKind::ReconnectFailed,
        }
    }
}

/// Shared listener callback.
pub type EventListener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Handle identifying one registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(ListenerId, EventListener)>>,
}

/// Publish/subscribe registry for [`ClientEvent`]s.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `kind`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(listener))
    }

    /// Register a shared listener. Adding the same `Arc` twice returns the
    /// existing registration instead of a duplicate.
    pub fn subscribe(&self, kind: EventKind, listener: EventListener) -> ListenerId {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        if let Some(existing) = inner.listeners.get(&kind).and_then(|list| {
            list.iter()
                .find(|(_, l)| Arc::ptr_eq(l, &listener))
                .map(|(id, _)| *id)
        }) {
            return existing;
        }
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.entry(kind).or_default().push((id, listener));
        id
    }

    /// Register a listener that fires at most once. The registration is
    /// removed before the user callback runs, so a listener that
    /// re-examines the bus never sees itself.
    pub fn once<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnOnce(&ClientEvent) + Send + 'static,
    {
        let slot: Arc<Mutex<Option<Box<dyn FnOnce(&ClientEvent) + Send>>>> =
            Arc::new(Mutex::new(Some(Box::new(listener))));
        let own_id: Arc<OnceLock<ListenerId>> = Arc::new(OnceLock::new());
        let bus = self.clone();
        let own_id_inner = Arc::clone(&own_id);
        let id = self.on(kind, move |event| {
            if let Some(id) = own_id_inner.get() {
                bus.off(kind, *id);
            }
            let taken = slot.lock().expect("once listener lock poisoned").take();
            if let Some(callback) = taken {
                callback(event);
            }
        });
        let _ = own_id.set(id);
        id
    }

    /// Remove one registration. Returns whether it was present.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        match inner.listeners.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|(listener_id, _)| *listener_id != id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Remove every listener for one event.
    pub fn remove_listeners(&self, kind: EventKind) {
        self.inner
            .lock()
            .expect("event bus lock poisoned")
            .listeners
            .remove(&kind);
    }

    /// Remove every listener for every event.
    pub fn clear(&self) {
        self.inner
            .lock()
            .expect("event bus lock poisoned")
            .listeners
            .clear();
    }

    /// Deliver `event` to the listeners registered at this moment.
    pub fn emit(&self, event: &ClientEvent) {
        let snapshot: Vec<EventListener> = {
            let inner = self.inner.lock().expect("event bus lock poisoned");
            inner
                .listeners
                .get(&event.kind())
                .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default()
        };
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(kind = ?event.kind(), "event listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn listeners_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let order = Arc::clone(&order);
            bus.on(EventKind::Open, move |_| order.lock().unwrap().push(tag));
        }
        bus.emit(&ClientEvent::Open);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn off_removes_a_single_registration() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        let id = bus.on(EventKind::Open, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(&ClientEvent::Open);
        assert!(bus.off(EventKind::Open, id));
        assert!(!bus.off(EventKind::Open, id));
        bus.emit(&ClientEvent::Open);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn once_fires_a_single_time() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        bus.once(EventKind::Reconnected, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(&ClientEvent::Reconnected);
        bus.emit(&ClientEvent::Reconnected);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_shared_listener_is_idempotent() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        let listener: EventListener = Arc::new(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        let first = bus.subscribe(EventKind::Open, Arc::clone(&listener));
        let second = bus.subscribe(EventKind::Open, listener);
        assert_eq!(first, second);
        bus.emit(&ClientEvent::Open);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_added_during_emit_misses_that_emit() {
        let bus = EventBus::new();
        let late_calls = Arc::new(AtomicU32::new(0));
        let bus2 = bus.clone();
        let late_calls2 = Arc::clone(&late_calls);
        bus.on(EventKind::Open, move |_| {
            let late_calls3 = Arc::clone(&late_calls2);
            bus2.on(EventKind::Open, move |_| {
                late_calls3.fetch_add(1, Ordering::SeqCst);
            });
        });
        bus.emit(&ClientEvent::Open);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        bus.emit(&ClientEvent::Open);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_delivery() {
        let bus = EventBus::new();
        let reached = Arc::new(AtomicU32::new(0));
        bus.on(EventKind::Error, |_| panic!("listener bug"));
        let reached2 = Arc::clone(&reached);
        bus.on(EventKind::Error, move |_| {
            reached2.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(&ClientEvent::Error {
            message: "x".into(),
        });
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        bus.on(EventKind::Close, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        bus.clear();
        bus.emit(&ClientEvent::Close {
            code: 1000,
            reason: String::new(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
