//! Callback registry, dispatcher, and the blocking response waiter.
//!
//! Consumers subscribe under a message key either with a [Handler], a
//! single-slot store with a condition variable for blocking waits, or with a
//! push callback. The scan loop dispatches every decoded record under its
//! key; keys nobody subscribed to are silently skipped.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::records::Record;

#[derive(Default)]
struct Slot {
    latest: Option<Record>,
    /// Bumped on every dispatch; lets `wait` tell a signal from a spurious
    /// wakeup.
    seq: u64,
}

/// A per-key single-slot signal and store.
///
/// Only the latest dispatched record is observable: two dispatches between
/// two `wait` calls collapse into one. `wait` is a level-triggered "something
/// new arrived" signal, not a queue.
#[derive(Default)]
pub struct Handler {
    slot: Mutex<Slot>,
    arrived: Condvar,
}

impl Handler {
    /// The most recent record dispatched to this handler, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Record> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .clone()
    }

    /// Block until a dispatch targets this handler or `timeout` elapses.
    /// Returns true if signaled. Always returns by the timeout; there is no
    /// retry loop.
    #[must_use]
    pub fn wait(&self, timeout: Duration) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = slot.seq;
        let (slot, _) = self
            .arrived
            .wait_timeout_while(slot, timeout, |s| s.seq == seq)
            .unwrap_or_else(PoisonError::into_inner);
        slot.seq != seq
    }

    // The slot is updated under the lock in one shot, so it is consistent
    // even when a previous holder panicked and poisoned the mutex.
    fn store(&self, record: &Record) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.latest = Some(record.clone());
        slot.seq += 1;
        self.arrived.notify_all();
    }
}

#[derive(Clone)]
enum Subscriber {
    Slot(Arc<Handler>),
    Push(Arc<dyn Fn(&Record) + Send + Sync>),
}

/// Multimap from message key to subscribers, in registration order.
///
/// The registry-wide lock guards the (rare, typically startup-time) list
/// mutation and the key lookup; it is not held while per-handler slots are
/// updated, so threads blocked in [`Handler::wait`] never contend with
/// registration.
#[derive(Default)]
pub struct CallbackRegistry {
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl CallbackRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot handler under `key` and return it.
    pub fn register(&self, key: &str) -> Arc<Handler> {
        let handler = Arc::new(Handler::default());
        let mut map = self.subscribers.lock().expect("registry lock poisoned");
        map.entry(key.to_string())
            .or_default()
            .push(Subscriber::Slot(Arc::clone(&handler)));
        debug!(key, "registered handler");
        handler
    }

    /// Append a push callback under `key`, invoked inline on every dispatch.
    pub fn register_fn<F>(&self, key: &str, f: F)
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        let mut map = self.subscribers.lock().expect("registry lock poisoned");
        map.entry(key.to_string())
            .or_default()
            .push(Subscriber::Push(Arc::new(f)));
        debug!(key, "registered callback");
    }

    /// Whether any subscriber is registered under `key`.
    #[must_use]
    pub fn has_subscribers(&self, key: &str) -> bool {
        self.subscribers
            .lock()
            .expect("registry lock poisoned")
            .get(key)
            .is_some_and(|subs| !subs.is_empty())
    }

    /// Deliver `record` to every subscriber under `key`, in registration
    /// order. A key with no subscribers is a silent no-op.
    pub fn dispatch(&self, key: &str, record: &Record) {
        let subs = {
            let map = self.subscribers.lock().expect("registry lock poisoned");
            match map.get(key) {
                Some(subs) => subs.clone(),
                None => return,
            }
        };
        for sub in &subs {
            match sub {
                Subscriber::Slot(handler) => handler.store(record),
                Subscriber::Push(f) => f(record),
            }
        }
    }
}
