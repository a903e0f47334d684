//! Change notification buses
//!
//! Every accepted `set` produces one [`ConfigChanged`] event, delivered first
//! to the store's own bus and then to the process-wide bus. Subscribers are
//! fire-and-forget: a panicking subscriber is caught and logged, and never
//! blocks other subscribers or the writer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::value::ConfigValue;

/// Immutable record of one configuration change
#[derive(Debug, Clone)]
pub struct ConfigChanged {
    /// The mod whose store changed
    pub mod_id: String,
    /// Name of the changed key
    pub key: String,
    /// The newly stored value
    pub value: ConfigValue,
    /// Caller-supplied free-text label describing the cause
    pub cause: Option<String>,
    /// When the change was applied
    pub at: DateTime<Utc>,
}

/// Revocable handle for one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&ConfigChanged) + Send + Sync>;

/// Multi-subscriber change notification channel
///
/// Subscribe/unsubscribe are safe concurrently with event delivery; delivery
/// itself runs outside the subscriber-list lock, so a subscriber may manage
/// subscriptions from inside its callback.
pub struct EventBus {
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber; keep the returned id to unsubscribe
    pub fn subscribe(&self, subscriber: impl Fn(&ConfigChanged) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(subscriber)));
        id
    }

    /// Remove a subscription; returns whether it was still registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(held, _)| *held != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver `event` to every subscriber registered at call time
    pub fn emit(&self, event: &ConfigChanged) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();

        for subscriber in subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(event))).is_err() {
                tracing::warn!(
                    mod_id = %event.mod_id,
                    key = %event.key,
                    "configuration subscriber panicked; continuing delivery"
                );
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_BUS: Lazy<EventBus> = Lazy::new(EventBus::new);

/// The process-wide bus receiving every store's events
pub fn global_bus() -> &'static EventBus {
    &GLOBAL_BUS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn event() -> ConfigChanged {
        ConfigChanged {
            mod_id: "test-mod".to_string(),
            key: "k".to_string(),
            value: ConfigValue::Bool(true),
            cause: None,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_all_subscribers_notified() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            bus.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(&event());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits2 = Arc::clone(&hits);
        let id = bus.subscribe(move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&event());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&event());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_subscriber_does_not_stop_others() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.subscribe(|_| panic!("bad subscriber"));
        let hits2 = Arc::clone(&hits);
        bus.subscribe(move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&event());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
