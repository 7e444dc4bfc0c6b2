//! In-process publish/subscribe hub
//!
//! Distributes lifecycle and completion events to downstream consumers
//! (notification formatters, webhook dispatchers, stats collectors). Publishing
//! is synchronous fan-out in subscription order; a failing subscriber is logged
//! and isolated so the remaining subscribers still receive the event.

use parking_lot::RwLock;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{MonitorEvent, SubscriptionId};

/// Callback signature for bus subscribers
///
/// Subscribers run on the publisher's task and must not block; hand the event
/// off to a channel or spawned task for anything slow.
pub type SubscriberFn = dyn Fn(&MonitorEvent) -> anyhow::Result<()> + Send + Sync;

struct Subscriber {
    id: SubscriptionId,
    name: String,
    callback: Arc<SubscriberFn>,
}

/// Synchronous-dispatch event bus
///
/// The fan-out set is captured at publish time, so a subscriber added or
/// removed mid-publish never sees a partial delivery and no subscriber receives
/// the same publish twice.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    published: AtomicU64,
}

impl EventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber under a diagnostic name
    ///
    /// Subscribers are invoked in registration order. Returns a token for
    /// [`EventBus::unsubscribe`].
    pub fn subscribe<F>(&self, name: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&MonitorEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let subscriber = Subscriber {
            id,
            name: name.into(),
            callback: Arc::new(callback),
        };
        self.subscribers.write().push(subscriber);
        id
    }

    /// Remove a subscriber; returns whether the token was known
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Number of currently registered subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Total number of events published since creation
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Deliver an event to every current subscriber
    ///
    /// A subscriber that returns an error or panics is logged and skipped;
    /// delivery continues with the remaining subscribers.
    pub fn publish(&self, event: &MonitorEvent) {
        let snapshot: Vec<(String, Arc<SubscriberFn>)> = self
            .subscribers
            .read()
            .iter()
            .map(|s| (s.name.clone(), Arc::clone(&s.callback)))
            .collect();

        self.published.fetch_add(1, Ordering::Relaxed);

        for (name, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::warn!("Event subscriber '{name}' failed: {e}");
                }
                Err(_) => {
                    log::warn!("Event subscriber '{name}' panicked; continuing fan-out");
                }
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("published", &self.published())
            .finish()
    }
}
