//! Subscription manager: replay-latest broadcast to any number of subscribers.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use super::types::{DropReason, StreamEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};

/// Internal subscription state.
struct Subscription<T> {
    sender: Sender<T>,
    /// Second end of the subscriber's channel, used to evict stale events.
    evict: Receiver<T>,
    /// Dead once the subscriber's handle is dropped.
    alive: Weak<()>,
}

impl<T: StreamEvent> Subscription<T> {
    /// Deliver an event, discarding the oldest pending one if the buffer is
    /// full. Returns false if the subscriber is gone.
    fn deliver(&self, mut event: T) -> bool {
        if self.alive.strong_count() == 0 {
            return false;
        }
        // Only the registry lock holder sends, so one eviction frees a slot.
        loop {
            match self.sender.try_send(event) {
                Ok(()) => return true,
                Err(TrySendError::Full(rejected)) => {
                    trace!("subscriber behind, conflating pending event");
                    let _ = self.evict.try_recv();
                    event = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }

    /// Notify the subscriber that it is being removed.
    fn notify_dropped(&self, reason: DropReason) {
        if let Some(event) = T::dropped(reason) {
            self.deliver(event);
        }
    }
}

struct Registry<T> {
    subscriptions: HashMap<SubscriptionId, Subscription<T>>,
    /// Most recently published value, replayed to new subscribers.
    latest: Option<T>,
}

/// Broadcasts events to subscribers and caches the latest value.
///
/// Subscribing and publishing happen under the same lock, so a new
/// subscriber sees either the replayed value or the live one, never neither.
/// A subscriber that stops reading is never dropped: once its buffer is full
/// the oldest pending event makes room for the newest.
pub struct SubscriptionManager<T> {
    registry: RwLock<Registry<T>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    config: SubscriptionConfig,
}

impl<T: StreamEvent> SubscriptionManager<T> {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self::with_config(SubscriptionConfig::default())
    }

    /// Create a new subscription manager with custom config.
    pub fn with_config(config: SubscriptionConfig) -> Self {
        Self {
            registry: RwLock::new(Registry {
                subscriptions: HashMap::new(),
                latest: None,
            }),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Create a new subscription, replaying the latest value if there is one.
    pub fn subscribe(&self) -> SubscriptionHandle<T> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.config.buffer_size.max(1));
        let alive = Arc::new(());
        let subscription = Subscription {
            sender,
            evict: receiver.clone(),
            alive: Arc::downgrade(&alive),
        };

        let mut registry = self.registry.write();
        if self.config.replay_latest {
            if let Some(latest) = &registry.latest {
                subscription.deliver(latest.clone());
            }
        }
        registry.subscriptions.insert(id, subscription);
        debug!(subscription = id.0, "subscriber attached");

        SubscriptionHandle {
            id,
            receiver,
            _alive: alive,
        }
    }

    /// Unsubscribe and clean up. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.write().subscriptions.remove(&id);
        if let Some(sub) = &removed {
            sub.notify_dropped(DropReason::Unsubscribed);
            debug!(subscription = id.0, "subscriber detached");
        }
        removed.is_some()
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.registry.read().subscriptions.len()
    }

    /// The value new subscribers would be replayed.
    pub fn latest(&self) -> Option<T> {
        self.registry.read().latest.clone()
    }

    /// Forget the cached value.
    pub fn clear_latest(&self) {
        self.registry.write().latest = None;
    }

    // --- Broadcasting ---

    /// Cache `value` as the latest and broadcast it.
    ///
    /// Returns the number of subscribers left after ones whose handle is gone
    /// were pruned.
    pub fn publish(&self, value: T) -> usize {
        let mut registry = self.registry.write();
        registry.latest = Some(value.clone());

        let mut gone = Vec::new();
        for (id, sub) in registry.subscriptions.iter() {
            if !sub.deliver(value.clone()) {
                gone.push(*id);
            }
        }
        for id in gone {
            registry.subscriptions.remove(&id);
            debug!(subscription = id.0, "pruned subscriber whose handle was dropped");
        }

        registry.subscriptions.len()
    }

    /// Remove every subscriber, sending each a final event first.
    ///
    /// The final event is `last` if given, otherwise a drop notice for
    /// `reason`. It is always delivered, displacing a pending event if the
    /// buffer is full. Returns how many subscribers were removed.
    pub fn close_all(&self, last: Option<T>, reason: DropReason) -> usize {
        let drained: Vec<_> = self.registry.write().subscriptions.drain().collect();
        for (_, sub) in &drained {
            match &last {
                Some(event) => {
                    sub.deliver(event.clone());
                }
                None => sub.notify_dropped(reason.clone()),
            }
        }
        drained.len()
    }
}

impl<T: StreamEvent> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}
