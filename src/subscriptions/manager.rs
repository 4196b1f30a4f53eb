//! Subscription manager for broadcasting store changes.

use crate::types::Event;
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::types::{
    ChangeEvent, DropReason, EventSummary, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId,
};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<ChangeEvent>,
}

impl Subscription {
    /// Try to send a notification. Returns false if the buffer is full or the
    /// receiver is gone (subscriber will be dropped).
    fn try_send(&self, event: ChangeEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }

    /// Check if this subscription wants a change to `event`.
    fn matches_event(&self, event: &Event) -> bool {
        if !self.config.filter.include_event_changes {
            return false;
        }

        match self.config.filter.event_types {
            Some(ref types) => types.contains(&event.event_type),
            None => true,
        }
    }

    fn wants_filter_changes(&self) -> bool {
        self.config.filter.include_filter_changes
    }

    fn wants_lifecycle(&self) -> bool {
        self.config.filter.include_lifecycle
    }
}

/// Manages subscriptions and broadcasts change notifications.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        self.subscriptions
            .write()
            .insert(id, Subscription { config, sender });

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Best effort.
            let _ = sub.sender.try_send(ChangeEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    // --- Broadcasting ---

    pub fn broadcast_added(&self, event: &Event) {
        let change = ChangeEvent::Added {
            event: EventSummary::from_event(event),
        };
        self.broadcast(|sub| sub.matches_event(event), change);
    }

    /// Notify about an update. Subscribers restricted to event types hear it
    /// if either the old or the new type matches.
    pub fn broadcast_updated(&self, old: &Event, new: &Event) {
        let change = ChangeEvent::Updated {
            event: EventSummary::from_event(new),
        };
        self.broadcast(|sub| sub.matches_event(old) || sub.matches_event(new), change);
    }

    pub fn broadcast_removed(&self, event: &Event) {
        let change = ChangeEvent::Removed {
            event: EventSummary::from_event(event),
        };
        self.broadcast(|sub| sub.matches_event(event), change);
    }

    pub fn broadcast_filter_changed(&self) {
        self.broadcast(|sub| sub.wants_filter_changes(), ChangeEvent::FilterChanged);
    }

    pub fn broadcast_cleared(&self) {
        self.broadcast(|sub| sub.wants_lifecycle(), ChangeEvent::Cleared);
    }

    pub fn broadcast_imported(&self, count: usize) {
        self.broadcast(|sub| sub.wants_lifecycle(), ChangeEvent::Imported { count });
    }

    /// Internal broadcast helper. Drops subscribers that fail to receive.
    fn broadcast<F>(&self, filter: F, change: ChangeEvent)
    where
        F: Fn(&Subscription) -> bool,
    {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if filter(sub) && !sub.try_send(change.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    debug!(subscription = id.0, "dropping slow subscriber");
                    // The buffer is usually full here, so this rarely lands.
                    let _ = sub.sender.try_send(ChangeEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::SubscriptionFilter;
    use crate::types::{EventId, EventInput, EventType, Severity, Timestamp};
    use std::time::Duration;

    fn make_test_event(event_type: EventType) -> Event {
        EventInput::new(event_type, Severity::Low, "test").into_event(EventId(1), Timestamp(1))
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let manager = SubscriptionManager::new();

        let handle = manager.subscribe(SubscriptionConfig::default());
        assert_eq!(manager.subscription_count(), 1);

        manager.unsubscribe(handle.id);
        assert_eq!(manager.subscription_count(), 0);
        assert!(matches!(
            handle.try_recv(),
            Ok(ChangeEvent::Dropped {
                reason: DropReason::Unsubscribed
            })
        ));
    }

    #[test]
    fn test_broadcast_to_matching() {
        let manager = SubscriptionManager::new();
        let config = SubscriptionConfig {
            filter: SubscriptionFilter::event_types(vec![EventType::Error]),
            ..Default::default()
        };
        let handle = manager.subscribe(config);

        manager.broadcast_added(&make_test_event(EventType::Error));

        let change = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        match change {
            ChangeEvent::Added { event } => assert_eq!(event.event_type, EventType::Error),
            _ => panic!("Expected Added, got {:?}", change),
        }
    }

    #[test]
    fn test_broadcast_filters_non_matching() {
        let manager = SubscriptionManager::new();
        let config = SubscriptionConfig {
            filter: SubscriptionFilter::event_types(vec![EventType::Error]),
            ..Default::default()
        };
        let handle = manager.subscribe(config);

        manager.broadcast_added(&make_test_event(EventType::Info));
        manager.broadcast_filter_changed();
        manager.broadcast_cleared();

        assert!(handle.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_update_heard_when_type_leaves_selection() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::event_types(vec![EventType::Error]),
            ..Default::default()
        });

        let old = make_test_event(EventType::Error);
        let mut new = old.clone();
        new.event_type = EventType::Info;
        manager.broadcast_updated(&old, &new);

        assert_eq!(handle.drain().len(), 1);
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let manager = SubscriptionManager::new();
        let config = SubscriptionConfig {
            buffer_size: 2,
            filter: SubscriptionFilter::events(),
        };
        let _handle = manager.subscribe(config);

        for _ in 0..10 {
            manager.broadcast_added(&make_test_event(EventType::Info));
        }

        assert_eq!(manager.subscription_count(), 0);
    }

    #[test]
    fn test_disconnected_receiver_is_dropped() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig::default());
        drop(handle);

        manager.broadcast_cleared();

        assert_eq!(manager.subscription_count(), 0);
    }
}
