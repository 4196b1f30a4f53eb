//! Subscription types for store change notifications.

use crate::types::{Event, EventType, Severity, Timestamp};
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered notifications before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Only notify about events of these types (None = all types).
    pub event_types: Option<Vec<EventType>>,

    /// Include added/updated/removed notifications.
    pub include_event_changes: bool,

    /// Include filter configuration changes.
    pub include_filter_changes: bool,

    /// Include bulk lifecycle notifications (cleared, imported).
    pub include_lifecycle: bool,
}

impl SubscriptionFilter {
    /// Subscribe to event changes of every type.
    pub fn events() -> Self {
        Self {
            include_event_changes: true,
            ..Default::default()
        }
    }

    /// Subscribe to event changes of specific types.
    pub fn event_types(types: Vec<EventType>) -> Self {
        Self {
            event_types: Some(types),
            include_event_changes: true,
            ..Default::default()
        }
    }

    /// Subscribe to filter changes.
    pub fn filter_changes() -> Self {
        Self {
            include_filter_changes: true,
            ..Default::default()
        }
    }

    /// Subscribe to everything.
    pub fn all() -> Self {
        Self {
            include_event_changes: true,
            include_filter_changes: true,
            include_lifecycle: true,
            ..Default::default()
        }
    }
}

/// Notifications emitted after a store mutation has been fully applied.
///
/// By the time a subscriber sees one, the visible set and stats already
/// reflect it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A new event was added.
    Added { event: EventSummary },

    /// An existing event changed.
    Updated { event: EventSummary },

    /// An event was removed (explicitly or by eviction).
    Removed { event: EventSummary },

    /// The filter configuration changed.
    FilterChanged,

    /// All events were dropped.
    Cleared,

    /// The store was rebuilt from a snapshot.
    Imported { count: usize },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// The indexed attributes of an event, without its free text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: u64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: Severity,
    pub source: String,
    pub timestamp: Timestamp,
    pub acknowledged: bool,
}

impl EventSummary {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id.0,
            event_type: event.event_type,
            severity: event.severity,
            source: event.source.clone(),
            timestamp: event.timestamp,
            acknowledged: event.acknowledged,
        }
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive notifications.
    pub receiver: crossbeam_channel::Receiver<ChangeEvent>,
}

impl SubscriptionHandle {
    /// Receive the next notification (blocking).
    pub fn recv(&self) -> Result<ChangeEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a notification (non-blocking).
    pub fn try_recv(&self) -> Result<ChangeEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<ChangeEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }
}
