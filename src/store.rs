//! Main EventStore struct tying all components together.

use crate::error::Result;
use crate::events::{EventCollection, EventIndex, IdSet};
use crate::export::{self, ExportFormat};
use crate::filter::{self, EventFilter, FilterUpdate};
use crate::snapshot::Snapshot;
use crate::stats::EventStats;
use crate::subscriptions::{
    SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{Clock, Event, EventId, EventInput, EventPatch, EventType, SystemClock};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::debug;

/// Store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of live events; the oldest are evicted beyond it.
    /// `None` disables eviction.
    pub max_events: Option<usize>,

    /// Maximum number of events written to a snapshot.
    pub snapshot_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_events: Some(1000),
            snapshot_limit: 500,
        }
    }
}

/// The indexed event store.
///
/// Provides a unified interface for:
/// - Adding, updating, acknowledging and removing events
/// - Maintaining the secondary indices
/// - Serving the filtered, newest-first visible set and summary stats
/// - Exporting and importing bounded snapshots
///
/// Derived state (visible set, stats) is recomputed at the end of every
/// mutating call, so reads never walk the index. Mutation takes `&mut self`;
/// share a store between threads by putting it behind a single mutex.
pub struct EventStore {
    /// Store configuration.
    config: StoreConfig,

    /// Source of creation timestamps and of "now" for lookback windows.
    clock: Arc<dyn Clock>,

    /// Canonical records.
    events: EventCollection,

    /// Secondary indices over `events`.
    index: EventIndex,

    /// Active filter.
    filter: EventFilter,

    /// Ids matching `filter`, newest first.
    visible: Vec<EventId>,

    /// Counts over `events`.
    stats: EventStats,

    /// Change observers.
    subscriptions: SubscriptionManager,
}

impl EventStore {
    /// Create an empty store on the system clock.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an empty store on the given clock.
    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            events: EventCollection::new(),
            index: EventIndex::new(),
            filter: EventFilter::default(),
            visible: Vec::new(),
            stats: EventStats::default(),
            subscriptions: SubscriptionManager::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Event Operations ---

    /// Add one event, assigning its id and timestamp.
    pub fn add_event(&mut self, input: EventInput) -> Event {
        let event = self.events.insert(input, self.clock.now());
        self.index.on_insert(&event);
        debug!(id = event.id.0, source = %event.source, "event added");

        let evicted = self.enforce_capacity(&IdSet::from([event.id]));
        self.refresh();

        self.subscriptions.broadcast_added(&event);
        self.broadcast_evicted(&evicted);
        event
    }

    /// Add many events with one recompute at the end.
    ///
    /// Ids and timestamps are assigned in order, exactly as repeated
    /// `add_event` calls would. The batch is evicted last; only a batch larger
    /// than `max_events` loses its own oldest members.
    pub fn bulk_add_events(&mut self, inputs: Vec<EventInput>) -> Vec<EventId> {
        let mut added = Vec::with_capacity(inputs.len());
        for input in inputs {
            let event = self.events.insert(input, self.clock.now());
            self.index.on_insert(&event);
            added.push(event);
        }
        debug!(count = added.len(), "events bulk added");

        let fresh: IdSet = added.iter().map(|e| e.id).collect();
        let evicted = self.enforce_capacity(&fresh);
        self.refresh();

        for event in &added {
            self.subscriptions.broadcast_added(event);
        }
        self.broadcast_evicted(&evicted);
        added.into_iter().map(|e| e.id).collect()
    }

    /// Insert fully-formed events, e.g. a batch pulled from a producer.
    ///
    /// An event whose id is already live (or appeared earlier in the same
    /// batch) replaces it; the last write wins.
    pub fn upsert_events(&mut self, events: Vec<Event>) {
        let mut changes = Vec::with_capacity(events.len());
        for event in events {
            match self.events.put(event.clone()) {
                Some(old) => {
                    self.index.on_update(&old, &event);
                    changes.push((Some(old), event));
                }
                None => {
                    self.index.on_insert(&event);
                    changes.push((None, event));
                }
            }
        }
        debug!(count = changes.len(), "events upserted");

        let fresh: IdSet = changes.iter().map(|(_, e)| e.id).collect();
        let evicted = self.enforce_capacity(&fresh);
        self.refresh();

        for (old, new) in &changes {
            match old {
                Some(old) => self.subscriptions.broadcast_updated(old, new),
                None => self.subscriptions.broadcast_added(new),
            }
        }
        self.broadcast_evicted(&evicted);
    }

    /// Apply a patch to an event. Unknown ids are ignored.
    pub fn update_event(&mut self, id: EventId, patch: EventPatch) {
        let Some((old, new)) = self.events.update(id, &patch) else {
            return;
        };
        self.index.on_update(&old, &new);
        debug!(id = id.0, "event updated");

        self.refresh();
        self.subscriptions.broadcast_updated(&old, &new);
    }

    /// Mark an event acknowledged. Unknown ids are ignored.
    pub fn acknowledge_event(&mut self, id: EventId) {
        self.update_event(id, EventPatch::acknowledge());
    }

    /// Acknowledge several events with one recompute.
    pub fn acknowledge_events(&mut self, ids: impl IntoIterator<Item = EventId>) {
        let patch = EventPatch::acknowledge();
        let mut changes = Vec::new();
        for id in ids {
            if let Some((old, new)) = self.events.update(id, &patch) {
                self.index.on_update(&old, &new);
                changes.push((old, new));
            }
        }
        if changes.is_empty() {
            return;
        }
        debug!(count = changes.len(), "events acknowledged");

        self.refresh();
        for (old, new) in &changes {
            self.subscriptions.broadcast_updated(old, new);
        }
    }

    /// Remove an event. Unknown ids are ignored.
    pub fn remove_event(&mut self, id: EventId) {
        let Some(event) = self.events.remove(id) else {
            return;
        };
        self.index.on_delete(&event);
        debug!(id = id.0, "event removed");

        self.refresh();
        self.subscriptions.broadcast_removed(&event);
    }

    /// Drop every event. The filter is kept.
    pub fn clear_events(&mut self) {
        self.events.clear();
        self.index.clear();
        debug!("events cleared");

        self.refresh();
        self.subscriptions.broadcast_cleared();
    }

    // --- Filter Operations ---

    /// Merge a partial filter into the active one.
    pub fn set_filter(&mut self, update: FilterUpdate) {
        self.filter.merge(update);
        self.refresh_visible();
        self.subscriptions.broadcast_filter_changed();
    }

    /// Reset every selector to "any" and the lookback to unbounded.
    pub fn clear_filters(&mut self) {
        self.filter = EventFilter::default();
        self.refresh_visible();
        self.subscriptions.broadcast_filter_changed();
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Re-evaluate the visible set against the current clock.
    ///
    /// Only needed when a lookback window is active and time has passed
    /// without any mutation.
    pub fn refresh_visible(&mut self) {
        self.visible = filter::evaluate(&self.index, &self.filter, &self.events, self.clock.now());
    }

    // --- Reads ---

    /// Events matching the active filter, newest first.
    pub fn filtered_events(&self) -> Vec<&Event> {
        self.visible
            .iter()
            .filter_map(|id| self.events.get(*id))
            .collect()
    }

    /// Ids matching the active filter, newest first.
    pub fn visible_ids(&self) -> &[EventId] {
        &self.visible
    }

    pub fn unacknowledged_count(&self) -> usize {
        self.stats.unacknowledged
    }

    pub fn stats(&self) -> &EventStats {
        &self.stats
    }

    pub fn get_event(&self, id: EventId) -> Option<&Event> {
        self.events.get(id)
    }

    /// Events of one type, newest first, regardless of the active filter.
    pub fn events_by_type(&self, event_type: EventType) -> Vec<&Event> {
        let mut events: Vec<&Event> = self
            .index
            .by_type(event_type)
            .into_iter()
            .flatten()
            .filter_map(|id| self.events.get(*id))
            .collect();
        events.sort_unstable_by_key(|e| Reverse((e.timestamp, e.id)));
        events
    }

    /// Every live event, in no particular order.
    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter()
    }

    pub fn index(&self) -> &EventIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Render the visible set.
    pub fn export_visible(&self, format: ExportFormat) -> Result<String> {
        export::render(&self.filtered_events(), format)
    }

    // --- Snapshots ---

    /// Capture the filter and the most recent `snapshot_limit` events.
    pub fn export_snapshot(&self) -> Snapshot {
        let events: Vec<Event> = self
            .events
            .most_recent(self.config.snapshot_limit)
            .into_iter()
            .cloned()
            .collect();
        debug!(
            exported = events.len(),
            total = self.events.len(),
            "snapshot exported"
        );
        Snapshot::new(self.filter.clone(), events).with_next_id(self.events.next_id())
    }

    /// Replace all state with the contents of a snapshot.
    ///
    /// Indices are rebuilt from the records, never read from the snapshot.
    /// Later records win over earlier ones with the same id. The id counter
    /// resumes at the snapshot's `next_id` or above the highest imported id,
    /// whichever is larger, so ids dropped before export are never reissued.
    pub fn import_snapshot(&mut self, snapshot: Snapshot) {
        self.events.reset();
        for event in snapshot.events {
            self.events.put(event);
        }
        self.events.reserve_ids(snapshot.next_id);
        self.index = EventIndex::rebuild(self.events.iter());
        self.filter = snapshot.filter;

        let evicted = self.enforce_capacity(&IdSet::new());
        self.refresh();
        debug!(
            count = self.events.len(),
            evicted = evicted.len(),
            "snapshot imported"
        );

        self.subscriptions.broadcast_imported(self.events.len());
    }

    // --- Subscriptions ---

    /// Subscribe to change notifications.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    // --- Internals ---

    /// Recompute every piece of derived state.
    fn refresh(&mut self) {
        self.refresh_visible();
        self.stats = EventStats::compute(self.events.iter());
    }

    /// Evict the oldest events until the collection fits `max_events`.
    ///
    /// Events in `fresh` were written by the current call and go last.
    fn enforce_capacity(&mut self, fresh: &IdSet) -> Vec<Event> {
        let Some(max) = self.config.max_events else {
            return Vec::new();
        };
        let excess = self.events.len().saturating_sub(max);
        if excess == 0 {
            return Vec::new();
        }

        let doomed: Vec<EventId> = self
            .events
            .oldest(excess, fresh)
            .iter()
            .map(|e| e.id)
            .collect();
        let mut evicted = Vec::with_capacity(doomed.len());
        for id in doomed {
            if let Some(event) = self.events.remove(id) {
                self.index.on_delete(&event);
                evicted.push(event);
            }
        }
        debug!(count = evicted.len(), "events evicted");
        evicted
    }

    fn broadcast_evicted(&self, evicted: &[Event]) {
        for event in evicted {
            self.subscriptions.broadcast_removed(event);
        }
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
