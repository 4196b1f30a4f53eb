//! Canonical event records keyed by id.

use crate::events::IdSet;
use crate::types::{Event, EventId, EventInput, EventPatch, Timestamp};
use std::cmp::Reverse;
use std::collections::HashMap;

/// Owns every live event.
#[derive(Debug)]
pub struct EventCollection {
    events: HashMap<EventId, Event>,

    /// Next id to hand out.
    next_id: u64,
}

impl EventCollection {
    pub fn new() -> Self {
        Self {
            events: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new event, assigning its id and timestamp.
    pub fn insert(&mut self, input: EventInput, timestamp: Timestamp) -> Event {
        let id = self.allocate_id();
        let event = input.into_event(id, timestamp);
        self.events.insert(id, event.clone());
        event
    }

    /// Insert a fully-formed event, replacing any event with the same id.
    ///
    /// Returns the replaced event.
    pub fn put(&mut self, event: Event) -> Option<Event> {
        self.next_id = self.next_id.max(event.id.0.saturating_add(1));
        self.events.insert(event.id, event)
    }

    /// Apply a patch. Returns the event before and after, or `None` if the id
    /// is unknown.
    pub fn update(&mut self, id: EventId, patch: &EventPatch) -> Option<(Event, Event)> {
        let event = self.events.get_mut(&id)?;
        let old = event.clone();
        event.apply(patch);
        Some((old, event.clone()))
    }

    pub fn remove(&mut self, id: EventId) -> Option<Event> {
        self.events.remove(&id)
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.events.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = EventId> + '_ {
        self.events.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop every event. The id counter keeps running so ids are never reused.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Drop every event and restart the id counter.
    pub fn reset(&mut self) {
        self.events.clear();
        self.next_id = 1;
    }

    /// The id the next insert will receive.
    pub fn next_id(&self) -> EventId {
        EventId(self.next_id)
    }

    /// Never hand out an id below `next_id`.
    pub fn reserve_ids(&mut self, next_id: EventId) {
        self.next_id = self.next_id.max(next_id.0);
    }

    /// Up to `limit` events, oldest first (ties broken by lower id).
    ///
    /// Events in `keep` come after every other event whatever their age.
    pub fn oldest(&self, limit: usize, keep: &IdSet) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.values().collect();
        events.sort_unstable_by_key(|e| (keep.contains(&e.id), e.timestamp, e.id));
        events.truncate(limit);
        events
    }

    /// Up to `limit` events, newest first (ties broken by higher id).
    pub fn most_recent(&self, limit: usize) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.values().collect();
        events.sort_unstable_by_key(|e| Reverse((e.timestamp, e.id)));
        events.truncate(limit);
        events
    }

    fn allocate_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl Default for EventCollection {
    fn default() -> Self {
        Self::new()
    }
}
