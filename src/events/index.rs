//! Secondary indices for filtered lookups.
//!
//! Each dimension maps a value to the set of event ids currently holding it.
//! Buckets are created on first use and removed as soon as they empty, so
//! memory tracks the number of distinct live values.

use crate::types::{Event, EventId, EventType, Severity, TimeBucket};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Set of event ids sharing one dimension value.
pub type IdSet = HashSet<EventId>;

/// An indexed event attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    Type,
    Severity,
    Source,
    Acknowledged,
    TimeBucket,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Type,
        Dimension::Severity,
        Dimension::Source,
        Dimension::Acknowledged,
        Dimension::TimeBucket,
    ];
}

/// One value of one dimension, i.e. the key of a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DimensionValue {
    Type(EventType),
    Severity(Severity),
    Source(String),
    Acknowledged(bool),
    TimeBucket(TimeBucket),
}

impl DimensionValue {
    /// The value `event` holds for `dimension`.
    pub fn of(event: &Event, dimension: Dimension) -> Self {
        match dimension {
            Dimension::Type => DimensionValue::Type(event.event_type),
            Dimension::Severity => DimensionValue::Severity(event.severity),
            Dimension::Source => DimensionValue::Source(event.source.clone()),
            Dimension::Acknowledged => DimensionValue::Acknowledged(event.acknowledged),
            Dimension::TimeBucket => DimensionValue::TimeBucket(event.timestamp.bucket()),
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            DimensionValue::Type(_) => Dimension::Type,
            DimensionValue::Severity(_) => Dimension::Severity,
            DimensionValue::Source(_) => Dimension::Source,
            DimensionValue::Acknowledged(_) => Dimension::Acknowledged,
            DimensionValue::TimeBucket(_) => Dimension::TimeBucket,
        }
    }
}

/// Index over the five event dimensions.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventIndex {
    /// Event type to event IDs.
    by_type: HashMap<EventType, IdSet>,

    /// Severity to event IDs.
    by_severity: HashMap<Severity, IdSet>,

    /// Source tag to event IDs.
    by_source: HashMap<String, IdSet>,

    /// Acknowledged flag to event IDs.
    by_acknowledged: HashMap<bool, IdSet>,

    /// Hour bucket to event IDs.
    by_time_bucket: HashMap<TimeBucket, IdSet>,
}

impl EventIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from scratch by replaying inserts.
    pub fn rebuild<'a>(events: impl IntoIterator<Item = &'a Event>) -> Self {
        let mut index = Self::new();
        for event in events {
            index.on_insert(event);
        }
        index
    }

    /// Add an event to the bucket of every dimension.
    pub fn on_insert(&mut self, event: &Event) {
        let id = event.id;
        add_to(&mut self.by_type, event.event_type, id);
        add_to(&mut self.by_severity, event.severity, id);
        add_to(&mut self.by_source, event.source.clone(), id);
        add_to(&mut self.by_acknowledged, event.acknowledged, id);
        add_to(&mut self.by_time_bucket, event.timestamp.bucket(), id);
    }

    /// Remove an event from every dimension, dropping buckets that empty.
    ///
    /// `event` must be the state the index last saw for this id.
    pub fn on_delete(&mut self, event: &Event) {
        let id = event.id;
        remove_from(&mut self.by_type, &event.event_type, id);
        remove_from(&mut self.by_severity, &event.severity, id);
        remove_from(&mut self.by_source, &event.source, id);
        remove_from(&mut self.by_acknowledged, &event.acknowledged, id);
        remove_from(&mut self.by_time_bucket, &event.timestamp.bucket(), id);
    }

    /// Move an event from its old buckets to its new ones.
    ///
    /// Always a full delete followed by an insert. Any field may have changed,
    /// including the timestamp behind the time bucket.
    pub fn on_update(&mut self, old: &Event, new: &Event) {
        self.on_delete(old);
        self.on_insert(new);
    }

    /// Drop every bucket.
    pub fn clear(&mut self) {
        self.by_type.clear();
        self.by_severity.clear();
        self.by_source.clear();
        self.by_acknowledged.clear();
        self.by_time_bucket.clear();
    }

    pub fn by_type(&self, event_type: EventType) -> Option<&IdSet> {
        self.by_type.get(&event_type)
    }

    pub fn by_severity(&self, severity: Severity) -> Option<&IdSet> {
        self.by_severity.get(&severity)
    }

    pub fn by_source(&self, source: &str) -> Option<&IdSet> {
        self.by_source.get(source)
    }

    pub fn by_acknowledged(&self, acknowledged: bool) -> Option<&IdSet> {
        self.by_acknowledged.get(&acknowledged)
    }

    pub fn by_time_bucket(&self, bucket: TimeBucket) -> Option<&IdSet> {
        self.by_time_bucket.get(&bucket)
    }

    /// Look up any bucket.
    pub fn bucket(&self, value: &DimensionValue) -> Option<&IdSet> {
        match value {
            DimensionValue::Type(t) => self.by_type(*t),
            DimensionValue::Severity(s) => self.by_severity(*s),
            DimensionValue::Source(s) => self.by_source(s),
            DimensionValue::Acknowledged(a) => self.by_acknowledged(*a),
            DimensionValue::TimeBucket(b) => self.by_time_bucket(*b),
        }
    }

    /// Every bucket key of one dimension.
    pub fn values(&self, dimension: Dimension) -> Vec<DimensionValue> {
        match dimension {
            Dimension::Type => self.by_type.keys().map(|k| DimensionValue::Type(*k)).collect(),
            Dimension::Severity => self
                .by_severity
                .keys()
                .map(|k| DimensionValue::Severity(*k))
                .collect(),
            Dimension::Source => self
                .by_source
                .keys()
                .map(|k| DimensionValue::Source(k.clone()))
                .collect(),
            Dimension::Acknowledged => self
                .by_acknowledged
                .keys()
                .map(|k| DimensionValue::Acknowledged(*k))
                .collect(),
            Dimension::TimeBucket => self
                .by_time_bucket
                .keys()
                .map(|k| DimensionValue::TimeBucket(*k))
                .collect(),
        }
    }

    /// Every bucket that contains `id`, across all dimensions.
    pub fn locate(&self, id: EventId) -> Vec<DimensionValue> {
        Dimension::ALL
            .iter()
            .flat_map(|&d| self.values(d))
            .filter(|v| self.bucket(v).is_some_and(|set| set.contains(&id)))
            .collect()
    }

    /// Number of live buckets across all dimensions.
    pub fn bucket_count(&self) -> usize {
        self.by_type.len()
            + self.by_severity.len()
            + self.by_source.len()
            + self.by_acknowledged.len()
            + self.by_time_bucket.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bucket_count() == 0
    }
}

fn add_to<K: Hash + Eq>(map: &mut HashMap<K, IdSet>, key: K, id: EventId) {
    map.entry(key).or_default().insert(id);
}

fn remove_from<K: Hash + Eq>(map: &mut HashMap<K, IdSet>, key: &K, id: EventId) {
    if let Some(set) = map.get_mut(key) {
        set.remove(&id);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventInput, Timestamp, MICROS_PER_HOUR};

    fn event(id: u64, event_type: EventType, severity: Severity, source: &str) -> Event {
        EventInput::new(event_type, severity, source).into_event(EventId(id), Timestamp(0))
    }

    #[test]
    fn test_insert_populates_every_dimension() {
        let mut index = EventIndex::new();
        let e = event(1, EventType::Error, Severity::High, "db");

        index.on_insert(&e);

        assert!(index.by_type(EventType::Error).unwrap().contains(&e.id));
        assert!(index.by_severity(Severity::High).unwrap().contains(&e.id));
        assert!(index.by_source("db").unwrap().contains(&e.id));
        assert!(index.by_acknowledged(false).unwrap().contains(&e.id));
        assert!(index.by_time_bucket(TimeBucket(0)).unwrap().contains(&e.id));
        assert_eq!(index.locate(e.id).len(), 5);
    }

    #[test]
    fn test_delete_prunes_empty_buckets() {
        let mut index = EventIndex::new();
        let a = event(1, EventType::Error, Severity::High, "db");
        let b = event(2, EventType::Info, Severity::High, "db");
        index.on_insert(&a);
        index.on_insert(&b);

        index.on_delete(&a);

        assert!(index.by_type(EventType::Error).is_none());
        assert_eq!(index.by_severity(Severity::High).unwrap().len(), 1);
        assert!(index.locate(a.id).is_empty());

        index.on_delete(&b);
        assert!(index.is_empty());
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let mut index = EventIndex::new();
        let a = event(1, EventType::Error, Severity::High, "db");
        index.on_insert(&a);

        index.on_delete(&event(2, EventType::Success, Severity::Low, "other"));

        assert_eq!(index.locate(a.id).len(), 5);
        assert!(index.by_source("other").is_none());
    }

    #[test]
    fn test_update_moves_time_bucket() {
        let mut index = EventIndex::new();
        let old = event(1, EventType::Warning, Severity::Medium, "auth");
        let mut new = old.clone();
        new.timestamp = Timestamp(3 * MICROS_PER_HOUR);
        new.acknowledged = true;
        index.on_insert(&old);

        index.on_update(&old, &new);

        assert!(index.by_time_bucket(TimeBucket(0)).is_none());
        assert!(index.by_time_bucket(TimeBucket(3)).unwrap().contains(&new.id));
        assert!(index.by_acknowledged(false).is_none());
        assert!(index.by_acknowledged(true).unwrap().contains(&new.id));
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let events = vec![
            event(1, EventType::Error, Severity::High, "db"),
            event(2, EventType::Warning, Severity::Medium, "auth"),
            event(3, EventType::Info, Severity::Low, "db"),
        ];
        let mut incremental = EventIndex::new();
        for e in &events {
            incremental.on_insert(e);
        }

        assert_eq!(EventIndex::rebuild(&events), incremental);
        assert_eq!(incremental.by_source("db").unwrap().len(), 2);
    }
}
