//! Core types for the event store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Microseconds in one hour (width of a time bucket).
pub const MICROS_PER_HOUR: i64 = 3_600_000_000;

/// Unique identifier for an event (assigned by the store).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt-{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }

    /// The hour this timestamp falls into.
    pub fn bucket(self) -> TimeBucket {
        TimeBucket(self.0.div_euclid(MICROS_PER_HOUR))
    }

    /// This timestamp moved back by `duration`, saturating at the minimum.
    pub fn saturating_sub(self, duration: Duration) -> Self {
        let micros = i64::try_from(duration.as_micros()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_sub(micros))
    }

    /// This timestamp moved forward by `duration`, saturating at the maximum.
    pub fn saturating_add(self, duration: Duration) -> Self {
        let micros = i64::try_from(duration.as_micros()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_add(micros))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A timestamp truncated to the hour (hours since Unix epoch).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeBucket(pub i64);

/// Source of creation timestamps.
///
/// The store never reads the system time directly so that hosts and tests can
/// control it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            micros: AtomicI64::new(start.0),
        }
    }

    pub fn set(&self, timestamp: Timestamp) {
        self.micros.store(timestamp.0, Ordering::SeqCst);
    }

    pub fn advance(&self, duration: Duration) {
        let next = self.now().saturating_add(duration);
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.micros.load(Ordering::SeqCst))
    }
}

/// Kind of event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Info,
    Warning,
    Error,
    Success,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::Info,
        EventType::Warning,
        EventType::Error,
        EventType::Success,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Info => "info",
            EventType::Warning => "warning",
            EventType::Error => "error",
            EventType::Success => "success",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgent an event is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event in the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier (assigned by store).
    pub id: EventId,

    #[serde(rename = "type")]
    pub event_type: EventType,

    pub severity: Severity,

    pub title: String,

    pub description: String,

    /// Originating subsystem.
    pub source: String,

    /// When the event was created (assigned by store).
    pub timestamp: Timestamp,

    #[serde(default)]
    pub acknowledged: bool,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Event {
    /// Apply a patch in place.
    pub fn apply(&mut self, patch: &EventPatch) {
        if let Some(event_type) = patch.event_type {
            self.event_type = event_type;
        }
        if let Some(severity) = patch.severity {
            self.severity = severity;
        }
        if let Some(ref title) = patch.title {
            self.title = title.clone();
        }
        if let Some(ref description) = patch.description {
            self.description = description.clone();
        }
        if let Some(ref source) = patch.source {
            self.source = source.clone();
        }
        if let Some(acknowledged) = patch.acknowledged {
            self.acknowledged = acknowledged;
        }
        if let Some(ref tags) = patch.tags {
            self.tags = tags.clone();
        }
        if let Some(ref metadata) = patch.metadata {
            self.metadata = metadata.clone();
        }
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = timestamp;
        }
    }
}

/// Input for creating a new event (before id/timestamp assigned).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventInput {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub source: String,
    #[serde(default)]
    pub acknowledged: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl EventInput {
    /// Create an input with empty free text.
    pub fn new(event_type: EventType, severity: Severity, source: impl Into<String>) -> Self {
        Self {
            event_type,
            severity,
            title: String::new(),
            description: String::new(),
            source: source.into(),
            acknowledged: None,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_acknowledged(mut self, acknowledged: bool) -> Self {
        self.acknowledged = Some(acknowledged);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Turn the input into an event with the given identity.
    pub fn into_event(self, id: EventId, timestamp: Timestamp) -> Event {
        Event {
            id,
            event_type: self.event_type,
            severity: self.severity,
            title: self.title,
            description: self.description,
            source: self.source,
            timestamp,
            acknowledged: self.acknowledged.unwrap_or(false),
            tags: self.tags,
            metadata: self.metadata,
        }
    }
}

/// The fields an update may change.
///
/// `id` is deliberately absent. `timestamp` may be corrected, which moves the
/// event to another time bucket.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default, rename = "type")]
    pub event_type: Option<EventType>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub acknowledged: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl EventPatch {
    /// A patch that only marks the event acknowledged.
    pub fn acknowledge() -> Self {
        Self {
            acknowledged: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_bucket_truncates_to_hour() {
        let ts = Timestamp(2 * MICROS_PER_HOUR + 59 * 60 * 1_000_000);
        assert_eq!(ts.bucket(), TimeBucket(2));
        assert_eq!(Timestamp(2 * MICROS_PER_HOUR).bucket(), TimeBucket(2));
    }

    #[test]
    fn test_time_bucket_before_epoch() {
        assert_eq!(Timestamp(-1).bucket(), TimeBucket(-1));
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(Timestamp(1_000));
        clock.advance(Duration::from_millis(2));
        assert_eq!(clock.now(), Timestamp(3_000));
    }

    #[test]
    fn test_input_defaults_to_unacknowledged() {
        let event = EventInput::new(EventType::Error, Severity::High, "db")
            .with_title("down")
            .into_event(EventId(7), Timestamp(5));

        assert_eq!(event.id, EventId(7));
        assert!(!event.acknowledged);
        assert_eq!(event.title, "down");
    }

    #[test]
    fn test_patch_leaves_unset_fields() {
        let mut event = EventInput::new(EventType::Info, Severity::Low, "auth")
            .with_title("login")
            .into_event(EventId(1), Timestamp(10));

        event.apply(&EventPatch {
            severity: Some(Severity::Critical),
            timestamp: Some(Timestamp(20)),
            ..Default::default()
        });

        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.timestamp, Timestamp(20));
        assert_eq!(event.title, "login");
        assert_eq!(event.event_type, EventType::Info);
    }

    #[test]
    fn test_event_json_field_names() {
        let event = EventInput::new(EventType::Warning, Severity::Medium, "k8s")
            .into_event(EventId(3), Timestamp(42));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "warning");
        assert_eq!(json["severity"], "medium");
        assert_eq!(json["id"], 3);
        assert_eq!(json["timestamp"], 42);
    }
}
