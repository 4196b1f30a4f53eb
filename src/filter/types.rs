//! Filter configuration.

use crate::types::{Event, EventType, Severity, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A discrete selector on one dimension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector<T> {
    Any,
    Only(T),
}

impl<T> Default for Selector<T> {
    fn default() -> Self {
        Selector::Any
    }
}

impl<T: PartialEq> Selector<T> {
    pub fn is_any(&self) -> bool {
        matches!(self, Selector::Any)
    }

    /// The selected value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Selector::Any => None,
            Selector::Only(v) => Some(v),
        }
    }

    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Selector::Any => true,
            Selector::Only(v) => v == value,
        }
    }
}

/// How far back the time window reaches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookback {
    #[default]
    Unbounded,
    Within(Duration),
}

impl Lookback {
    /// Window of the given number of hours.
    pub fn hours(hours: u64) -> Self {
        Lookback::Within(Duration::from_secs(hours.saturating_mul(3600)))
    }

    /// Oldest timestamp still inside the window.
    pub fn cutoff(&self, now: Timestamp) -> Option<Timestamp> {
        match self {
            Lookback::Unbounded => None,
            Lookback::Within(window) => Some(now.saturating_sub(*window)),
        }
    }
}

/// Active filter configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default)]
    pub event_type: Selector<EventType>,
    #[serde(default)]
    pub severity: Selector<Severity>,
    #[serde(default)]
    pub source: Selector<String>,
    #[serde(default)]
    pub acknowledged: Selector<bool>,
    #[serde(default)]
    pub lookback: Lookback,
}

impl EventFilter {
    /// True when nothing is filtered out.
    pub fn is_unfiltered(&self) -> bool {
        *self == Self::default()
    }

    /// Apply a partial update. Unset fields keep their current value.
    pub fn merge(&mut self, update: FilterUpdate) {
        if let Some(event_type) = update.event_type {
            self.event_type = event_type;
        }
        if let Some(severity) = update.severity {
            self.severity = severity;
        }
        if let Some(source) = update.source {
            self.source = source;
        }
        if let Some(acknowledged) = update.acknowledged {
            self.acknowledged = acknowledged;
        }
        if let Some(lookback) = update.lookback {
            self.lookback = lookback;
        }
    }

    /// Linear predicate for a single event.
    ///
    /// The indexed evaluator must always agree with this.
    pub fn matches(&self, event: &Event, now: Timestamp) -> bool {
        self.event_type.accepts(&event.event_type)
            && self.severity.accepts(&event.severity)
            && self.source.accepts(&event.source)
            && self.acknowledged.accepts(&event.acknowledged)
            && self
                .lookback
                .cutoff(now)
                .map_or(true, |cutoff| event.timestamp >= cutoff)
    }
}

/// Partial filter, consumed by `EventStore::set_filter`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterUpdate {
    #[serde(default)]
    pub event_type: Option<Selector<EventType>>,
    #[serde(default)]
    pub severity: Option<Selector<Severity>>,
    #[serde(default)]
    pub source: Option<Selector<String>>,
    #[serde(default)]
    pub acknowledged: Option<Selector<bool>>,
    #[serde(default)]
    pub lookback: Option<Lookback>,
}

impl FilterUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, selector: impl Into<Selector<EventType>>) -> Self {
        self.event_type = Some(selector.into());
        self
    }

    pub fn severity(mut self, selector: impl Into<Selector<Severity>>) -> Self {
        self.severity = Some(selector.into());
        self
    }

    pub fn source(mut self, selector: impl Into<Selector<String>>) -> Self {
        self.source = Some(selector.into());
        self
    }

    pub fn acknowledged(mut self, selector: impl Into<Selector<bool>>) -> Self {
        self.acknowledged = Some(selector.into());
        self
    }

    pub fn lookback(mut self, lookback: Lookback) -> Self {
        self.lookback = Some(lookback);
        self
    }
}

impl From<EventType> for Selector<EventType> {
    fn from(value: EventType) -> Self {
        Selector::Only(value)
    }
}

impl From<Severity> for Selector<Severity> {
    fn from(value: Severity) -> Self {
        Selector::Only(value)
    }
}

impl From<&str> for Selector<String> {
    fn from(value: &str) -> Self {
        Selector::Only(value.to_string())
    }
}

impl From<String> for Selector<String> {
    fn from(value: String) -> Self {
        Selector::Only(value)
    }
}

impl From<bool> for Selector<bool> {
    fn from(value: bool) -> Self {
        Selector::Only(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, EventInput, MICROS_PER_HOUR};

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut filter = EventFilter::default();
        filter.merge(FilterUpdate::new().event_type(EventType::Error).source("db"));
        filter.merge(FilterUpdate::new().severity(Severity::High));

        assert_eq!(filter.event_type, Selector::Only(EventType::Error));
        assert_eq!(filter.source, Selector::Only("db".to_string()));
        assert_eq!(filter.severity, Selector::Only(Severity::High));
        assert!(filter.acknowledged.is_any());
    }

    #[test]
    fn test_merge_can_reset_to_any() {
        let mut filter = EventFilter::default();
        filter.merge(FilterUpdate::new().event_type(EventType::Error));
        filter.merge(FilterUpdate::new().event_type(Selector::Any));

        assert!(filter.is_unfiltered());
    }

    #[test]
    fn test_lookback_cutoff_is_inclusive() {
        let now = Timestamp(10 * MICROS_PER_HOUR);
        let filter = EventFilter {
            lookback: Lookback::hours(2),
            ..Default::default()
        };
        let on_edge = EventInput::new(EventType::Info, Severity::Low, "x")
            .into_event(EventId(1), Timestamp(8 * MICROS_PER_HOUR));
        let outside = EventInput::new(EventType::Info, Severity::Low, "x")
            .into_event(EventId(2), Timestamp(8 * MICROS_PER_HOUR - 1));

        assert!(filter.matches(&on_edge, now));
        assert!(!filter.matches(&outside, now));
    }

    #[test]
    fn test_filter_json_shape() {
        let filter = EventFilter {
            event_type: Selector::Only(EventType::Warning),
            ..Default::default()
        };
        let json = serde_json::to_value(&filter).unwrap();

        assert_eq!(json["event_type"]["only"], "warning");
        assert_eq!(json["severity"], "any");

        let back: EventFilter = serde_json::from_value(json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn test_huge_lookback_saturates() {
        let lookback = Lookback::hours(u64::MAX);

        assert_eq!(lookback, Lookback::Within(Duration::from_secs(u64::MAX)));
        assert_eq!(lookback.cutoff(Timestamp(0)), Some(Timestamp(-i64::MAX)));
    }
}
