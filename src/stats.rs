//! Summary counts over the whole collection.

use crate::types::{Event, EventType, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Store statistics.
///
/// Independent of the active filter. Only values that occur are present in
/// the per-type and per-severity maps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
    pub total: usize,
    pub by_type: BTreeMap<EventType, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    /// Events with `acknowledged == false`.
    pub unacknowledged: usize,
}

impl EventStats {
    /// Single pass over `events`.
    pub fn compute<'a>(events: impl IntoIterator<Item = &'a Event>) -> Self {
        let mut stats = Self::default();
        for event in events {
            stats.total += 1;
            *stats.by_type.entry(event.event_type).or_default() += 1;
            *stats.by_severity.entry(event.severity).or_default() += 1;
            if !event.acknowledged {
                stats.unacknowledged += 1;
            }
        }
        stats
    }

    pub fn count_of_type(&self, event_type: EventType) -> usize {
        self.by_type.get(&event_type).copied().unwrap_or(0)
    }

    pub fn count_of_severity(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }
}
