//! Indexed filter evaluation.

use crate::events::{EventCollection, EventIndex, IdSet};
use crate::filter::types::EventFilter;
use crate::types::{EventId, Timestamp};
use std::borrow::Cow;
use std::cmp::Reverse;
use tracing::trace;

/// Compute the visible set: ids of events matching `filter`, newest first.
///
/// Discrete selectors are answered from index buckets. The lookback window is
/// not bucketed and costs one scan of the collection. Events with equal
/// timestamps are ordered by descending id.
pub fn evaluate(
    index: &EventIndex,
    filter: &EventFilter,
    events: &EventCollection,
    now: Timestamp,
) -> Vec<EventId> {
    let ids = match candidate_ids(index, filter, events, now) {
        Some(ids) => ids,
        None => return Vec::new(),
    };

    let mut visible: Vec<(Timestamp, EventId)> = ids
        .into_iter()
        .filter_map(|id| events.get(id).map(|e| (e.timestamp, id)))
        .collect();
    visible.sort_unstable_by_key(|&key| Reverse(key));

    trace!(
        visible = visible.len(),
        total = events.len(),
        "filter evaluated"
    );

    visible.into_iter().map(|(_, id)| id).collect()
}

/// Unordered ids matching the filter, or `None` when some applied filter has
/// no members at all.
fn candidate_ids(
    index: &EventIndex,
    filter: &EventFilter,
    events: &EventCollection,
    now: Timestamp,
) -> Option<Vec<EventId>> {
    let mut sets: Vec<Cow<'_, IdSet>> = Vec::new();

    if let Some(event_type) = filter.event_type.value() {
        sets.push(Cow::Borrowed(index.by_type(*event_type)?));
    }
    if let Some(severity) = filter.severity.value() {
        sets.push(Cow::Borrowed(index.by_severity(*severity)?));
    }
    if let Some(source) = filter.source.value() {
        sets.push(Cow::Borrowed(index.by_source(source)?));
    }
    if let Some(acknowledged) = filter.acknowledged.value() {
        sets.push(Cow::Borrowed(index.by_acknowledged(*acknowledged)?));
    }

    if let Some(cutoff) = filter.lookback.cutoff(now) {
        let recent: IdSet = events
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .map(|e| e.id)
            .collect();
        if recent.is_empty() {
            return None;
        }
        sets.push(Cow::Owned(recent));
    }

    if sets.is_empty() {
        return Some(events.ids().collect());
    }

    // Smallest first keeps every intermediate result small.
    sets.sort_by_key(|s| s.len());
    let mut sets = sets.into_iter();
    let mut result = sets.next()?.into_owned();
    for set in sets {
        if result.is_empty() {
            break;
        }
        result = intersect(&result, &set);
    }

    Some(result.into_iter().collect())
}

/// Intersect two id sets by walking the smaller and probing the larger.
pub fn intersect(a: &IdSet, b: &IdSet) -> IdSet {
    let (smaller, larger) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    smaller
        .iter()
        .filter(|id| larger.contains(id))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::{FilterUpdate, Lookback, Selector};
    use crate::types::{EventInput, EventType, Severity, MICROS_PER_HOUR};

    fn populate() -> (EventCollection, EventIndex) {
        let mut events = EventCollection::new();
        let mut index = EventIndex::new();
        let inputs = [
            (EventType::Error, Severity::High, "db", 1),
            (EventType::Warning, Severity::Medium, "auth", 2),
            (EventType::Info, Severity::Low, "db", 3),
        ];
        for (event_type, severity, source, hour) in inputs {
            let event = events.insert(
                EventInput::new(event_type, severity, source),
                Timestamp(hour * MICROS_PER_HOUR),
            );
            index.on_insert(&event);
        }
        (events, index)
    }

    fn run(update: FilterUpdate) -> Vec<EventId> {
        let (events, index) = populate();
        let mut filter = EventFilter::default();
        filter.merge(update);
        evaluate(&index, &filter, &events, Timestamp(4 * MICROS_PER_HOUR))
    }

    #[test]
    fn test_no_filter_returns_all_newest_first() {
        assert_eq!(run(FilterUpdate::new()), vec![EventId(3), EventId(2), EventId(1)]);
    }

    #[test]
    fn test_single_dimension() {
        assert_eq!(run(FilterUpdate::new().event_type(EventType::Error)), vec![EventId(1)]);
        assert_eq!(run(FilterUpdate::new().source("db")), vec![EventId(3), EventId(1)]);
    }

    #[test]
    fn test_intersection_of_dimensions() {
        let ids = run(FilterUpdate::new().source("db").severity(Severity::Low));
        assert_eq!(ids, vec![EventId(3)]);

        let ids = run(FilterUpdate::new().source("auth").event_type(EventType::Error));
        assert!(ids.is_empty());
    }

    #[test]
    fn test_missing_bucket_short_circuits() {
        assert!(run(FilterUpdate::new().source("nowhere")).is_empty());
        assert!(run(FilterUpdate::new().event_type(EventType::Success)).is_empty());
        assert!(run(FilterUpdate::new().acknowledged(true)).is_empty());
    }

    #[test]
    fn test_lookback_window() {
        let ids = run(FilterUpdate::new().lookback(Lookback::hours(2)));
        assert_eq!(ids, vec![EventId(3), EventId(2)]);

        let ids = run(
            FilterUpdate::new()
                .lookback(Lookback::hours(2))
                .source("db"),
        );
        assert_eq!(ids, vec![EventId(3)]);
    }

    #[test]
    fn test_empty_lookback_returns_nothing() {
        let (events, index) = populate();
        let filter = EventFilter {
            lookback: Lookback::hours(1),
            ..Default::default()
        };
        let now = Timestamp(100 * MICROS_PER_HOUR);
        assert!(evaluate(&index, &filter, &events, now).is_empty());
    }

    #[test]
    fn test_agrees_with_linear_scan() {
        let (events, index) = populate();
        let now = Timestamp(4 * MICROS_PER_HOUR);
        let filter = EventFilter {
            acknowledged: Selector::Only(false),
            severity: Selector::Only(Severity::Medium),
            ..Default::default()
        };

        let indexed = evaluate(&index, &filter, &events, now);
        let scanned: Vec<EventId> = events
            .iter()
            .filter(|e| filter.matches(e, now))
            .map(|e| e.id)
            .collect();

        assert_eq!(indexed, scanned);
    }

    #[test]
    fn test_intersect_is_symmetric() {
        let a: IdSet = [1, 2, 3, 4].into_iter().map(EventId).collect();
        let b: IdSet = [3, 4, 5].into_iter().map(EventId).collect();

        let expected: IdSet = [3, 4].into_iter().map(EventId).collect();
        assert_eq!(intersect(&a, &b), expected);
        assert_eq!(intersect(&b, &a), expected);
    }
}
