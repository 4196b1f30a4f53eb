//! # Event Index
//!
//! An in-memory store for operational events (alerts, status changes, audit
//! notes) that serves filtered, newest-first views with low-latency reads.
//!
//! ## Core Concepts
//!
//! - **Events**: Typed records with severity, source, timestamp and an
//!   acknowledged flag
//! - **Indices**: Per-dimension buckets of ids, patched on every mutation
//! - **Filters**: Discrete selectors answered by bucket intersection, plus a
//!   lookback window
//! - **Snapshots**: Bounded captures that rebuild indices on import
//!
//! ## Example
//!
//! ```ignore
//! use event_index::{EventInput, EventStore, EventType, FilterUpdate, Severity, StoreConfig};
//!
//! let mut store = EventStore::new(StoreConfig::default());
//!
//! let event = store.add_event(
//!     EventInput::new(EventType::Error, Severity::High, "database")
//!         .with_title("Database Connection Lost"),
//! );
//!
//! store.set_filter(FilterUpdate::new().source("database"));
//! assert_eq!(store.filtered_events().len(), 1);
//!
//! store.acknowledge_event(event.id);
//! assert_eq!(store.unacknowledged_count(), 0);
//!
//! // Persist and restore
//! let bytes = store.export_snapshot().to_bytes()?;
//! store.import_snapshot(Snapshot::from_bytes(&bytes)?);
//! ```

pub mod error;
pub mod events;
pub mod export;
pub mod filter;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{Result, StoreError};
pub use events::{Dimension, DimensionValue, EventCollection, EventIndex, IdSet};
pub use export::ExportFormat;
pub use filter::{EventFilter, FilterUpdate, Lookback, Selector};
pub use snapshot::Snapshot;
pub use stats::EventStats;
pub use store::{EventStore, StoreConfig};
pub use subscriptions::{
    ChangeEvent, DropReason, EventSummary, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
pub use types::*;
