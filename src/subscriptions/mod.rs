//! Change notifications for store observers.
//!
//! Every mutating store call finishes by broadcasting what changed:
//! - Events added, updated, or removed
//! - Filter configuration changes
//! - Bulk lifecycle changes (clear, snapshot import)
//!
//! Subscribers get a bounded buffer. A subscriber that falls behind is
//! dropped rather than slowing the store down.
//!
//! # Example
//!
//! ```ignore
//! let mut store = EventStore::new(StoreConfig::default());
//! let handle = store.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::event_types(vec![EventType::Error]),
//!     ..Default::default()
//! });
//!
//! for change in handle.drain() {
//!     match change {
//!         ChangeEvent::Added { event } => println!("new error from {}", event.source),
//!         ChangeEvent::Dropped { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    ChangeEvent, DropReason, EventSummary, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId,
};
