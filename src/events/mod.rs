//! Event collection and its secondary indices.
//!
//! The collection owns the canonical record for every live event. The index
//! is derived from it and is patched on every insert, update, and delete.

mod collection;
mod index;

pub use collection::EventCollection;
pub use index::{Dimension, DimensionValue, EventIndex, IdSet};
