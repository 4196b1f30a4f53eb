//! Filter configuration and the indexed evaluator that turns it into the
//! visible set.

mod evaluator;
mod types;

pub use evaluator::{evaluate, intersect};
pub use types::{EventFilter, FilterUpdate, Lookback, Selector};
