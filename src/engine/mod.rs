//! Queue engine: pending requests, Idle/Busy state, and the drive loop.

mod cycle;
pub mod queue;

pub use queue::{Queue, State};
