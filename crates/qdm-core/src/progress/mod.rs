//! Live download metrics: per-task mutable state, immutable snapshots, a
//! TOTAL aggregator, and the terminal renderer.

mod aggregate;
mod render;
mod snapshot;
mod state;

pub use aggregate::ProgressAggregator;
pub use render::ProgressRenderer;
pub use snapshot::{ProgressPhase, ProgressSnapshot};
pub use state::ProgressState;
