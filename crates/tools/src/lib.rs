//! Developer tooling: read-only world inspection.
//!
//! # Invariants
//! - Tools never mutate the world.

mod inspector;

pub use inspector::{CellInfo, LaneStatus, WorldInspector, WorldSummary};
