//! Shared value types for the tidefall world: cell coordinates, block
//! materials, and externally supplied protected regions.
//!
//! # Invariants
//! - A `Block` is either the `Air` sentinel or a `Solid` record; there is no
//!   third "empty object" state.
//! - For every finite-durability solid, `0 <= hp <= max_hp`.

mod block;
mod types;

pub use block::{Block, BlockType, Durability, Orientation, SolidBlock};
pub use types::{CellCoord, ProtectedRegion};
