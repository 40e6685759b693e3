//! Simulation kernel: the authoritative block grid and every subsystem that
//! mutates it.
//!
//! # Invariants
//! - Grid dimensions never change after construction.
//! - All state mutations flow through explicit operations on [`World`].
//! - The render cache never contradicts the grid once the scheduler is
//!   settled; in between it may only lag.
//! - Identical seed and identical input sequence give identical grids.

pub mod config;
pub mod flood;
pub mod gravity;
pub mod grid;
pub mod lighting;
pub mod render_cache;
pub mod schedule;
pub mod water;
pub mod world;

pub use config::{
    ConfigError, GravityConfig, GridConfig, LaneConfig, LightingConfig, ScheduleConfig, SimConfig,
    WaterConfig,
};
pub use gravity::{FallProposal, SettleReport};
pub use grid::{Grid, GridError};
pub use lighting::{LightProposal, LightSweep};
pub use render_cache::{CellVisual, RenderCache};
pub use schedule::{
    AgingProposal, AnimationKind, CommitTarget, ScheduleReport, Scheduler, TaskVisual,
};
pub use water::WaterAutomaton;
pub use world::{TickReport, World, WorldEvent};
