//! World generation: noise terrain, YAML configuration, and the setup
//! pipeline that turns a seed into a settled, flooded, lit [`World`].
//!
//! [`World`]: tidefall_kernel::World

pub mod config;
pub mod setup;
pub mod terrain;

pub use config::{WorldConfig, WorldConfigError};
pub use setup::{SetupReport, build_world};
pub use terrain::{ColumnProfile, TerrainConfig, TerrainGenerator};
