//! Simulation tuning. Every struct deserializes with `#[serde(default)]` so a
//! config file only needs to name the values it overrides.

use serde::{Deserialize, Serialize};

/// Rejected configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub grid: GridConfig,
    pub gravity: GravityConfig,
    pub water: WaterConfig,
    pub lighting: LightingConfig,
    pub schedule: ScheduleConfig,
}

impl SimConfig {
    /// Check the values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.grid.cols == 0 || self.grid.rows == 0 {
            return invalid("grid dimensions must be positive");
        }
        if self.grid.water_level_row >= self.grid.rows {
            return invalid("water_level_row must lie inside the grid");
        }
        if self.water.batch_size == 0 {
            return invalid("water.batch_size must be positive");
        }
        if self.lighting.sweep_step == 0 {
            return invalid("lighting.sweep_step must be positive");
        }
        for (name, lane) in [
            ("fall", &self.schedule.fall),
            ("light", &self.schedule.light),
            ("aging", &self.schedule.aging),
        ] {
            if lane.queue_capacity == 0 || lane.max_active == 0 {
                return Err(ConfigError::Invalid(format!(
                    "schedule.{name} needs a positive queue_capacity and max_active"
                )));
            }
            if !lane.start_interval.is_finite() || !lane.duration.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "schedule.{name} timings must be finite"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cols: u32,
    pub rows: u32,
    /// Highest row (smallest index) water may occupy. Rows `>=` this are
    /// "at or below" sea level.
    pub water_level_row: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cols: 160,
            rows: 64,
            water_level_row: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityConfig {
    /// Bound on settlement passes per run. Reaching it is logged, not an error.
    pub max_passes: u32,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self { max_passes: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    /// Ticks between processed batches.
    pub interval_ticks: u32,
    /// Candidates processed per batch.
    pub batch_size: usize,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 3,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Rays per sweep position, spread over the downward half-circle.
    pub ray_count: u32,
    /// Maximum cells a ray may traverse, counted from the light source.
    pub max_ray_length: u32,
    /// Height of the light source above row 0, in cells.
    pub light_height: u32,
    /// Columns the light source advances per sweep step.
    pub sweep_step: u32,
    /// Ticks between incremental sweep steps during `update`. 0 disables.
    pub interval_ticks: u32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ray_count: 5,
            max_ray_length: 96,
            light_height: 8,
            sweep_step: 4,
            interval_ticks: 2,
        }
    }
}

/// Throttle for one kind of animated change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Proposals held before overflow is applied immediately.
    pub queue_capacity: usize,
    /// Seconds between animation starts.
    pub start_interval: f32,
    /// Animations allowed to run at once.
    pub max_active: usize,
    /// Seconds an animation runs once started.
    pub duration: f32,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 512,
            start_interval: 0.02,
            max_active: 24,
            duration: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub fall: LaneConfig,
    pub light: LaneConfig,
    pub aging: LaneConfig,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fall: LaneConfig::default(),
            light: LaneConfig {
                queue_capacity: 4096,
                start_interval: 0.005,
                max_active: 64,
                duration: 0.5,
            },
            aging: LaneConfig {
                queue_capacity: 256,
                start_interval: 0.05,
                max_active: 16,
                duration: 0.6,
            },
        }
    }
}
