use std::path::Path;

use serde::{Deserialize, Serialize};
use tidefall_kernel::{ConfigError, SimConfig};

use crate::terrain::TerrainConfig;

#[derive(Debug, thiserror::Error)]
pub enum WorldConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Everything needed to build a world: seed, simulation tuning and terrain
/// shape. Missing keys fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub seed: u64,
    pub sim: SimConfig,
    pub terrain: TerrainConfig,
}

impl WorldConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, WorldConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorldConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> Result<String, WorldConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sim.validate()?;
        let t = &self.terrain;
        if !(t.island_width.is_finite() && (0.0..=1.0).contains(&t.island_width)) {
            return Err(ConfigError::Invalid(
                "terrain.island_width must lie in [0, 1]".to_string(),
            ));
        }
        if !t.surface_amplitude.is_finite() || !t.dirt_amplitude.is_finite() {
            return Err(ConfigError::Invalid(
                "terrain amplitudes must be finite".to_string(),
            ));
        }
        if !t.noise_scale.is_finite() || t.noise_scale <= 0.0 {
            return Err(ConfigError::Invalid(
                "terrain.noise_scale must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
