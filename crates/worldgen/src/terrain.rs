//! Tapered-island terrain.
//!
//! Rows grow downward, so a "higher" surface is a smaller row index. Every
//! depth in [`TerrainConfig`] is measured in rows relative to the water level.

use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};
use tidefall_common::{BlockType, CellCoord};
use tidefall_kernel::{Grid, GridConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Fraction of the world width covered by the island.
    pub island_width: f32,
    /// Rows between the water level and the island's mean surface.
    pub surface_height: u32,
    /// Peak deviation of the surface from its mean, in rows.
    pub surface_amplitude: f32,
    /// Mean thickness of the dirt layer above stone.
    pub dirt_depth: u32,
    /// Peak deviation of the dirt thickness, in rows.
    pub dirt_amplitude: f32,
    /// Noise frequency per column.
    pub noise_scale: f64,
    pub octaves: u32,
    /// Columns over which the island blends into its edge profile.
    pub taper_width: u32,
    /// Edge surface row, below the water level.
    pub edge_depth: u32,
    /// Ocean floor depth right next to the island.
    pub shallow_floor_depth: u32,
    /// Ocean floor depth far from the island.
    pub deep_floor_depth: u32,
    /// Columns over which the ocean floor drops from shallow to deep.
    pub ocean_taper: u32,
    /// Dirt/stone within this many cells of open water turns to sand.
    pub beach_radius: u32,
    /// Extra sand rows laid under each beach cell.
    pub sand_extension: u32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            island_width: 0.6,
            surface_height: 8,
            surface_amplitude: 5.0,
            dirt_depth: 4,
            dirt_amplitude: 2.0,
            noise_scale: 0.045,
            octaves: 4,
            taper_width: 14,
            edge_depth: 1,
            shallow_floor_depth: 3,
            deep_floor_depth: 20,
            ocean_taper: 24,
            beach_radius: 2,
            sand_extension: 3,
        }
    }
}

/// Per-column terrain profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnProfile {
    /// First non-air row.
    pub surface_row: i32,
    /// First stone row; dirt fills the rows in between.
    pub stone_row: i32,
    /// Island columns get a grass top, ocean floor does not.
    pub island: bool,
}

/// Seeded terrain generator. The same seed and config always produce the
/// same grid.
pub struct TerrainGenerator {
    config: TerrainConfig,
    surface_noise: Perlin,
    dirt_noise: Perlin,
}

impl TerrainGenerator {
    pub fn new(config: TerrainConfig, seed: u64) -> Self {
        let seed = (seed as u32) ^ ((seed >> 32) as u32);
        Self {
            config,
            surface_noise: Perlin::new(seed),
            dirt_noise: Perlin::new(seed.wrapping_add(1)),
        }
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    fn sample_fbm(&self, noise: &Perlin, x: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.config.noise_scale;
        let mut max_value = 0.0;
        for _ in 0..self.config.octaves.max(1) {
            // Second coordinate keeps Perlin off its integer-lattice zeros.
            total += noise.get([x * frequency, 0.37]) * amplitude;
            max_value += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        total / max_value
    }

    /// Column range `[start, end)` occupied by the island.
    pub fn island_span(&self, cols: u32) -> (i32, i32) {
        let width = (cols as f32 * self.config.island_width.clamp(0.0, 1.0)).round() as i32;
        let start = (cols as i32 - width) / 2;
        (start, start + width)
    }

    /// Surface and stone rows for one column.
    pub fn column_profile(&self, col: i32, cols: u32, rows: u32, water_row: i32) -> ColumnProfile {
        let c = &self.config;
        let floor = rows as i32 - 1;
        let (start, end) = self.island_span(cols);

        let profile = if col >= start && col < end {
            let x = col as f64;
            let surface = water_row as f32 - c.surface_height as f32
                + self.sample_fbm(&self.surface_noise, x) as f32 * c.surface_amplitude;
            let stone = surface
                + c.dirt_depth as f32
                + self.sample_fbm(&self.dirt_noise, x) as f32 * c.dirt_amplitude;

            let edge_surface = (water_row + c.edge_depth as i32) as f32;
            let edge_stone = edge_surface + c.dirt_depth as f32;
            let to_edge = (col - start).min(end - 1 - col) as f32;
            let taper = c.taper_width.max(1) as f32;
            let (surface, stone) = if to_edge < taper {
                let t = to_edge / taper;
                (lerp(edge_surface, surface, t), lerp(edge_stone, stone, t))
            } else {
                (surface, stone)
            };
            ColumnProfile {
                surface_row: surface.round() as i32,
                stone_row: stone.round().max(surface.round() + 1.0) as i32,
                island: true,
            }
        } else {
            let from_island = if col < start { start - col } else { col - end + 1 };
            let t = (from_island as f32 / c.ocean_taper.max(1) as f32).min(1.0);
            let depth = lerp(c.shallow_floor_depth as f32, c.deep_floor_depth as f32, t);
            let surface = water_row + depth.round() as i32;
            ColumnProfile {
                surface_row: surface,
                stone_row: surface + 2,
                island: false,
            }
        };

        ColumnProfile {
            surface_row: profile.surface_row.clamp(0, floor),
            stone_row: profile.stone_row.clamp(0, floor),
            island: profile.island,
        }
    }

    /// Build the grid. Everything above the terrain is left as air for the
    /// ocean flood fill.
    pub fn generate(&self, grid_config: &GridConfig) -> Grid {
        let _span = tracing::info_span!(
            "generate_terrain",
            cols = grid_config.cols,
            rows = grid_config.rows
        )
        .entered();
        let mut grid = Grid::new(grid_config.cols, grid_config.rows);
        let water_row = grid_config.water_level_row as i32;

        for col in 0..grid_config.cols as i32 {
            let profile = self.column_profile(col, grid_config.cols, grid_config.rows, water_row);
            for row in profile.surface_row..grid_config.rows as i32 {
                let kind = if row >= profile.stone_row {
                    BlockType::Stone
                } else if row == profile.surface_row && profile.island && row < water_row {
                    BlockType::Grass
                } else {
                    BlockType::Dirt
                };
                if let Err(err) = grid.set(CellCoord::new(col, row), kind, false) {
                    tracing::warn!(%err, "terrain cell skipped");
                }
            }
        }

        let sand = self.lay_beaches(&mut grid, water_row);
        tracing::debug!(sand, "terrain generated");
        grid
    }

    /// Turn dirt, grass and stone near open water into sand, then extend each
    /// beach column downward. Returns the number of cells converted.
    fn lay_beaches(&self, grid: &mut Grid, water_row: i32) -> usize {
        let radius = self.config.beach_radius as i32;
        // Open water is any air cell the flood fill will reach: at or below
        // the water row.
        let wet = |grid: &Grid, c: CellCoord| c.row >= water_row && grid.is_air(c);
        let sandable = |kind: BlockType| {
            matches!(kind, BlockType::Dirt | BlockType::Grass | BlockType::Stone)
        };

        let mut beach = Vec::new();
        for (coord, block) in grid.iter() {
            if !sandable(block.kind()) {
                continue;
            }
            let near_water = (-radius..=radius).any(|dc| {
                (-radius..=radius).any(|dr| wet(grid, CellCoord::new(coord.col + dc, coord.row + dr)))
            });
            if near_water {
                beach.push(coord);
            }
        }

        let mut converted = 0;
        for coord in &beach {
            for depth in 0..=self.config.sand_extension as i32 {
                let cell = coord.offset_rows(depth);
                match grid.get_type(cell) {
                    Ok(kind) if sandable(kind) => {
                        if grid.set(cell, BlockType::Sand, false).is_ok() {
                            converted += 1;
                        }
                    }
                    Ok(BlockType::Sand) => {}
                    _ => break,
                }
            }
        }
        converted
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_config() -> GridConfig {
        GridConfig {
            cols: 120,
            rows: 48,
            water_level_row: 24,
        }
    }

    #[test]
    fn same_seed_same_terrain() {
        let a = TerrainGenerator::new(TerrainConfig::default(), 42).generate(&grid_config());
        let b = TerrainGenerator::new(TerrainConfig::default(), 42).generate(&grid_config());
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = TerrainGenerator::new(TerrainConfig::default(), 1).generate(&grid_config());
        let b = TerrainGenerator::new(TerrainConfig::default(), 2).generate(&grid_config());
        assert_ne!(a, b);
    }

    #[test]
    fn island_rises_above_water_and_ocean_stays_below() {
        let generator = TerrainGenerator::new(TerrainConfig::default(), 7);
        let gc = grid_config();
        let water_row = gc.water_level_row as i32;
        let (start, end) = generator.island_span(gc.cols);
        let mid = (start + end) / 2;

        let center = generator.column_profile(mid, gc.cols, gc.rows, water_row);
        assert!(center.island);
        assert!(center.surface_row < water_row);
        assert!(center.stone_row > center.surface_row);

        let ocean = generator.column_profile(0, gc.cols, gc.rows, water_row);
        assert!(!ocean.island);
        assert!(ocean.surface_row > water_row);
    }

    #[test]
    fn island_tapers_to_edge_profile() {
        let config = TerrainConfig::default();
        let generator = TerrainGenerator::new(config.clone(), 3);
        let gc = grid_config();
        let water_row = gc.water_level_row as i32;
        let (start, end) = generator.island_span(gc.cols);

        for col in [start, end - 1] {
            let p = generator.column_profile(col, gc.cols, gc.rows, water_row);
            assert_eq!(p.surface_row, water_row + config.edge_depth as i32);
        }
    }

    #[test]
    fn ocean_floor_deepens_away_from_island() {
        let generator = TerrainGenerator::new(TerrainConfig::default(), 5);
        let gc = grid_config();
        let water_row = gc.water_level_row as i32;
        let (start, _) = generator.island_span(gc.cols);

        let near = generator.column_profile(start - 1, gc.cols, gc.rows, water_row);
        let far = generator.column_profile(0, gc.cols, gc.rows, water_row);
        assert!(far.surface_row >= near.surface_row);
    }

    #[test]
    fn no_column_is_left_without_ground() {
        let grid = TerrainGenerator::new(TerrainConfig::default(), 11).generate(&grid_config());
        let floor = grid.floor_row();
        for col in 0..grid.cols() as i32 {
            assert!(grid.is_structural(CellCoord::new(col, floor)), "column {col}");
        }
    }

    #[test]
    fn beaches_are_sand_bands() {
        let config = TerrainConfig::default();
        let generator = TerrainGenerator::new(config.clone(), 9);
        let gc = grid_config();
        let grid = generator.generate(&gc);
        let (start, _) = generator.island_span(gc.cols);

        // The island edge sits just under the water row: its top is sand and
        // the band continues below it.
        let edge = generator.column_profile(start, gc.cols, gc.rows, gc.water_level_row as i32);
        for depth in 0..=config.sand_extension as i32 {
            let c = CellCoord::new(start, edge.surface_row + depth);
            assert_eq!(grid.get_type(c).unwrap(), BlockType::Sand, "{c}");
        }
        assert!(grid.count(BlockType::Sand) > 0);
        assert!(grid.count(BlockType::Grass) > 0);
    }
}
