//! One-shot world construction.

use tidefall_kernel::World;

use crate::config::WorldConfig;
use crate::terrain::TerrainGenerator;

/// Counts from each stage of [`build_world`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub settle_passes: u32,
    pub chunks_settled: usize,
    pub ocean_cells: usize,
    pub lights_cast: usize,
}

/// Generate terrain, settle it, flood the ocean, light it, and flush every
/// queued animation so the world starts fully consistent.
///
/// The returned world has an empty event log and a settled scheduler.
pub fn build_world(config: &WorldConfig) -> (World, SetupReport) {
    let _span = tracing::info_span!("build_world", seed = config.seed).entered();
    let generator = TerrainGenerator::new(config.terrain.clone(), config.seed);
    let grid = generator.generate(&config.sim.grid);
    let mut world = World::new(grid, config.sim.clone(), config.seed);

    let settled = world.settle_now();
    let ocean_cells = world.flood_ocean();
    world.reset_lighting();
    let lights_cast = world.light_full_sweep();
    world.force_flush();
    // Generation is not part of the replayable input log.
    world.drain_events();

    let report = SetupReport {
        settle_passes: settled.passes,
        chunks_settled: settled.chunks_moved,
        ocean_cells,
        lights_cast,
    };
    tracing::info!(?report, "world ready");
    (world, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidefall_common::{BlockType, CellCoord};

    fn small_config(seed: u64) -> WorldConfig {
        let mut config = WorldConfig {
            seed,
            ..Default::default()
        };
        config.sim.grid.cols = 96;
        config.sim.grid.rows = 40;
        config.sim.grid.water_level_row = 20;
        config
    }

    #[test]
    fn built_world_is_settled_and_consistent() {
        let (world, report) = build_world(&small_config(3));
        assert!(world.is_settled());
        assert!(world.events().is_empty());
        assert!(world.render_cache().diverged_cells(world.grid()).is_empty());
        assert!(report.ocean_cells > 0);
        assert!(report.lights_cast > 0);
    }

    #[test]
    fn same_seed_builds_identical_worlds() {
        let (a, ra) = build_world(&small_config(17));
        let (b, rb) = build_world(&small_config(17));
        assert_eq!(a.state_hash(), b.state_hash());
        assert_eq!(ra, rb);
    }

    #[test]
    fn water_never_sits_above_sea_level() {
        let (world, _) = build_world(&small_config(8));
        let water_row = world.water_level_row();
        for (c, block) in world.grid().iter() {
            if block.is_water() {
                assert!(c.row >= water_row, "water at {c}");
            }
        }
        // Corners of the map are open ocean at sea level.
        assert_eq!(
            world.get_type(CellCoord::new(0, water_row)).unwrap(),
            BlockType::Water
        );
    }

    #[test]
    fn island_surface_is_lit() {
        let config = small_config(21);
        let (world, _) = build_world(&config);
        let mid = config.sim.grid.cols as i32 / 2;
        let surface = (0..config.sim.grid.rows as i32)
            .map(|row| CellCoord::new(mid, row))
            .find(|&c| !world.get(c).unwrap().is_air())
            .unwrap();
        assert!(world.get(surface).unwrap().is_lit());
        assert!(world.render_cache().get(surface).unwrap().lit);
    }

    #[test]
    fn world_runs_after_setup() {
        let (mut world, _) = build_world(&small_config(4));
        for _ in 0..30 {
            world.update(1.0 / 60.0);
        }
        assert_eq!(world.tick(), 30);
        for (c, block) in world.grid().iter() {
            if block.is_water() {
                assert!(c.row >= world.water_level_row());
            }
        }
    }
}
