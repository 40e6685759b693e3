use serde::{Deserialize, Serialize};
use tidefall_common::{Block, BlockType, CellCoord, ProtectedRegion};

use crate::config::SimConfig;
use crate::flood;
use crate::gravity::{self, SettleReport};
use crate::grid::{Grid, GridError};
use crate::lighting::{self, LightSweep};
use crate::render_cache::RenderCache;
use crate::schedule::{AgingProposal, CommitTarget, ScheduleReport, Scheduler};
use crate::water::WaterAutomaton;

/// An event record produced by every external input and by block destruction.
///
/// Input events are enough to reproduce a run from the same generated world
/// (see [`World::replay_inputs`]). `BlockDestroyed` is the item-drop signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// A block was placed by building.
    BlockPlaced { coord: CellCoord, kind: BlockType },
    /// A block took damage.
    BlockDamaged { coord: CellCoord, amount: f32 },
    /// A damaged block ran out of hit points and was replaced with air.
    BlockDestroyed { coord: CellCoord, kind: BlockType },
    /// Erosion/growth proposals handed to the scheduler.
    AgingSubmitted { proposals: Vec<AgingProposal> },
    /// Simulation advanced one tick by `dt` seconds.
    Stepped { tick: u64, dt: f32 },
}

/// Summary of one [`World::update`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub settled_chunks: usize,
    pub water_converted: usize,
    pub lights_proposed: usize,
    pub animations_completed: usize,
}

/// The authoritative simulation context.
///
/// Owns the grid and its render-cache mirror together with every subsystem
/// that mutates them. Direct mutations (placement, destruction, water) update
/// the cache immediately; gravity, lighting and aging go through the
/// scheduler, which commits the cache when each animation finishes.
#[derive(Debug, Clone)]
pub struct World {
    config: SimConfig,
    grid: Grid,
    cache: RenderCache,
    water: WaterAutomaton,
    scheduler: Scheduler,
    sweep: LightSweep,
    protected: Vec<ProtectedRegion>,
    /// Set by structural removal or placement; settlement runs next tick.
    settle_requested: bool,
    tick: u64,
    seed: u64,
    event_log: Vec<WorldEvent>,
}

impl World {
    /// Wrap a populated grid. The render cache starts as an exact mirror.
    pub fn new(grid: Grid, config: SimConfig, seed: u64) -> Self {
        let water_row = config.grid.water_level_row as i32;
        Self {
            cache: RenderCache::from_grid(&grid),
            water: WaterAutomaton::new(&config.water, water_row),
            scheduler: Scheduler::new(&config.schedule),
            sweep: LightSweep::new(),
            protected: Vec::new(),
            settle_requested: false,
            tick: 0,
            seed,
            event_log: Vec::new(),
            grid,
            config,
        }
    }

    /// Number of updates run so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Seed the world was generated from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Simulation config.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Authoritative block grid.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// What presentation currently shows.
    pub fn render_cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Water automaton and its pending cells.
    pub fn water(&self) -> &WaterAutomaton {
        &self.water
    }

    /// Animation scheduler, for lane status and running visuals.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Row of the sea surface.
    pub fn water_level_row(&self) -> i32 {
        self.water.water_row()
    }

    /// Block at `coord`.
    pub fn get(&self, coord: CellCoord) -> Result<&Block, GridError> {
        self.grid.get(coord)
    }

    /// Type of the block at `coord`.
    pub fn get_type(&self, coord: CellCoord) -> Result<BlockType, GridError> {
        self.grid.get_type(coord)
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Events recorded since the last drain.
    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    /// Regions settlement leaves alone.
    pub fn protected_regions(&self) -> &[ProtectedRegion] {
        &self.protected
    }

    /// Replace the set of regions settlement must leave alone.
    pub fn set_protected_regions(&mut self, regions: Vec<ProtectedRegion>) {
        self.protected = regions;
    }

    /// Exempt one more region from settlement.
    pub fn add_protected_region(&mut self, region: ProtectedRegion) {
        self.protected.push(region);
    }

    /// Drop every protected region.
    pub fn clear_protected_regions(&mut self) {
        self.protected.clear();
    }

    /// Direct write used by erosion and other callers that bypass animation.
    /// Returns false when `coord` is out of bounds.
    pub fn set_block(&mut self, coord: CellCoord, kind: BlockType, player_placed: bool) -> bool {
        let Ok(old) = self.grid.get_type(coord) else {
            return false;
        };
        if self.grid.set(coord, kind, player_placed).is_err() {
            return false;
        }
        self.after_direct_write(coord, old, kind);
        true
    }

    /// Place a block where there is currently air or water.
    ///
    /// Returns false for out-of-bounds coordinates, for air, and for an
    /// occupied target.
    pub fn place_block(&mut self, coord: CellCoord, kind: BlockType) -> bool {
        if kind == BlockType::Air {
            return false;
        }
        let old = match self.grid.get_type(coord) {
            Ok(old @ (BlockType::Air | BlockType::Water)) => old,
            _ => return false,
        };
        if self.grid.set(coord, kind, true).is_err() {
            return false;
        }
        self.after_direct_write(coord, old, kind);
        self.event_log.push(WorldEvent::BlockPlaced { coord, kind });
        tracing::debug!(%coord, ?kind, "block placed");
        true
    }

    /// Damage a structural block. Returns true when the block was destroyed,
    /// in which case it is replaced with air and `BlockDestroyed` is logged.
    ///
    /// Air, water, out-of-bounds cells and non-finite or non-positive amounts
    /// are ignored.
    pub fn damage_block(&mut self, coord: CellCoord, amount: f32) -> bool {
        if !amount.is_finite() || amount <= 0.0 {
            tracing::warn!(%coord, amount, "ignoring malformed damage amount");
            return false;
        }
        let Ok(block) = self.grid.get_mut(coord) else {
            return false;
        };
        let kind = block.kind();
        let Some(solid) = block.solid_mut() else {
            return false;
        };
        if kind == BlockType::Water {
            return false;
        }
        let destroyed = solid.damage(amount);
        self.event_log
            .push(WorldEvent::BlockDamaged { coord, amount });
        if !destroyed {
            return false;
        }

        if self.grid.set(coord, BlockType::Air, false).is_err() {
            return false;
        }
        self.after_direct_write(coord, kind, BlockType::Air);
        self.event_log
            .push(WorldEvent::BlockDestroyed { coord, kind });
        tracing::debug!(%coord, ?kind, "block destroyed");
        true
    }

    fn after_direct_write(&mut self, coord: CellCoord, old: BlockType, new: BlockType) {
        self.cache.commit(coord, &self.grid);
        self.water.notify_changed(&self.grid, coord);
        if old.is_structural() || new.is_structural() {
            self.settle_requested = true;
        }
    }

    /// Hand erosion/growth proposals to the aging lane.
    pub fn submit_aging(&mut self, proposals: Vec<AgingProposal>) -> ScheduleReport {
        if proposals.is_empty() {
            return ScheduleReport::default();
        }
        self.event_log.push(WorldEvent::AgingSubmitted {
            proposals: proposals.clone(),
        });
        let mut target = CommitTarget {
            grid: &mut self.grid,
            cache: &mut self.cache,
            water: &mut self.water,
        };
        let report = self.scheduler.submit_aging(proposals, &mut target);
        self.note_structural_change(&report);
        report
    }

    /// Run settlement to a fixed point now and queue the falls.
    pub fn settle_now(&mut self) -> SettleReport {
        self.settle_requested = false;
        let report = gravity::settle(&mut self.grid, &self.protected, self.config.gravity.max_passes);
        if report.hit_pass_cap {
            tracing::warn!(passes = report.passes, "settlement stopped at the pass cap");
        }
        let mut target = CommitTarget {
            grid: &mut self.grid,
            cache: &mut self.cache,
            water: &mut self.water,
        };
        let scheduled = self
            .scheduler
            .submit_falls(report.proposals.iter().copied(), &mut target);
        self.note_structural_change(&scheduled);
        report
    }

    /// Seed the ocean from the world edges. Water is a direct write, so the
    /// cache is updated immediately. Returns the number of cells filled.
    pub fn flood_ocean(&mut self) -> usize {
        let filled = flood::flood_ocean(&mut self.grid, self.water.water_row());
        for &cell in &filled {
            self.cache.commit(cell, &self.grid);
        }
        filled.len()
    }

    /// Clear every lit flag and rebuild the cache to match.
    pub fn reset_lighting(&mut self) {
        self.grid.reset_lighting();
        self.cache.rebuild(&self.grid);
    }

    /// Cast from every sweep position and queue the results.
    /// Returns the number of proposals cast.
    pub fn light_full_sweep(&mut self) -> usize {
        let proposals = lighting::full_sweep(&self.grid, &self.config.lighting);
        let count = proposals.len();
        let mut target = CommitTarget {
            grid: &mut self.grid,
            cache: &mut self.cache,
            water: &mut self.water,
        };
        self.scheduler.submit_lights(proposals, &mut target);
        count
    }

    /// Advance the simulation by one tick of `dt` seconds.
    ///
    /// Order: pending settlement, incremental light sweep, one water step,
    /// then the scheduler.
    pub fn update(&mut self, dt: f32) -> TickReport {
        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            tracing::warn!(dt, "non-finite or negative dt, treating as zero");
            0.0
        };
        self.tick += 1;
        self.event_log.push(WorldEvent::Stepped {
            tick: self.tick,
            dt,
        });
        let mut report = TickReport::default();

        if self.settle_requested {
            report.settled_chunks = self.settle_now().chunks_moved;
        }

        let interval = self.config.lighting.interval_ticks as u64;
        if interval > 0 && self.tick % interval == 0 {
            let proposals = self.sweep.advance(&self.grid, &self.config.lighting);
            report.lights_proposed = proposals.len();
            let mut target = CommitTarget {
                grid: &mut self.grid,
                cache: &mut self.cache,
                water: &mut self.water,
            };
            let scheduled = self.scheduler.submit_lights(proposals, &mut target);
            report.animations_completed += scheduled.completed;
        }

        let converted = self.water.step(&mut self.grid);
        for &cell in &converted {
            self.cache.commit(cell, &self.grid);
        }
        report.water_converted = converted.len();

        let mut target = CommitTarget {
            grid: &mut self.grid,
            cache: &mut self.cache,
            water: &mut self.water,
        };
        let scheduled = self.scheduler.update(dt, &mut target);
        report.animations_completed += scheduled.completed;
        self.note_structural_change(&scheduled);

        tracing::trace!(tick = self.tick, ?report, "tick");
        report
    }

    /// Apply every queued and running animation's end state immediately.
    pub fn force_flush(&mut self) -> ScheduleReport {
        let mut target = CommitTarget {
            grid: &mut self.grid,
            cache: &mut self.cache,
            water: &mut self.water,
        };
        let report = self.scheduler.force_flush(&mut target);
        self.note_structural_change(&report);
        report
    }

    fn note_structural_change(&mut self, report: &ScheduleReport) {
        if !report.structural_changed.is_empty() {
            self.settle_requested = true;
        }
    }

    /// True when the scheduler has nothing queued or running and no
    /// settlement is pending.
    pub fn is_settled(&self) -> bool {
        self.scheduler.is_settled() && !self.settle_requested
    }

    /// Re-apply the input events of another run. Outcome events are skipped;
    /// they are reproduced by the inputs.
    pub fn replay_inputs(&mut self, events: &[WorldEvent]) {
        for event in events {
            match event {
                WorldEvent::BlockPlaced { coord, kind } => {
                    self.place_block(*coord, *kind);
                }
                WorldEvent::BlockDamaged { coord, amount } => {
                    self.damage_block(*coord, *amount);
                }
                WorldEvent::AgingSubmitted { proposals } => {
                    self.submit_aging(proposals.clone());
                }
                WorldEvent::Stepped { dt, .. } => {
                    self.update(*dt);
                }
                WorldEvent::BlockDestroyed { .. } => {}
            }
        }
    }

    /// Deterministic FNV-1a hash of the grid and tick.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.tick.to_le_bytes());
        mix(&mut h, &self.seed.to_le_bytes());
        mix(&mut h, &self.grid.cols().to_le_bytes());
        mix(&mut h, &self.grid.rows().to_le_bytes());
        for (_, block) in self.grid.iter() {
            match block {
                Block::Air => mix(&mut h, &[0]),
                Block::Solid(s) => {
                    mix(&mut h, &[1, s.kind as u8, s.orientation as u8]);
                    mix(&mut h, &[s.player_placed as u8, s.lit as u8]);
                    mix(&mut h, &s.hp().unwrap_or(-1.0).to_le_bytes());
                }
            }
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LaneConfig, ScheduleConfig};

    fn fast_config(cols: u32, rows: u32, water_row: u32) -> SimConfig {
        let lane = LaneConfig {
            queue_capacity: 1024,
            start_interval: 0.0,
            max_active: 64,
            duration: 0.1,
        };
        let mut config = SimConfig::default();
        config.grid.cols = cols;
        config.grid.rows = rows;
        config.grid.water_level_row = water_row;
        config.water.interval_ticks = 1;
        config.schedule = ScheduleConfig {
            fall: lane.clone(),
            light: lane.clone(),
            aging: lane,
        };
        config
    }

    /// Flat stone floor two rows thick.
    fn floor_grid(cols: u32, rows: u32) -> Grid {
        let mut grid = Grid::new(cols, rows);
        for col in 0..cols as i32 {
            for row in rows as i32 - 2..rows as i32 {
                grid.set(CellCoord::new(col, row), BlockType::Stone, false)
                    .unwrap();
            }
        }
        grid
    }

    fn floor_world(cols: u32, rows: u32, water_row: u32) -> World {
        World::new(floor_grid(cols, rows), fast_config(cols, rows, water_row), 7)
    }

    fn run_until_settled(world: &mut World, max_ticks: usize) {
        for _ in 0..max_ticks {
            world.update(0.1);
            if world.is_settled() && world.water().pending_len() == 0 {
                return;
            }
        }
    }

    #[test]
    fn world_starts_at_tick_zero_with_mirrored_cache() {
        let w = floor_world(6, 6, 3);
        assert_eq!(w.tick(), 0);
        assert!(w.render_cache().diverged_cells(w.grid()).is_empty());
        assert!(w.is_settled());
    }

    #[test]
    fn out_of_bounds_is_an_explicit_result() {
        let mut w = floor_world(4, 4, 2);
        let outside = CellCoord::new(9, 0);
        assert_eq!(
            w.get(outside),
            Err(GridError::OutOfBounds { col: 9, row: 0 })
        );
        assert!(!w.place_block(outside, BlockType::Stone));
        assert!(!w.damage_block(outside, 10.0));
        assert!(!w.set_block(outside, BlockType::Stone, false));
    }

    #[test]
    fn placement_updates_cache_immediately() {
        let mut w = floor_world(6, 6, 5);
        let c = CellCoord::new(2, 3);
        assert!(w.place_block(c, BlockType::Brick));
        assert_eq!(w.render_cache().get(c).unwrap().kind, BlockType::Brick);
        assert!(w.get(c).unwrap().solid().unwrap().player_placed);
        // Occupied target.
        assert!(!w.place_block(c, BlockType::Wood));
        assert!(!w.place_block(CellCoord::new(0, 1), BlockType::Air));
        assert_eq!(
            w.events(),
            &[WorldEvent::BlockPlaced {
                coord: c,
                kind: BlockType::Brick
            }]
        );
    }

    #[test]
    fn damage_destroys_at_zero_and_signals_drop() {
        let mut w = floor_world(4, 6, 5);
        let c = CellCoord::new(1, 4);
        assert!(!w.damage_block(c, 60.0));
        assert_eq!(w.get_type(c).unwrap(), BlockType::Stone);
        assert!(w.damage_block(c, 60.0));
        assert_eq!(w.get(c).unwrap(), &Block::Air);
        assert_eq!(w.render_cache().get(c).unwrap().kind, BlockType::Air);
        assert!(w.events().contains(&WorldEvent::BlockDestroyed {
            coord: c,
            kind: BlockType::Stone
        }));
    }

    #[test]
    fn water_and_malformed_damage_are_ignored() {
        let mut w = floor_world(4, 6, 2);
        let c = CellCoord::new(0, 2);
        assert!(w.set_block(c, BlockType::Water, false));
        assert!(!w.damage_block(c, 1.0e9));
        assert!(w.get(c).unwrap().is_water());
        assert!(!w.damage_block(CellCoord::new(0, 5), f32::NAN));
        assert!(!w.damage_block(CellCoord::new(0, 5), -3.0));
        assert_eq!(w.get(CellCoord::new(0, 5)).unwrap().solid().unwrap().hp(), Some(100.0));
    }

    #[test]
    fn undermined_block_falls_at_runtime() {
        let mut w = floor_world(5, 8, 7);
        let base = CellCoord::new(2, 5);
        let top = CellCoord::new(2, 4);
        assert!(w.place_block(base, BlockType::Dirt));
        assert!(w.place_block(top, BlockType::Brick));
        run_until_settled(&mut w, 20);
        assert_eq!(w.get_type(top).unwrap(), BlockType::Brick);

        // Break the supporting block: the brick drops onto the floor.
        assert!(w.damage_block(base, 100.0));
        run_until_settled(&mut w, 40);
        assert_eq!(w.get_type(base).unwrap(), BlockType::Brick);
        assert!(w.get(top).unwrap().is_air());
        assert!(w.render_cache().diverged_cells(w.grid()).is_empty());
    }

    #[test]
    fn protected_region_is_left_hanging() {
        let mut w = floor_world(6, 8, 7);
        let hanging = CellCoord::new(3, 1);
        w.add_protected_region(ProtectedRegion::new(hanging, 1.0));
        assert!(w.place_block(hanging, BlockType::Stone));
        run_until_settled(&mut w, 20);
        assert_eq!(w.get_type(hanging).unwrap(), BlockType::Stone);

        w.clear_protected_regions();
        w.settle_now();
        w.force_flush();
        assert_eq!(w.get_type(CellCoord::new(3, 5)).unwrap(), BlockType::Stone);
    }

    #[test]
    fn removal_near_sea_floods_the_gap() {
        let mut w = floor_world(6, 8, 3);
        assert_eq!(w.flood_ocean(), 6 * 3);
        let hole = CellCoord::new(2, 6);
        assert!(w.damage_block(hole, 100.0));
        run_until_settled(&mut w, 20);
        assert!(w.get(hole).unwrap().is_water());
        assert_eq!(w.render_cache().get(hole).unwrap().kind, BlockType::Water);
    }

    #[test]
    fn lighting_sweeps_during_update() {
        let mut config = fast_config(8, 6, 5);
        config.lighting.ray_count = 1;
        config.lighting.sweep_step = 1;
        let mut w = World::new(floor_grid(8, 6), config, 7);
        for _ in 0..32 {
            w.update(0.1);
        }
        w.force_flush();
        for col in 0..8 {
            let surface = CellCoord::new(col, 4);
            assert!(w.get(surface).unwrap().is_lit(), "{surface} unlit");
            assert!(w.render_cache().get(surface).unwrap().lit);
        }
        assert!(!w.get(CellCoord::new(0, 5)).unwrap().is_lit());
    }

    #[test]
    fn reset_lighting_clears_grid_and_cache() {
        let mut w = floor_world(6, 6, 5);
        w.light_full_sweep();
        w.force_flush();
        assert!(w.get(CellCoord::new(0, 4)).unwrap().is_lit());
        w.reset_lighting();
        assert!(w.grid().iter().all(|(_, b)| !b.is_lit()));
        assert!(w.render_cache().iter().all(|(_, v)| !v.lit));
    }

    #[test]
    fn aging_is_logged_and_reaches_the_grid() {
        let mut w = floor_world(4, 6, 5);
        let c = CellCoord::new(1, 4);
        w.submit_aging(vec![AgingProposal {
            coord: c,
            old: BlockType::Stone,
            new: BlockType::Sand,
        }]);
        assert!(matches!(
            w.events()[0],
            WorldEvent::AgingSubmitted { .. }
        ));
        assert_eq!(w.get_type(c).unwrap(), BlockType::Stone);
        run_until_settled(&mut w, 10);
        assert_eq!(w.get_type(c).unwrap(), BlockType::Sand);
        assert!(w.render_cache().diverged_cells(w.grid()).is_empty());
    }

    #[test]
    fn aging_growth_in_mid_air_falls() {
        let mut w = floor_world(6, 8, 7);
        let grown = CellCoord::new(3, 0);
        w.submit_aging(vec![AgingProposal {
            coord: grown,
            old: BlockType::Air,
            new: BlockType::Dirt,
        }]);
        run_until_settled(&mut w, 40);

        assert!(w.is_settled());
        assert!(w.get(grown).unwrap().is_air());
        assert_eq!(w.get_type(CellCoord::new(3, 5)).unwrap(), BlockType::Dirt);
        let mut copy = w.grid().clone();
        let fresh = gravity::settle(&mut copy, &[], w.config().gravity.max_passes);
        assert!(fresh.proposals.is_empty());
        assert!(w.render_cache().diverged_cells(w.grid()).is_empty());
    }

    #[test]
    fn non_finite_dt_is_treated_as_zero() {
        let mut w = floor_world(4, 4, 3);
        w.update(f32::INFINITY);
        assert_eq!(w.tick(), 1);
        assert_eq!(
            w.events(),
            &[WorldEvent::Stepped { tick: 1, dt: 0.0 }]
        );
    }

    #[test]
    fn drain_events_clears_log() {
        let mut w = floor_world(4, 4, 3);
        w.update(0.1);
        w.update(0.1);
        assert_eq!(w.drain_events().len(), 2);
        assert!(w.events().is_empty());
    }

    #[test]
    fn replay_equivalence() {
        let base = floor_world(10, 10, 6);
        let mut world = base.clone();
        world.flood_ocean();
        let mut replayed = world.clone();

        world.place_block(CellCoord::new(4, 2), BlockType::Sand);
        world.update(0.05);
        world.damage_block(CellCoord::new(5, 8), 40.0);
        world.damage_block(CellCoord::new(5, 8), 80.0);
        for _ in 0..30 {
            world.update(0.05);
        }
        world.submit_aging(vec![AgingProposal {
            coord: CellCoord::new(1, 8),
            old: BlockType::Stone,
            new: BlockType::Air,
        }]);
        for _ in 0..30 {
            world.update(0.05);
        }

        let events = world.events().to_vec();
        replayed.replay_inputs(&events);
        assert_eq!(world.state_hash(), replayed.state_hash());
        assert_eq!(world.events(), replayed.events());
    }

    #[test]
    fn state_hash_tracks_cell_contents() {
        let a = floor_world(6, 6, 3);
        let mut b = a.clone();
        assert_eq!(a.state_hash(), b.state_hash());
        b.damage_block(CellCoord::new(0, 5), 1.0);
        assert_ne!(a.state_hash(), b.state_hash());
    }
}
