use std::collections::BTreeMap;

use serde::Serialize;
use tidefall_common::{BlockType, CellCoord, Orientation};
use tidefall_kernel::{AnimationKind, World};

/// World inspector for developer tooling.
///
/// Read-only queries against the world for debugging and the CLI.
pub struct WorldInspector;

impl WorldInspector {
    pub fn summary(world: &World) -> WorldSummary {
        let scheduler = world.scheduler();
        let lane = |kind| LaneStatus {
            queued: scheduler.queued(kind),
            active: scheduler.active(kind),
        };
        WorldSummary {
            tick: world.tick(),
            seed: world.seed(),
            cols: world.grid().cols(),
            rows: world.grid().rows(),
            water_level_row: world.water_level_row(),
            water_pending: world.water().pending_len(),
            fall: lane(AnimationKind::Fall),
            light: lane(AnimationKind::Light),
            aging: lane(AnimationKind::Aging),
            settled: world.is_settled(),
            pending_events: world.events().len(),
            diverged_cells: world.render_cache().diverged_cells(world.grid()).len(),
            state_hash: world.state_hash(),
        }
    }

    /// Cell count per block type, air included. Types with no cells are
    /// omitted.
    pub fn census(world: &World) -> BTreeMap<BlockType, usize> {
        let mut counts = BTreeMap::new();
        for (_, block) in world.grid().iter() {
            *counts.entry(block.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of lit cells.
    pub fn lit_count(world: &World) -> usize {
        world.grid().iter().filter(|(_, b)| b.is_lit()).count()
    }

    pub fn inspect_cell(world: &World, coord: CellCoord) -> Option<CellInfo> {
        let block = world.get(coord).ok()?;
        let solid = block.solid();
        let cached = world.render_cache().get(coord)?;
        Some(CellInfo {
            coord,
            kind: block.kind(),
            hp: solid.and_then(|s| s.hp()),
            max_hp: solid.and_then(|s| s.max_hp()),
            lit: block.is_lit(),
            player_placed: solid.is_some_and(|s| s.player_placed),
            orientation: solid.map(|s| s.orientation),
            cached_kind: cached.kind,
            cached_lit: cached.lit,
            water_pending: world.water().is_pending(coord),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaneStatus {
    pub queued: usize,
    pub active: usize,
}

/// Summary of world state for the inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldSummary {
    pub tick: u64,
    pub seed: u64,
    pub cols: u32,
    pub rows: u32,
    pub water_level_row: i32,
    pub water_pending: usize,
    pub fall: LaneStatus,
    pub light: LaneStatus,
    pub aging: LaneStatus,
    pub settled: bool,
    pub pending_events: usize,
    pub diverged_cells: usize,
    pub state_hash: u64,
}

impl std::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "World: tick={} seed={} size={}x{} water_row={} hash={:016x}",
            self.tick, self.seed, self.cols, self.rows, self.water_level_row, self.state_hash
        )?;
        write!(
            f,
            "  water_pending={} fall={}/{} light={}/{} aging={}/{} settled={} events={} diverged={}",
            self.water_pending,
            self.fall.queued,
            self.fall.active,
            self.light.queued,
            self.light.active,
            self.aging.queued,
            self.aging.active,
            self.settled,
            self.pending_events,
            self.diverged_cells
        )
    }
}

/// Everything known about one cell, truth and presentation side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellInfo {
    pub coord: CellCoord,
    pub kind: BlockType,
    pub hp: Option<f32>,
    pub max_hp: Option<f32>,
    pub lit: bool,
    pub player_placed: bool,
    pub orientation: Option<Orientation>,
    pub cached_kind: BlockType,
    pub cached_lit: bool,
    pub water_pending: bool,
}

impl std::fmt::Display for CellInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cell {} {:?}", self.coord, self.kind)?;
        match (self.hp, self.max_hp) {
            (Some(hp), Some(max)) => write!(f, " hp={hp:.1}/{max:.1}")?,
            _ if self.kind == BlockType::Water => write!(f, " hp=unbounded")?,
            _ => {}
        }
        write!(f, " lit={}", self.lit)?;
        if self.player_placed {
            write!(f, " placed")?;
        }
        if self.cached_kind != self.kind || self.cached_lit != self.lit {
            write!(
                f,
                " (shown as {:?} lit={})",
                self.cached_kind, self.cached_lit
            )?;
        }
        Ok(())
    }
}
