//! Rate-limited water propagation over a deduplicated candidate set.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use tidefall_common::{BlockType, CellCoord};

use crate::config::WaterConfig;
use crate::grid::Grid;

/// Ordering key: bottom rows first, then left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PendingKey {
    row: Reverse<i32>,
    col: i32,
}

impl PendingKey {
    fn of(c: CellCoord) -> Self {
        Self {
            row: Reverse(c.row),
            col: c.col,
        }
    }

    fn coord(self) -> CellCoord {
        CellCoord::new(self.col, self.row.0)
    }
}

/// Gravity-fed flooding approximation.
///
/// Never inspects or converts a cell above `water_row`. Every batch is pulled
/// bottom row first so fill prefers going down before going sideways.
#[derive(Debug, Clone)]
pub struct WaterAutomaton {
    pending: BTreeSet<PendingKey>,
    timer: u32,
    interval: u32,
    batch_size: usize,
    water_row: i32,
}

impl WaterAutomaton {
    pub fn new(config: &WaterConfig, water_row: i32) -> Self {
        Self {
            pending: BTreeSet::new(),
            timer: config.interval_ticks,
            interval: config.interval_ticks,
            batch_size: config.batch_size.max(1),
            water_row,
        }
    }

    pub fn water_row(&self) -> i32 {
        self.water_row
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, coord: CellCoord) -> bool {
        self.pending.contains(&PendingKey::of(coord))
    }

    /// Candidates in the order the next batches will take them.
    pub fn pending(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.pending.iter().map(|k| k.coord())
    }

    pub fn timer(&self) -> u32 {
        self.timer
    }

    /// Queue a single cell if it is in bounds and at or below the water row.
    pub fn enqueue(&mut self, grid: &Grid, coord: CellCoord) {
        if coord.row >= self.water_row && grid.contains(coord) {
            self.pending.insert(PendingKey::of(coord));
        }
    }

    fn enqueue_around(&mut self, grid: &Grid, coord: CellCoord) {
        self.enqueue(grid, coord);
        for n in coord.neighbors4() {
            self.enqueue(grid, n);
        }
    }

    /// Record an authoritative mutation from outside the automaton: the cell
    /// and its neighbours are re-evaluated on the next tick.
    pub fn notify_changed(&mut self, grid: &Grid, coord: CellCoord) {
        self.enqueue_around(grid, coord);
        self.timer = 0;
    }

    /// Advance the countdown and, when it expires, process one batch.
    /// Returns the cells converted to water.
    pub fn step(&mut self, grid: &mut Grid) -> Vec<CellCoord> {
        if self.timer > 0 {
            self.timer -= 1;
            if self.timer > 0 {
                return Vec::new();
            }
        }
        self.timer = self.interval;

        let mut batch = Vec::with_capacity(self.batch_size.min(self.pending.len()));
        while batch.len() < self.batch_size {
            match self.pending.pop_first() {
                Some(key) => batch.push(key.coord()),
                None => break,
            }
        }
        if batch.is_empty() {
            return Vec::new();
        }

        let mut converted = Vec::new();
        for cell in batch {
            self.evaluate(grid, cell, &mut converted);
        }
        tracing::trace!(
            converted = converted.len(),
            pending = self.pending.len(),
            "water batch"
        );
        converted
    }

    fn evaluate(&mut self, grid: &mut Grid, cell: CellCoord, converted: &mut Vec<CellCoord>) {
        if cell.row < self.water_row {
            return;
        }
        let Ok(kind) = grid.get_type(cell) else {
            return;
        };

        match kind {
            BlockType::Air => {
                let touches_water = cell.neighbors4().iter().any(|&n| grid.is_water(n));
                if touches_water && grid.set(cell, BlockType::Water, false).is_ok() {
                    converted.push(cell);
                    // Own conversions keep the countdown running.
                    for n in cell.neighbors4() {
                        self.enqueue(grid, n);
                    }
                }
            }
            BlockType::Water => {
                let below = cell.below();
                if grid.is_air(below) {
                    self.enqueue(grid, below);
                } else {
                    for side in [cell.left(), cell.right()] {
                        if grid.is_air(side) {
                            self.enqueue(grid, side);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}
