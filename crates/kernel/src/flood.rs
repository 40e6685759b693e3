//! One-shot ocean seeding.

use std::collections::VecDeque;

use tidefall_common::{BlockType, CellCoord};

use crate::grid::Grid;

/// Breadth-first fill from every air cell on the left edge, right edge and
/// bottom row that sits at or below `water_row`.
///
/// Only air cells at or below the threshold are ever visited, so water never
/// climbs above sea level here. Returns the converted cells in fill order.
pub fn flood_ocean(grid: &mut Grid, water_row: i32) -> Vec<CellCoord> {
    let _span = tracing::info_span!("flood_ocean", water_row).entered();
    let cols = grid.cols() as i32;
    let rows = grid.rows() as i32;
    if cols == 0 || rows == 0 {
        return Vec::new();
    }

    let fillable = |grid: &Grid, c: CellCoord| c.row >= water_row && grid.is_air(c);
    let idx = |c: CellCoord| c.row as usize * cols as usize + c.col as usize;
    let mut queued = vec![false; cols as usize * rows as usize];
    let mut queue = VecDeque::new();

    let start_row = water_row.max(0);
    let edge_seeds = (start_row..rows)
        .flat_map(|row| [CellCoord::new(0, row), CellCoord::new(cols - 1, row)])
        .chain((0..cols).map(|col| CellCoord::new(col, rows - 1)));
    for seed in edge_seeds {
        if fillable(grid, seed) && !queued[idx(seed)] {
            queued[idx(seed)] = true;
            queue.push_back(seed);
        }
    }

    let mut filled = Vec::new();
    while let Some(cell) = queue.pop_front() {
        if !fillable(grid, cell) {
            continue;
        }
        if grid.set(cell, BlockType::Water, false).is_err() {
            continue;
        }
        filled.push(cell);
        for n in cell.neighbors4() {
            if grid.contains(n) && !queued[idx(n)] && fillable(grid, n) {
                queued[idx(n)] = true;
                queue.push_back(n);
            }
        }
    }

    tracing::debug!(cells = filled.len(), "ocean seeded");
    filled
}
