use tidefall_common::{Block, BlockType, CellCoord};

use crate::grid::Grid;

/// What the presentation layer currently shows for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellVisual {
    pub kind: BlockType,
    pub lit: bool,
}

impl CellVisual {
    pub fn of(block: &Block) -> Self {
        Self {
            kind: block.kind(),
            lit: block.is_lit(),
        }
    }
}

/// Presentation mirror of the grid.
///
/// Updated either directly (generation, placement, destruction, water) or by
/// the scheduler when an animation completes. It may lag the grid but never
/// holds a state the grid is not heading towards.
#[derive(Debug, Clone)]
pub struct RenderCache {
    cols: u32,
    rows: u32,
    cells: Vec<CellVisual>,
}

impl RenderCache {
    /// Build a cache that mirrors `grid` exactly.
    pub fn from_grid(grid: &Grid) -> Self {
        let mut cache = Self {
            cols: grid.cols(),
            rows: grid.rows(),
            cells: Vec::with_capacity(grid.cols() as usize * grid.rows() as usize),
        };
        cache.rebuild(grid);
        cache
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    fn index(&self, coord: CellCoord) -> Option<usize> {
        if coord.col < 0
            || coord.row < 0
            || coord.col as u32 >= self.cols
            || coord.row as u32 >= self.rows
        {
            return None;
        }
        Some(coord.row as usize * self.cols as usize + coord.col as usize)
    }

    pub fn get(&self, coord: CellCoord) -> Option<CellVisual> {
        self.index(coord).map(|i| self.cells[i])
    }

    /// Replace every entry with the grid's current state.
    pub fn rebuild(&mut self, grid: &Grid) {
        self.cells.clear();
        self.cells
            .extend(grid.iter().map(|(_, block)| CellVisual::of(block)));
    }

    /// Copy one cell's current grid state into the cache.
    pub fn commit(&mut self, coord: CellCoord, grid: &Grid) {
        let (Some(idx), Ok(block)) = (self.index(coord), grid.get(coord)) else {
            return;
        };
        self.cells[idx] = CellVisual::of(block);
    }

    /// Cells where the cache and the grid disagree.
    pub fn diverged_cells(&self, grid: &Grid) -> Vec<CellCoord> {
        grid.iter()
            .zip(self.cells.iter())
            .filter(|((_, block), visual)| CellVisual::of(block) != **visual)
            .map(|((coord, _), _)| coord)
            .collect()
    }

    /// Row-major iteration over `(coord, visual)`.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, CellVisual)> + '_ {
        let cols = self.cols as i32;
        self.cells.iter().enumerate().map(move |(i, v)| {
            let i = i as i32;
            (CellCoord::new(i % cols, i / cols), *v)
        })
    }
}
