use tidefall_common::{Block, BlockType, CellCoord};

/// Grid access failures. Out-of-bounds is an expected condition every caller
/// checks, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("cell ({col}, {row}) is outside the grid")]
    OutOfBounds { col: i32, row: i32 },
}

/// The authoritative `cols x rows` cell array.
///
/// Allocated once; the dimensions never change afterwards. Cells are stored
/// row-major so a linear walk is the settlement scan order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    cols: u32,
    rows: u32,
    cells: Vec<Block>,
}

impl Grid {
    /// Create an all-air grid.
    pub fn new(cols: u32, rows: u32) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Block::Air; cols as usize * rows as usize],
        }
    }

    /// Width in cells.
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Height in cells.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Index of the bottom row. The floor always counts as support.
    pub fn floor_row(&self) -> i32 {
        self.rows as i32 - 1
    }

    /// True if `coord` lies inside the grid.
    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.col >= 0
            && coord.row >= 0
            && (coord.col as u32) < self.cols
            && (coord.row as u32) < self.rows
    }

    fn index(&self, coord: CellCoord) -> Result<usize, GridError> {
        if !self.contains(coord) {
            return Err(GridError::OutOfBounds {
                col: coord.col,
                row: coord.row,
            });
        }
        Ok(coord.row as usize * self.cols as usize + coord.col as usize)
    }

    /// Block at `coord`.
    pub fn get(&self, coord: CellCoord) -> Result<&Block, GridError> {
        let idx = self.index(coord)?;
        Ok(&self.cells[idx])
    }

    /// Mutable block at `coord`, for in-place edits such as damage or lit.
    pub fn get_mut(&mut self, coord: CellCoord) -> Result<&mut Block, GridError> {
        let idx = self.index(coord)?;
        Ok(&mut self.cells[idx])
    }

    /// Type of the block at `coord`.
    pub fn get_type(&self, coord: CellCoord) -> Result<BlockType, GridError> {
        self.get(coord).map(Block::kind)
    }

    /// Overwrite a cell with a fresh block of `kind`.
    ///
    /// Air clears the cell to the sentinel; any other type gets a new record
    /// at its base durability (water is unbounded).
    pub fn set(
        &mut self,
        coord: CellCoord,
        kind: BlockType,
        player_placed: bool,
    ) -> Result<(), GridError> {
        let idx = self.index(coord)?;
        self.cells[idx] = Block::new(kind, player_placed);
        Ok(())
    }

    /// Write a complete block record, preserving its hp and flags.
    pub fn put(&mut self, coord: CellCoord, block: Block) -> Result<(), GridError> {
        let idx = self.index(coord)?;
        self.cells[idx] = block;
        Ok(())
    }

    /// True if the cell is in bounds and holds structural material.
    pub fn is_structural(&self, coord: CellCoord) -> bool {
        self.get(coord).is_ok_and(Block::is_structural)
    }

    pub fn is_air(&self, coord: CellCoord) -> bool {
        self.get(coord).is_ok_and(Block::is_air)
    }

    pub fn is_water(&self, coord: CellCoord) -> bool {
        self.get(coord).is_ok_and(Block::is_water)
    }

    /// All coordinates in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = CellCoord> + use<> {
        let cols = self.cols as i32;
        let rows = self.rows as i32;
        (0..rows).flat_map(move |row| (0..cols).map(move |col| CellCoord::new(col, row)))
    }

    /// Row-major iteration over `(coord, block)`.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, &Block)> {
        self.coords().zip(self.cells.iter())
    }

    pub fn count(&self, kind: BlockType) -> usize {
        self.cells.iter().filter(|b| b.kind() == kind).count()
    }

    /// Clear the lit flag on every cell.
    pub fn reset_lighting(&mut self) {
        for block in &mut self.cells {
            if let Some(solid) = block.solid_mut() {
                solid.lit = false;
            }
        }
    }
}
