//! Gravity settlement: find 4-connected chunks of structural material that
//! rest on nothing and drop each one as a rigid body.

use std::collections::VecDeque;

use tidefall_common::{Block, CellCoord, ProtectedRegion};

use crate::grid::Grid;

/// One cell of a chunk that moved, for the presentation scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallProposal {
    pub column: i32,
    pub row_start: i32,
    pub row_end: i32,
    pub block: Block,
}

impl FallProposal {
    pub fn from(&self) -> CellCoord {
        CellCoord::new(self.column, self.row_start)
    }

    pub fn to(&self) -> CellCoord {
        CellCoord::new(self.column, self.row_end)
    }
}

/// Outcome of a settlement run.
#[derive(Debug, Clone, Default)]
pub struct SettleReport {
    pub passes: u32,
    pub chunks_moved: usize,
    /// True when the run stopped at the pass cap with the last pass still
    /// moving material.
    pub hit_pass_cap: bool,
    pub proposals: Vec<FallProposal>,
}

/// Run settlement passes until one moves nothing or `max_passes` is reached.
///
/// The grid is rewritten in place; the returned proposals describe every
/// member cell that moved, in the order it was moved.
pub fn settle(grid: &mut Grid, protected: &[ProtectedRegion], max_passes: u32) -> SettleReport {
    let _span = tracing::info_span!("gravity_settle").entered();
    let mut report = SettleReport::default();

    while report.passes < max_passes {
        report.passes += 1;
        let moved = settle_pass(grid, protected, &mut report.proposals);
        report.chunks_moved += moved;
        if moved == 0 {
            tracing::debug!(
                passes = report.passes,
                chunks = report.chunks_moved,
                "settlement converged"
            );
            return report;
        }
    }

    report.hit_pass_cap = true;
    tracing::info!(
        passes = report.passes,
        chunks = report.chunks_moved,
        "settlement stopped at pass cap"
    );
    report
}

/// One full scan: every currently unsupported chunk moves at most once.
/// Returns the number of chunks moved.
pub fn settle_pass(
    grid: &mut Grid,
    protected: &[ProtectedRegion],
    proposals: &mut Vec<FallProposal>,
) -> usize {
    let is_protected = |c: CellCoord| protected.iter().any(|r| r.contains(c));
    let cols = grid.cols() as usize;
    let idx = |c: CellCoord| c.row as usize * cols + c.col as usize;

    // 0 = unvisited, otherwise the 1-based id of the chunk that claimed it.
    let mut labels = vec![0u32; cols * grid.rows() as usize];
    let mut next_id = 0u32;
    let mut moved = 0;

    let scan: Vec<CellCoord> = grid.coords().collect();
    for start in scan {
        if labels[idx(start)] != 0 || !grid.is_structural(start) || is_protected(start) {
            continue;
        }
        next_id += 1;
        let id = next_id;
        let members = collect_chunk(grid, start, id, &mut labels, &is_protected);

        if is_supported(grid, &members, |c| labels[idx(c)] == id) {
            continue;
        }

        let distance = fall_distance(grid, &members, |c| labels[idx(c)] == id, &is_protected);
        if distance <= 0 {
            continue;
        }

        drop_chunk(grid, &members, distance, proposals);
        tracing::debug!(
            origin = %start,
            size = members.len(),
            distance,
            "chunk fell"
        );
        moved += 1;
    }
    moved
}

/// Breadth-first flood over 4-connected structural, unprotected cells.
fn collect_chunk(
    grid: &Grid,
    start: CellCoord,
    id: u32,
    labels: &mut [u32],
    is_protected: &impl Fn(CellCoord) -> bool,
) -> Vec<CellCoord> {
    let cols = grid.cols() as usize;
    let idx = |c: CellCoord| c.row as usize * cols + c.col as usize;

    let mut members = Vec::new();
    let mut queue = VecDeque::from([start]);
    labels[idx(start)] = id;

    while let Some(cell) = queue.pop_front() {
        members.push(cell);
        for n in cell.neighbors4() {
            if !grid.contains(n) || labels[idx(n)] != 0 {
                continue;
            }
            if grid.is_structural(n) && !is_protected(n) {
                labels[idx(n)] = id;
                queue.push_back(n);
            }
        }
    }
    members
}

fn is_supported(grid: &Grid, members: &[CellCoord], is_member: impl Fn(CellCoord) -> bool) -> bool {
    let floor = grid.floor_row();
    members.iter().any(|&m| {
        if m.row >= floor {
            return true;
        }
        let below = m.below();
        !is_member(below) && grid.is_structural(below)
    })
}

/// Minimum over members of the free cells beneath each one. Other members
/// are passable because the chunk moves as a unit.
fn fall_distance(
    grid: &Grid,
    members: &[CellCoord],
    is_member: impl Fn(CellCoord) -> bool,
    is_protected: &impl Fn(CellCoord) -> bool,
) -> i32 {
    let floor = grid.floor_row();
    let mut min = i32::MAX;
    for &m in members {
        let mut d = 0;
        loop {
            let next = m.offset_rows(d + 1);
            if next.row > floor {
                break;
            }
            if !is_member(next) && (grid.is_structural(next) || is_protected(next)) {
                break;
            }
            d += 1;
            if d >= min {
                break;
            }
        }
        min = min.min(d);
        if min == 0 {
            return 0;
        }
    }
    if min == i32::MAX { 0 } else { min }
}

fn drop_chunk(
    grid: &mut Grid,
    members: &[CellCoord],
    distance: i32,
    proposals: &mut Vec<FallProposal>,
) {
    let mut lifted: Vec<(CellCoord, Block)> = members
        .iter()
        .filter_map(|&c| grid.get(c).ok().map(|b| (c, *b)))
        .collect();

    for (c, _) in &lifted {
        let _ = grid.put(*c, Block::Air);
    }

    // Bottom-up so no member lands on a cell that still has to be read.
    lifted.sort_by(|a, b| b.0.row.cmp(&a.0.row).then(a.0.col.cmp(&b.0.col)));
    for (c, block) in lifted {
        let target = c.offset_rows(distance);
        if grid.put(target, block).is_ok() {
            proposals.push(FallProposal {
                column: c.col,
                row_start: c.row,
                row_end: target.row,
                block,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidefall_common::BlockType;

    fn fill_row(grid: &mut Grid, row: i32, cols: std::ops::Range<i32>, kind: BlockType) {
        for col in cols {
            grid.set(CellCoord::new(col, row), kind, false).unwrap();
        }
    }

    #[test]
    fn floating_platform_falls_to_floor_in_one_pass() {
        let mut grid = Grid::new(7, 10);
        fill_row(&mut grid, 3, 2..5, BlockType::Stone);
        let depth = grid.floor_row() - 3;

        let mut proposals = Vec::new();
        let moved = settle_pass(&mut grid, &[], &mut proposals);

        assert_eq!(moved, 1);
        assert_eq!(proposals.len(), 3);
        for p in &proposals {
            assert_eq!(p.row_end - p.row_start, depth);
        }
        for col in 2..5 {
            assert_eq!(
                grid.get_type(CellCoord::new(col, grid.floor_row())).unwrap(),
                BlockType::Stone
            );
            assert!(grid.is_air(CellCoord::new(col, 3)));
        }
    }

    #[test]
    fn settled_grid_produces_no_moves() {
        let mut grid = Grid::new(6, 6);
        fill_row(&mut grid, 5, 0..6, BlockType::Stone);
        fill_row(&mut grid, 4, 1..3, BlockType::Dirt);

        let report = settle(&mut grid, &[], 16);
        assert_eq!(report.chunks_moved, 0);
        assert_eq!(report.passes, 1);
        assert!(report.proposals.is_empty());

        let again = settle(&mut grid, &[], 16);
        assert_eq!(again.chunks_moved, 0);
    }

    #[test]
    fn chunk_stops_on_nearest_obstacle_under_any_member() {
        let mut grid = Grid::new(5, 10);
        fill_row(&mut grid, 9, 0..5, BlockType::Stone);
        // pillar under column 3 reaching row 6
        for row in 6..9 {
            grid.set(CellCoord::new(3, row), BlockType::Stone, false).unwrap();
        }
        // floating beam from col 1..4 at row 2 (col 3 over the pillar)
        fill_row(&mut grid, 2, 1..4, BlockType::Wood);

        let report = settle(&mut grid, &[], 8);
        assert_eq!(report.chunks_moved, 1);
        // rigid: lands on the pillar top at row 5
        for col in 1..4 {
            assert_eq!(
                grid.get_type(CellCoord::new(col, 5)).unwrap(),
                BlockType::Wood
            );
        }
        assert!(grid.is_air(CellCoord::new(1, 8)));
    }

    #[test]
    fn chunk_falls_through_water() {
        let mut grid = Grid::new(3, 6);
        grid.set(CellCoord::new(1, 0), BlockType::Sand, false).unwrap();
        for row in 3..6 {
            grid.set(CellCoord::new(1, row), BlockType::Water, false).unwrap();
        }
        settle(&mut grid, &[], 4);
        assert_eq!(grid.get_type(CellCoord::new(1, 5)).unwrap(), BlockType::Sand);
    }

    #[test]
    fn protected_region_blocks_membership_and_falls() {
        let mut grid = Grid::new(9, 10);
        fill_row(&mut grid, 2, 3..6, BlockType::Stone);
        // Protected disc directly under the platform.
        let region = ProtectedRegion::new(CellCoord::new(4, 5), 1.0);

        let report = settle(&mut grid, &[region], 8);
        assert_eq!(report.chunks_moved, 1);
        // Column 4 hits the protected cell at row 4 first, so the platform
        // stops at row 3.
        for col in 3..6 {
            assert_eq!(
                grid.get_type(CellCoord::new(col, 3)).unwrap(),
                BlockType::Stone
            );
        }
    }

    #[test]
    fn protected_cells_never_join_a_chunk() {
        let mut grid = Grid::new(5, 8);
        grid.set(CellCoord::new(2, 1), BlockType::Brick, false).unwrap();
        let region = ProtectedRegion::new(CellCoord::new(2, 1), 0.5);

        let report = settle(&mut grid, &[region], 8);
        assert_eq!(report.chunks_moved, 0);
        assert_eq!(grid.get_type(CellCoord::new(2, 1)).unwrap(), BlockType::Brick);
    }

    #[test]
    fn stacked_chunk_keeps_its_shape_and_records_every_member() {
        let mut grid = Grid::new(4, 8);
        let original = [
            (CellCoord::new(1, 0), BlockType::Stone),
            (CellCoord::new(1, 1), BlockType::Dirt),
            (CellCoord::new(2, 1), BlockType::Grass),
        ];
        for (c, k) in original {
            grid.set(c, k, false).unwrap();
        }

        let report = settle(&mut grid, &[], 4);
        assert_eq!(report.proposals.len(), 3);
        assert_eq!(grid.get_type(CellCoord::new(1, 6)).unwrap(), BlockType::Stone);
        assert_eq!(grid.get_type(CellCoord::new(1, 7)).unwrap(), BlockType::Dirt);
        assert_eq!(grid.get_type(CellCoord::new(2, 7)).unwrap(), BlockType::Grass);
        for p in &report.proposals {
            assert_eq!(grid.get(p.to()).unwrap().kind(), p.block.kind());
        }
    }

    #[test]
    fn separate_chunks_fall_independently() {
        let mut grid = Grid::new(6, 8);
        grid.set(CellCoord::new(0, 1), BlockType::Stone, false).unwrap();
        grid.set(CellCoord::new(4, 3), BlockType::Stone, false).unwrap();

        let report = settle(&mut grid, &[], 4);
        assert_eq!(report.chunks_moved, 2);
        assert!(grid.is_structural(CellCoord::new(0, 7)));
        assert!(grid.is_structural(CellCoord::new(4, 7)));
    }

    #[test]
    fn hp_survives_the_fall() {
        let mut grid = Grid::new(2, 4);
        let c = CellCoord::new(0, 0);
        grid.set(c, BlockType::Wood, true).unwrap();
        grid.get_mut(c).unwrap().solid_mut().unwrap().damage(10.0);

        settle(&mut grid, &[], 4);
        let landed = grid.get(CellCoord::new(0, 3)).unwrap().solid().unwrap();
        assert_eq!(landed.hp(), Some(50.0));
        assert!(landed.player_placed);
    }
}
