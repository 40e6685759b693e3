use serde::{Deserialize, Serialize};

/// A cell coordinate in the world grid.
///
/// Row 0 is the top of the world; rows grow downward, so "below" is `row + 1`.
/// Coordinates are signed so neighbour arithmetic can step off the grid and be
/// rejected by the bounds check instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub col: i32,
    pub row: i32,
}

impl CellCoord {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    pub const fn below(self) -> Self {
        Self::new(self.col, self.row + 1)
    }

    pub const fn above(self) -> Self {
        Self::new(self.col, self.row - 1)
    }

    pub const fn left(self) -> Self {
        Self::new(self.col - 1, self.row)
    }

    pub const fn right(self) -> Self {
        Self::new(self.col + 1, self.row)
    }

    /// The four edge-adjacent neighbours: below, left, right, above.
    pub const fn neighbors4(self) -> [CellCoord; 4] {
        [self.below(), self.left(), self.right(), self.above()]
    }

    /// Offset by a signed row delta (used when rewriting falling cells).
    pub const fn offset_rows(self, delta: i32) -> Self {
        Self::new(self.col, self.row + delta)
    }
}

impl std::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// A circular region that gravity settlement must never move material into
/// or out of. Supplied by the structure/portal subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectedRegion {
    pub center: CellCoord,
    /// Radius in cells. A non-finite or negative radius protects nothing.
    pub radius: f32,
}

impl ProtectedRegion {
    pub fn new(center: CellCoord, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        if !self.radius.is_finite() || self.radius < 0.0 {
            return false;
        }
        let dx = (coord.col - self.center.col) as f32;
        let dy = (coord.row - self.center.row) as f32;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbours_are_edge_adjacent() {
        let c = CellCoord::new(4, 7);
        let n = c.neighbors4();
        assert!(n.contains(&CellCoord::new(4, 8)));
        assert!(n.contains(&CellCoord::new(3, 7)));
        assert!(n.contains(&CellCoord::new(5, 7)));
        assert!(n.contains(&CellCoord::new(4, 6)));
    }

    #[test]
    fn below_grows_row() {
        assert_eq!(CellCoord::new(0, 0).below(), CellCoord::new(0, 1));
        assert_eq!(CellCoord::new(2, 3).offset_rows(4), CellCoord::new(2, 7));
    }

    #[test]
    fn protected_region_is_a_disc() {
        let region = ProtectedRegion::new(CellCoord::new(10, 10), 2.0);
        assert!(region.contains(CellCoord::new(10, 10)));
        assert!(region.contains(CellCoord::new(12, 10)));
        assert!(!region.contains(CellCoord::new(12, 12)));
    }

    #[test]
    fn malformed_radius_protects_nothing() {
        let nan = ProtectedRegion::new(CellCoord::new(0, 0), f32::NAN);
        let neg = ProtectedRegion::new(CellCoord::new(0, 0), -1.0);
        assert!(!nan.contains(CellCoord::new(0, 0)));
        assert!(!neg.contains(CellCoord::new(0, 0)));
    }
}
