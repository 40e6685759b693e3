//! Directional light: a source sweeping above the world casts a fan of rays
//! and proposes "become lit" for every non-air cell a ray touches.
//!
//! A pass never proposes unlighting. Clearing light is a separate explicit
//! operation ([`Grid::reset_lighting`]) used at generation time.

use std::collections::BTreeSet;
use std::f32::consts::PI;

use glam::Vec2;
use tidefall_common::{Block, CellCoord};

use crate::config::LightingConfig;
use crate::grid::Grid;

/// Below this magnitude a direction component is treated as exactly zero so
/// a straight-down ray stays in its column.
const AXIS_EPSILON: f32 = 1.0e-6;

/// A request to change a cell's lit state. Lighting passes only ever emit
/// `lit: true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightProposal {
    pub coord: CellCoord,
    pub lit: bool,
}

/// Unit directions of a fan of `count` rays over the downward half-circle.
///
/// Angles are spread evenly strictly between horizontal-right and
/// horizontal-left, so one ray points straight down. Screen space: +y is down.
pub fn ray_directions(count: u32) -> Vec<Vec2> {
    let count = count.max(1);
    (0..count)
        .map(|i| {
            let angle = PI * (i + 1) as f32 / (count + 1) as f32;
            let dir = Vec2::new(angle.cos(), angle.sin());
            Vec2::new(
                if dir.x.abs() < AXIS_EPSILON { 0.0 } else { dir.x },
                dir.y,
            )
        })
        .collect()
}

/// Cast the fan from one source column. Proposals are deduplicated within
/// the call and cells already lit are skipped.
pub fn cast_from(grid: &Grid, config: &LightingConfig, source_col: i32) -> Vec<LightProposal> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    cast_fan(grid, config, source_col, &mut seen, &mut out);
    out
}

/// Cast from every sweep position across the world in one pass.
pub fn full_sweep(grid: &Grid, config: &LightingConfig) -> Vec<LightProposal> {
    let _span = tracing::info_span!("light_full_sweep").entered();
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    let step = config.sweep_step.max(1) as usize;
    for col in (0..grid.cols() as i32).step_by(step) {
        cast_fan(grid, config, col, &mut seen, &mut out);
    }
    tracing::debug!(proposals = out.len(), "full sweep cast");
    out
}

fn cast_fan(
    grid: &Grid,
    config: &LightingConfig,
    source_col: i32,
    seen: &mut BTreeSet<CellCoord>,
    out: &mut Vec<LightProposal>,
) {
    let origin = Vec2::new(
        source_col as f32 + 0.5,
        -(config.light_height as f32) + 0.5,
    );
    for dir in ray_directions(config.ray_count) {
        cast_ray(grid, origin, dir, config.max_ray_length, seen, out);
    }
}

/// Integer grid traversal from `origin` along `dir`, one cell per step.
///
/// Cells above row 0 are open sky. The ray stops on an opaque block, when it
/// leaves the grid sideways or through the floor, or after `max_len` cells.
fn cast_ray(
    grid: &Grid,
    origin: Vec2,
    dir: Vec2,
    max_len: u32,
    seen: &mut BTreeSet<CellCoord>,
    out: &mut Vec<LightProposal>,
) {
    if !origin.is_finite() || !dir.is_finite() || dir.y <= 0.0 {
        tracing::warn!(?origin, ?dir, "skipping malformed light ray");
        return;
    }
    let cols = grid.cols() as i32;
    let rows = grid.rows() as i32;

    let mut cell_x = origin.x.floor() as i32;
    let mut cell_y = origin.y.floor() as i32;

    let step_x = if dir.x > 0.0 {
        1
    } else if dir.x < 0.0 {
        -1
    } else {
        0
    };
    let (mut t_max_x, t_delta_x) = match step_x {
        1 => ((cell_x as f32 + 1.0 - origin.x) / dir.x, 1.0 / dir.x),
        -1 => ((origin.x - cell_x as f32) / -dir.x, 1.0 / -dir.x),
        _ => (f32::INFINITY, f32::INFINITY),
    };
    let mut t_max_y = (cell_y as f32 + 1.0 - origin.y) / dir.y;
    let t_delta_y = 1.0 / dir.y;

    for _ in 0..max_len {
        if t_max_x < t_max_y {
            cell_x += step_x;
            t_max_x += t_delta_x;
        } else {
            cell_y += 1;
            t_max_y += t_delta_y;
        }

        if cell_x < 0 || cell_x >= cols || cell_y >= rows {
            return;
        }
        if cell_y < 0 {
            continue;
        }

        let coord = CellCoord::new(cell_x, cell_y);
        let Ok(Block::Solid(solid)) = grid.get(coord) else {
            continue;
        };
        if !solid.lit && seen.insert(coord) {
            out.push(LightProposal { coord, lit: true });
        }
        if solid.is_opaque() {
            return;
        }
    }
}

/// Incremental sweep state: the light source advances one position per call.
#[derive(Debug, Clone, Default)]
pub struct LightSweep {
    position: i32,
}

impl LightSweep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column the next cast will start from.
    pub fn position(&self) -> i32 {
        self.position
    }

    /// Cast from the current position, then move `sweep_step` columns right,
    /// wrapping at the world edge.
    pub fn advance(&mut self, grid: &Grid, config: &LightingConfig) -> Vec<LightProposal> {
        let cols = grid.cols() as i32;
        if cols == 0 {
            return Vec::new();
        }
        let proposals = cast_from(grid, config, self.position);
        self.position = (self.position + config.sweep_step.max(1) as i32) % cols;
        proposals
    }
}
