use glam::{IVec2, UVec2};
use tidefall_common::{BlockType, CellCoord};
use tidefall_kernel::{TaskVisual, World};

/// Which layer the debug renderer draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// One glyph per block type.
    #[default]
    Blocks,
    /// Lit cells as `o`, unlit cells as `.`, air blank.
    Light,
}

/// Rectangle of cells to draw.
#[derive(Debug, Clone, Copy)]
pub struct RenderView {
    /// Top-left cell (column, row).
    pub origin: IVec2,
    /// Width and height in cells.
    pub size: UVec2,
    pub mode: RenderMode,
    /// Overlay running animations on top of the cache.
    pub show_animations: bool,
}

impl RenderView {
    /// A view covering the whole world.
    pub fn whole(world: &World) -> Self {
        Self {
            origin: IVec2::ZERO,
            size: UVec2::new(world.grid().cols(), world.grid().rows()),
            ..Self::default()
        }
    }

    fn contains(&self, c: CellCoord) -> bool {
        let rel = IVec2::new(c.col, c.row) - self.origin;
        rel.x >= 0 && rel.y >= 0 && (rel.x as u32) < self.size.x && (rel.y as u32) < self.size.y
    }
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            origin: IVec2::ZERO,
            size: UVec2::new(80, 40),
            mode: RenderMode::Blocks,
            show_animations: false,
        }
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// A renderer reads the world and a view, then produces output. It never
/// mutates the world.
pub trait Renderer {
    type Output;

    fn render(&self, world: &World, view: &RenderView) -> Self::Output;
}

pub fn glyph(kind: BlockType) -> char {
    match kind {
        BlockType::Air => ' ',
        BlockType::Grass => ',',
        BlockType::Dirt => '%',
        BlockType::Stone => '#',
        BlockType::Sand => ':',
        BlockType::Water => '~',
        BlockType::Wood => '|',
        BlockType::Leaves => '*',
        BlockType::Glass => '+',
        BlockType::Brick => '=',
    }
}

/// Text renderer for the CLI, logs and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, world: &World, view: &RenderView) -> String {
        let cache = world.render_cache();
        let width = view.size.x as usize;
        let height = view.size.y as usize;
        let mut canvas = vec![vec![' '; width]; height];

        for (y, line) in canvas.iter_mut().enumerate() {
            for (x, ch) in line.iter_mut().enumerate() {
                let coord = CellCoord::new(view.origin.x + x as i32, view.origin.y + y as i32);
                let Some(visual) = cache.get(coord) else {
                    continue;
                };
                *ch = match view.mode {
                    RenderMode::Blocks => glyph(visual.kind),
                    RenderMode::Light if visual.kind == BlockType::Air => ' ',
                    RenderMode::Light if visual.lit => 'o',
                    RenderMode::Light => '.',
                };
            }
        }

        if view.show_animations {
            let mut overlay = |c: CellCoord, ch: char| {
                if view.contains(c) {
                    let x = (c.col - view.origin.x) as usize;
                    let y = (c.row - view.origin.y) as usize;
                    canvas[y][x] = ch;
                }
            };
            for visual in world.scheduler().visuals() {
                match visual {
                    TaskVisual::Fall { from, offset, .. } => {
                        overlay(from.offset_rows(offset.floor() as i32), 'v');
                    }
                    TaskVisual::Flash { coord, alpha } if alpha > 0.5 => overlay(coord, '@'),
                    TaskVisual::Flash { .. } => {}
                    TaskVisual::Swell { coord, .. } => overlay(coord, '^'),
                }
            }
        }

        let mut out = format!(
            "=== tick={} seed={} view=({}, {}) {}x{} ===\n",
            world.tick(),
            world.seed(),
            view.origin.x,
            view.origin.y,
            view.size.x,
            view.size.y
        );
        for line in canvas {
            out.extend(line.into_iter());
            out.push('\n');
        }
        tracing::trace!(bytes = out.len(), "debug frame rendered");
        out
    }
}
