//! Rendering adapter: renderer-agnostic interface.
//!
//! # Invariants
//! - Renderers never mutate world truth.
//! - Renderers read the render cache and the scheduler's active visuals,
//!   never the grid directly, so they show exactly what presentation has
//!   committed.

mod renderer;

pub use renderer::{DebugTextRenderer, RenderMode, RenderView, Renderer, glyph};
