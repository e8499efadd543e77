//! Tiled text-view rendering engine.
//!
//! Turns a display model (screen lines carrying scope tags) and a selection
//! model (cursors) into a render tree, commits it to a `RenderSurface`, reads
//! glyph positions back from the committed nodes, and commits cursor and
//! scroll geometry in a second, position-only pass.
//!
//! Pipeline per update cycle (see `render_engine`):
//! 1. `viewport::TilePlan` picks the tiles covering the scroll position; tile
//!    slots are reused as the view scrolls.
//! 2. `scope_tree::build_line_tree` converts each screen line's tag codes into
//!    a nested scope/text-run tree (cached per `ScreenLineId`).
//! 3. `tree::assemble` lays out tiles, the line-number gutter, the off-screen
//!    measurement block and the cursor layer into a `ViewTree`.
//! 4. `longest_line::LongestLineTracker` keeps the horizontal scroll extent in
//!    step with the widest known line.
//! 5. `cursor::CursorGeometry` requests the columns it needs;
//!    `position_cache::HorizontalPositionCache` resolves them in one sweep per
//!    line and never re-measures a cached column.
//!
//! Scheduling (`scheduler`) coalesces change notifications into one cycle per
//! frame, or runs immediately in synchronous mode. `grid_surface` provides a
//! headless monospace surface and `writer` paints it to a terminal.
//!
//! Errors are reported through `RenderError`; a stale row or line handle fails
//! the cycle instead of being silently skipped.

pub mod cursor;
pub mod error;
pub mod grid_surface;
pub mod longest_line;
pub mod measurements;
pub mod metrics;
pub mod pending;
pub mod position_cache;
pub mod render_engine;
pub mod scheduler;
pub mod scope_tree;
pub mod surface;
pub mod timing;
pub mod tree;
pub mod viewport;
pub mod writer;

pub use cursor::{CursorGeometry, CursorRenderState, HiddenInputPosition};
pub use error::{RenderError, Result};
pub use grid_surface::{GridRow, GridSurface, SurfaceCountersSnapshot, TileSnapshot};
pub use measurements::Measurements;
pub use metrics::{RenderCycleMetrics, RenderCycleMetricsSnapshot};
pub use render_engine::{RenderEngine, ViewOptions};
pub use scheduler::{
    CountingFrameRequester, FrameRequester, ScheduleAction, SchedulerMetricsSnapshot,
    SchedulerState, UpdateScheduler,
};
pub use scope_tree::{LineTree, NodeKind, TextRun, build_line_tree};
pub use surface::{
    ClientRect, LineHandle, PositionPatch, RenderSurface, SurfaceDimensions, TextRunHandle,
};
pub use viewport::{Tile, TilePlan};
