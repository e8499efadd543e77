//! Rendering surface capability.
//!
//! The engine never touches real nodes. It hands a declarative `ViewTree` to
//! `commit`, reads layout through handles, then applies a position-only
//! `PositionPatch`. All structural writes of a cycle happen before any read,
//! and all reads before the position write.

use crate::cursor::{CursorRenderState, HiddenInputPosition};
use crate::tree::ViewTree;
use core_model::ScreenLineId;

/// Opaque handle of a committed line node. Stable for as long as the screen
/// line stays rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineHandle(pub u64);

/// A text run inside a committed line node (index into `LineTree::text_runs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRunHandle {
    pub line: LineHandle,
    pub run: usize,
}

/// Horizontal extent of a client rectangle, in absolute surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClientRect {
    pub left: f64,
    pub right: f64,
}

impl ClientRect {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }
}

/// Dimension reads taken at the start of a cycle when flagged stale.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfaceDimensions {
    pub scroller_width: f64,
    pub scroller_height: f64,
    pub line_height: f64,
    pub base_character_width: f64,
    pub double_width_character_width: f64,
    pub half_width_character_width: f64,
    pub korean_character_width: f64,
    pub line_number_gutter_width: f64,
}

/// Position-only update applied after the measurement pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionPatch {
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub scroll_width: f64,
    pub content_width: f64,
    pub cursors: Vec<CursorRenderState>,
    pub hidden_input: Option<HiddenInputPosition>,
}

pub trait RenderSurface {
    /// Structural commit. Lines that stay rendered keep their handles.
    fn commit(&mut self, tree: &ViewTree);

    fn line_handle(&self, id: ScreenLineId) -> Option<LineHandle>;

    /// Absolute left edge of a line node.
    fn line_client_left(&self, line: LineHandle) -> Option<f64>;

    /// Client rect of chars `[start, end)` of a text run, relative to the run.
    fn range_client_rect(&self, run: &TextRunHandle, start: u32, end: u32) -> Option<ClientRect>;

    /// Rendered width of a line's content.
    fn line_content_width(&self, line: LineHandle) -> Option<f64>;

    /// `None` while reads would be meaningless (detached, hidden, zero-sized).
    fn measure_dimensions(&self) -> Option<SurfaceDimensions>;

    fn commit_positions(&mut self, patch: &PositionPatch);
}
