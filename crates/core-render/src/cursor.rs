//! Cursor geometry.
//!
//! Two halves around the measurement pass:
//! 1. `query` reads the selection model for cursors whose range intersects
//!    the rendered rows and requests the columns it will need.
//! 2. `compute` turns cached positions into pixel rectangles.
//!
//! A cursor before the end of its line is one column wide and sized by the
//! measured advance of the glyph under it (so a double-width glyph yields a
//! double-width block). A cursor at the end of the line has zero width.

use crate::error::{RenderError, Result};
use crate::measurements::Measurements;
use crate::pending::PendingMeasurements;
use crate::position_cache::HorizontalPositionCache;
use crate::tree::RenderedRows;
use core_model::{DisplayModel, MarkerFilter, MarkerId, Point, SelectionModel};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CursorRenderState {
    pub screen_position: Point,
    /// 0 at end of line, else 1.
    pub column_width: u32,
    pub pixel_top: f64,
    pub pixel_left: f64,
    pub pixel_width: f64,
}

/// Hidden text-input placement, relative to the scroller's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HiddenInputPosition {
    pub pixel_top: f64,
    pub pixel_left: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueriedCursor {
    marker: MarkerId,
    position: Point,
    column_width: u32,
}

#[derive(Debug, Default)]
pub struct CursorGeometry {
    queried: Vec<QueriedCursor>,
    primary: Option<usize>,
}

impl CursorGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queried.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queried.is_empty()
    }

    /// Collect cursors in `[start_row, end_row)` and request their columns.
    pub fn query<D, S>(
        &mut self,
        display: &D,
        selections: &S,
        start_row: u32,
        end_row: u32,
        pending: &mut PendingMeasurements,
    ) where
        D: DisplayModel + ?Sized,
        S: SelectionModel + ?Sized,
    {
        self.queried.clear();
        self.primary = None;
        if end_row <= start_row {
            return;
        }
        let primary_marker = selections.last_cursor_marker();
        let filter = MarkerFilter::intersecting_rows(start_row, end_row - 1);
        for marker in selections.find_markers(&filter) {
            let Some(head) = selections.head_screen_position(marker) else {
                continue;
            };
            if head.row < start_row || head.row >= end_row {
                continue;
            }
            let line_length = display.line_length_for_screen_row(head.row);
            let column = if head.column > line_length {
                tracing::debug!(
                    target: "render.engine",
                    row = head.row,
                    column = head.column,
                    line_length,
                    "cursor_column_clamped"
                );
                line_length
            } else {
                head.column
            };
            let column_width = u32::from(column < line_length);
            pending.request(head.row, column);
            if column_width == 1 {
                pending.request(head.row, column + 1);
            }
            if Some(marker) == primary_marker {
                self.primary = Some(self.queried.len());
            }
            self.queried.push(QueriedCursor {
                marker,
                position: Point::new(head.row, column),
                column_width,
            });
        }
    }

    /// Pixel rectangles for the queried cursors, in query order.
    pub fn compute(
        &self,
        cache: &HorizontalPositionCache,
        rendered: &RenderedRows,
        m: &Measurements,
    ) -> Result<Vec<CursorRenderState>> {
        self.queried
            .iter()
            .map(|c| {
                let Point { row, column } = c.position;
                let line = rendered.get(row).ok_or(RenderError::StaleLine { row })?;
                let position = |column| {
                    cache
                        .get(line.id(), column)
                        .ok_or(RenderError::MissingPosition { row, column })
                };
                let pixel_left = position(column)?;
                let pixel_width = if c.column_width == 1 {
                    position(column + 1)? - pixel_left
                } else {
                    0.0
                };
                Ok(CursorRenderState {
                    screen_position: c.position,
                    column_width: c.column_width,
                    pixel_top: m.pixel_top_for_row(row),
                    pixel_left,
                    pixel_width,
                })
            })
            .collect()
    }

    /// Index into the `compute` output of the primary cursor, if it is rendered.
    pub fn primary_index(&self) -> Option<usize> {
        self.primary
    }
}

/// Place the hidden input at the primary cursor, clamped inside the scroller.
pub fn hidden_input_position(cursor: &CursorRenderState, m: &Measurements) -> HiddenInputPosition {
    let max_top = (m.scroller_height - m.line_height).max(0.0);
    let max_left = (m.scroller_width - m.base_character_width).max(0.0);
    HiddenInputPosition {
        pixel_top: (cursor.pixel_top - m.scroll_top).clamp(0.0, max_top),
        pixel_left: (cursor.pixel_left - m.scroll_left).clamp(0.0, max_left),
    }
}
