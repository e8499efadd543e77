//! Longest-line tracking for the horizontal scroll extent.
//!
//! Each cycle the display model is asked for its best-known longest screen row
//! (only meaningful over the rows it has indexed, so the index is extended to
//! the rendered range first). When the answer differs in identity from the
//! previous one, the line is probed: rendered off-screen if it is not tiled,
//! measured after the structural commit, and its width fed back into
//! `Measurements::scroll_width`.

use core_model::{DisplayModel, ScreenLine, ScreenLineId};
use std::sync::Arc;

/// A longest line awaiting measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongestLineProbe {
    pub row: u32,
    pub line: Arc<ScreenLine>,
}

#[derive(Debug, Default)]
pub struct LongestLineTracker {
    previous: Option<ScreenLineId>,
    probe: Option<LongestLineProbe>,
}

impl LongestLineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> Option<ScreenLineId> {
        self.previous
    }

    /// Line whose width is still unmeasured, if any.
    pub fn pending_probe(&self) -> Option<&LongestLineProbe> {
        self.probe.as_ref()
    }

    /// Refresh against the display model. Returns true when the longest line
    /// changed and needs measuring this cycle.
    pub fn query<D: DisplayModel + ?Sized>(&mut self, display: &mut D, rendered_end_row: u32) -> bool {
        display.populate_spatial_index_if_needed(u32::MAX, rendered_end_row);
        let total = display.approximate_screen_line_count();
        if total == 0 {
            self.previous = None;
            self.probe = None;
            return false;
        }
        let mut row = display.approximate_longest_screen_row();
        if row >= total {
            tracing::warn!(target: "render.longest_line", row, total, "longest_row_clamped");
            row = total - 1;
        }
        let Some(line) = display.screen_line_for_row(row) else {
            tracing::warn!(target: "render.longest_line", row, "longest_row_missing");
            return false;
        };
        if self.previous == Some(line.id) && self.probe.is_none() {
            return false;
        }
        tracing::debug!(
            target: "render.longest_line",
            row,
            id = line.id,
            previous = ?self.previous,
            "longest_line_changed"
        );
        self.previous = Some(line.id);
        self.probe = Some(LongestLineProbe { row, line });
        true
    }

    /// Clear the pending probe once its width has been read.
    pub fn mark_measured(&mut self) {
        self.probe = None;
    }

    /// Forget the previous line so the next query re-measures (character
    /// metrics changed).
    pub fn force_remeasure(&mut self) {
        self.previous = None;
    }
}
