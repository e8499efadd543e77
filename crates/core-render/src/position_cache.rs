//! Horizontal pixel position cache.
//!
//! Maps `ScreenLineId -> (column -> line-relative pixel offset)`. The cache is
//! the only writer of positions and only grows while a line stays rendered;
//! a line's map is discarded when the line leaves the render set
//! (`evict_except`) or when character metrics change (`clear`).
//!
//! `measure` resolves a batch of pending requests against committed nodes in a
//! single sorted sweep per row: columns ascending, text runs ascending, so the
//! cost is O(runs + columns) rather than O(runs * columns).
//!
//! Invariants:
//! * Column 0 is 0 and never queries the surface.
//! * Existing entries are never overwritten.

use crate::error::{RenderError, Result};
use crate::pending::PendingMeasurements;
use crate::surface::{RenderSurface, TextRunHandle};
use crate::tree::RenderedRows;
use ahash::{AHashMap, AHashSet};
use core_model::ScreenLineId;

/// Per-call accounting, folded into the engine metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeasureStats {
    pub rows: u64,
    /// New entries written (including free column-0 entries).
    pub measured: u64,
    /// Requests answered from the cache.
    pub cache_hits: u64,
    /// Surface range queries issued.
    pub surface_queries: u64,
    /// Columns past the last text run; left unmeasured.
    pub out_of_range: u64,
}

#[derive(Debug, Default)]
pub struct HorizontalPositionCache {
    lines: AHashMap<ScreenLineId, AHashMap<u32, f64>>,
}

impl HorizontalPositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ScreenLineId, column: u32) -> Option<f64> {
        self.lines.get(&id).and_then(|cols| cols.get(&column)).copied()
    }

    pub fn line_entry_count(&self, id: ScreenLineId) -> usize {
        self.lines.get(&id).map_or(0, |m| m.len())
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Drop every line not in `keep`. Returns the number of lines evicted.
    pub fn evict_except(&mut self, keep: &AHashSet<ScreenLineId>) -> usize {
        let before = self.lines.len();
        self.lines.retain(|id, _| keep.contains(id));
        before - self.lines.len()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn measure<R: RenderSurface + ?Sized>(
        &mut self,
        pending: &PendingMeasurements,
        rendered: &RenderedRows,
        surface: &R,
    ) -> Result<MeasureStats> {
        let mut stats = MeasureStats::default();
        for (row, columns) in pending.iter() {
            let tree = rendered.get(row).ok_or(RenderError::StaleLine { row })?;
            let id = tree.id();
            let line = surface
                .line_handle(id)
                .ok_or(RenderError::StaleScreenLine { id })?;
            let positions = self.lines.entry(id).or_default();
            let runs = tree.text_runs();
            let mut line_left: Option<f64> = None;
            let mut run_index = 0usize;
            let before = stats;
            stats.rows += 1;

            for &column in columns {
                if positions.contains_key(&column) {
                    stats.cache_hits += 1;
                    continue;
                }
                if column == 0 {
                    positions.insert(0, 0.0);
                    stats.measured += 1;
                    continue;
                }
                while run_index < runs.len() && column > runs[run_index].char_end() {
                    run_index += 1;
                }
                let Some(run) = runs.get(run_index) else {
                    stats.out_of_range += 1;
                    continue;
                };
                let handle = TextRunHandle {
                    line,
                    run: run_index,
                };
                let stale = RenderError::StaleScreenLine { id };
                let client_x = if column == run.char_start {
                    surface.range_client_rect(&handle, 0, 1).ok_or(stale)?.left
                } else {
                    surface
                        .range_client_rect(&handle, 0, column - run.char_start)
                        .ok_or(stale)?
                        .right
                };
                stats.surface_queries += 1;
                let left = match line_left {
                    Some(left) => left,
                    None => {
                        let left = surface
                            .line_client_left(line)
                            .ok_or(RenderError::StaleScreenLine { id })?;
                        line_left = Some(left);
                        left
                    }
                };
                positions.insert(column, (client_x - left).round());
                stats.measured += 1;
            }
            tracing::trace!(
                target: "render.measure",
                row,
                line = id,
                measured = stats.measured - before.measured,
                queries = stats.surface_queries - before.surface_queries,
                hits = stats.cache_hits - before.cache_hits,
                "row_measured"
            );
        }
        if stats.out_of_range > 0 {
            tracing::debug!(target: "render.measure", out_of_range = stats.out_of_range, "columns_past_line_end");
        }
        Ok(stats)
    }
}
