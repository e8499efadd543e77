//! Viewport virtualization into fixed-height row tiles.
//!
//! Given scroll offset, scroller height, line height and the total screen-row
//! count, `TilePlan` derives the visible row range and the tiles covering it.
//! Tile slots are pure arithmetic: `(start_row / rows_per_tile) % tile_count`,
//! so a tile scrolling into view reuses the slot of the tile that scrolled out
//! and the number of live tile nodes never exceeds `visible_tile_count`.
//!
//! Guarantees:
//! * `visible_tile_count` depends only on scroller height, line height and
//!   rows per tile (always one spare tile for sub-tile offsets).
//! * Every row in `[first_visible_row, last_visible_row]` lies in exactly one
//!   planned tile.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub start_row: u32,
    pub row_count: u32,
    pub slot: usize,
}

impl Tile {
    pub fn end_row(&self) -> u32 {
        self.start_row + self.row_count
    }

    pub fn contains(&self, row: u32) -> bool {
        row >= self.start_row && row < self.end_row()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlan {
    pub total_rows: u32,
    pub rows_per_tile: u32,
    pub first_visible_row: u32,
    pub last_visible_row: u32,
    pub first_tile_start_row: u32,
    pub visible_tile_count: u32,
    pub last_tile_start_row: u32,
}

impl TilePlan {
    /// `None` for an empty document or a non-positive line height.
    pub fn compute(
        scroll_top: f64,
        scroller_height: f64,
        line_height: f64,
        total_rows: u32,
        rows_per_tile: u32,
    ) -> Option<Self> {
        if total_rows == 0 || !(line_height.is_finite() && line_height > 0.0) {
            return None;
        }
        let rows_per_tile = rows_per_tile.max(1);
        let scroll_top = if scroll_top.is_finite() {
            scroll_top.max(0.0)
        } else {
            0.0
        };
        let scroller_height = if scroller_height.is_finite() {
            scroller_height.max(0.0)
        } else {
            0.0
        };
        let first_visible_row = ((scroll_top / line_height).floor() as u32).min(total_rows - 1);
        let rows_in_view = (scroller_height / line_height).ceil() as u32;
        let last_visible_row = (total_rows - 1).min(first_visible_row.saturating_add(rows_in_view));
        let first_tile_start_row = first_visible_row - first_visible_row % rows_per_tile;
        let visible_tile_count = (last_visible_row - first_visible_row) / rows_per_tile + 2;
        let last_tile_start_row = first_tile_start_row + (visible_tile_count - 1) * rows_per_tile;
        Some(Self {
            total_rows,
            rows_per_tile,
            first_visible_row,
            last_visible_row,
            first_tile_start_row,
            visible_tile_count,
            last_tile_start_row,
        })
    }

    pub fn slot_for(&self, tile_start_row: u32) -> usize {
        ((tile_start_row / self.rows_per_tile) % self.visible_tile_count) as usize
    }

    /// Tiles that start inside the document, in row order.
    pub fn tiles(&self) -> Vec<Tile> {
        (0..self.visible_tile_count)
            .map(|i| self.first_tile_start_row + i * self.rows_per_tile)
            .filter(|start| *start < self.total_rows)
            .map(|start_row| Tile {
                start_row,
                row_count: self.rows_per_tile,
                slot: self.slot_for(start_row),
            })
            .collect()
    }

    pub fn tile_containing(&self, row: u32) -> Option<Tile> {
        if row < self.rendered_start_row() || row >= self.rendered_end_row() {
            return None;
        }
        let start_row = row - row % self.rows_per_tile;
        Some(Tile {
            start_row,
            row_count: self.rows_per_tile,
            slot: self.slot_for(start_row),
        })
    }

    pub fn rendered_start_row(&self) -> u32 {
        self.first_tile_start_row
    }

    /// Exclusive end of the rendered rows.
    pub fn rendered_end_row(&self) -> u32 {
        self.total_rows
            .min(self.last_tile_start_row.saturating_add(self.rows_per_tile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_row_viewport_two_tiles_and_slot_reuse() {
        let plan = TilePlan::compute(0.0, 80.0, 16.0, 1000, 6).unwrap();
        assert_eq!(plan.visible_tile_count, 2);
        let starts: Vec<_> = plan.tiles().iter().map(|t| (t.start_row, t.slot)).collect();
        assert_eq!(starts, vec![(0, 0), (6, 1)]);

        let scrolled = TilePlan::compute(7.0 * 16.0, 80.0, 16.0, 1000, 6).unwrap();
        assert_eq!(scrolled.first_tile_start_row, 6);
        let starts: Vec<_> = scrolled.tiles().iter().map(|t| (t.start_row, t.slot)).collect();
        // Tile 12 takes over slot 0 that tile 0 occupied.
        assert_eq!(starts, vec![(6, 1), (12, 0)]);
    }

    #[test]
    fn ten_row_viewport_needs_three_tiles() {
        let plan = TilePlan::compute(0.0, 160.0, 16.0, 1000, 6).unwrap();
        assert_eq!(plan.last_visible_row, 10);
        assert_eq!(plan.visible_tile_count, 3);
        assert_eq!(plan.last_tile_start_row, 12);
    }

    #[test]
    fn short_document_clips_tiles() {
        let plan = TilePlan::compute(0.0, 160.0, 16.0, 4, 6).unwrap();
        assert_eq!(plan.last_visible_row, 3);
        assert_eq!(plan.tiles().len(), 1);
        assert_eq!(plan.rendered_end_row(), 4);
        assert!(plan.tile_containing(4).is_none());
    }

    #[test]
    fn degenerate_inputs() {
        assert!(TilePlan::compute(0.0, 100.0, 16.0, 0, 6).is_none());
        assert!(TilePlan::compute(0.0, 100.0, 0.0, 10, 6).is_none());
        let plan = TilePlan::compute(0.0, 100.0, 16.0, 10, 0).unwrap();
        assert_eq!(plan.rows_per_tile, 1);
        // Scroll past the end clamps onto the last row.
        let plan = TilePlan::compute(1e9, 100.0, 16.0, 10, 6).unwrap();
        assert_eq!(plan.first_visible_row, 9);
    }
}
