//! Declarative view tree and its assembly.
//!
//! A `ViewTree` is what one structural commit hands to the surface:
//! * an optional line-number gutter, one block per tile slot,
//! * the text tiles, indexed by slot (`tiles[slot]`),
//! * a block of off-screen lines rendered only so they can be measured,
//! * the cursor layer, whose rectangles are filled in by the later
//!   position-only commit.

use crate::cursor::CursorRenderState;
use crate::measurements::Measurements;
use crate::viewport::TilePlan;
use crate::scope_tree::LineTree;
use ahash::{AHashMap, AHashSet};
use core_model::{DisplayModel, ScreenLineId};
use std::sync::Arc;

/// Placeholder text for soft-wrapped continuation rows.
pub const SOFT_WRAP_LABEL: &str = "•";

#[derive(Debug, Clone, PartialEq)]
pub struct TileBlock {
    pub slot: usize,
    pub start_row: u32,
    pub row_count: u32,
    /// Pixel top in content coordinates.
    pub top: f64,
    /// Rendered lines, `lines[i]` is screen row `start_row + i`.
    pub lines: Vec<Arc<LineTree>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumberLabel {
    pub screen_row: u32,
    pub buffer_row: u32,
    pub soft_wrapped: bool,
    pub foldable: bool,
    /// Right-aligned label text.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GutterTile {
    pub slot: usize,
    pub start_row: u32,
    pub labels: Vec<LineNumberLabel>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gutter {
    /// Label width in characters.
    pub max_digits: usize,
    pub width: f64,
    pub tiles: Vec<Option<GutterTile>>,
}

/// Off-screen line kept for exactly one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredLine {
    pub row: u32,
    pub line: Arc<LineTree>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CursorLayer {
    pub focused: bool,
    /// Positions from the previous cycle; replaced by the position commit.
    pub cursors: Vec<CursorRenderState>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewTree {
    pub gutter: Option<Gutter>,
    pub tiles: Vec<Option<TileBlock>>,
    pub lines_to_measure: Vec<MeasuredLine>,
    pub cursor_layer: CursorLayer,
    pub scroll_height: f64,
    pub content_width: f64,
    pub line_height: f64,
}

impl ViewTree {
    pub fn tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_some()).count()
    }

    /// Every line id referenced by the tree.
    pub fn line_ids(&self) -> AHashSet<ScreenLineId> {
        self.tiles
            .iter()
            .flatten()
            .flat_map(|t| t.lines.iter().map(|l| l.id()))
            .chain(self.lines_to_measure.iter().map(|m| m.line.id()))
            .collect()
    }
}

/// Screen row -> rendered line for the current cycle (tiles plus the
/// measurement block).
#[derive(Debug, Default, Clone)]
pub struct RenderedRows {
    by_row: AHashMap<u32, Arc<LineTree>>,
}

impl RenderedRows {
    pub fn insert(&mut self, row: u32, line: Arc<LineTree>) {
        self.by_row.insert(row, line);
    }

    pub fn get(&self, row: u32) -> Option<&Arc<LineTree>> {
        self.by_row.get(&row)
    }

    pub fn contains_row(&self, row: u32) -> bool {
        self.by_row.contains_key(&row)
    }

    pub fn ids(&self) -> AHashSet<ScreenLineId> {
        self.by_row.values().map(|l| l.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_row.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_row.clear();
    }
}

/// Decimal digit count of `n` (at least 1).
pub fn digit_count(n: u32) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}

/// Widest line-number label for a document whose last screen row maps to
/// `last_buffer_row`.
pub fn max_line_number_digits<D: DisplayModel + ?Sized>(display: &D, total_rows: u32) -> usize {
    if total_rows == 0 {
        return 1;
    }
    digit_count(display.buffer_row_for_screen_row(total_rows - 1) + 1)
}

/// Labels for screen rows `[start_row, end_row)`.
pub fn line_number_labels<D: DisplayModel + ?Sized>(
    display: &D,
    start_row: u32,
    end_row: u32,
    max_digits: usize,
) -> Vec<LineNumberLabel> {
    let mut previous = start_row
        .checked_sub(1)
        .map(|row| display.buffer_row_for_screen_row(row));
    (start_row..end_row)
        .map(|screen_row| {
            let buffer_row = display.buffer_row_for_screen_row(screen_row);
            let soft_wrapped = previous == Some(buffer_row);
            previous = Some(buffer_row);
            let foldable = !soft_wrapped && display.is_foldable_at_buffer_row(buffer_row);
            let text = if soft_wrapped {
                format!("{SOFT_WRAP_LABEL:>max_digits$}")
            } else {
                format!("{:>max_digits$}", buffer_row + 1)
            };
            LineNumberLabel {
                screen_row,
                buffer_row,
                soft_wrapped,
                foldable,
                text,
            }
        })
        .collect()
}

/// Inputs of one structural render.
pub struct TreeParts {
    /// Lines for rows `[plan.rendered_start_row(), plan.rendered_end_row())`.
    pub lines: Vec<Arc<LineTree>>,
    pub labels: Option<Vec<LineNumberLabel>>,
    pub max_digits: usize,
    pub lines_to_measure: Vec<MeasuredLine>,
    pub focused: bool,
    pub previous_cursors: Vec<CursorRenderState>,
}

/// Compose gutter, tiles, measurement block and cursor layer.
pub fn assemble(plan: &TilePlan, m: &Measurements, parts: TreeParts) -> ViewTree {
    let slots = plan.visible_tile_count as usize;
    let base = plan.rendered_start_row();
    let mut tiles: Vec<Option<TileBlock>> = vec![None; slots];
    let mut gutter_tiles: Vec<Option<GutterTile>> = vec![None; slots];

    for tile in plan.tiles() {
        let from = (tile.start_row - base) as usize;
        let to = (tile.end_row().min(plan.rendered_end_row()) - base) as usize;
        let lines = parts
            .lines
            .get(from..to.min(parts.lines.len()))
            .map(<[_]>::to_vec)
            .unwrap_or_default();
        if let Some(labels) = &parts.labels {
            gutter_tiles[tile.slot] = Some(GutterTile {
                slot: tile.slot,
                start_row: tile.start_row,
                labels: labels
                    .get(from..to.min(labels.len()))
                    .map(<[_]>::to_vec)
                    .unwrap_or_default(),
            });
        }
        tiles[tile.slot] = Some(TileBlock {
            slot: tile.slot,
            start_row: tile.start_row,
            row_count: tile.row_count,
            top: m.pixel_top_for_row(tile.start_row),
            lines,
        });
    }

    let gutter = parts.labels.map(|_| Gutter {
        max_digits: parts.max_digits,
        width: m.line_number_gutter_width,
        tiles: gutter_tiles,
    });

    tracing::trace!(
        target: "render.tiles",
        first_tile = plan.first_tile_start_row,
        count = plan.visible_tile_count,
        rendered_end = plan.rendered_end_row(),
        "tiles_assembled"
    );

    ViewTree {
        gutter,
        tiles,
        lines_to_measure: parts.lines_to_measure,
        cursor_layer: CursorLayer {
            focused: parts.focused,
            cursors: parts.previous_cursors,
        },
        scroll_height: m.content_height(plan.total_rows),
        content_width: m.content_width,
        line_height: m.line_height,
    }
}
