//! Headless monospace cell-grid rendering surface.
//!
//! Lines are laid out on a grid of `cell_width` x `line_height` cells; each
//! char advances by its `core_text` cell width (0, 1 or 2). Line nodes are
//! keyed by `ScreenLineId`: a line that stays in the committed tree keeps its
//! `LineHandle` across commits, whatever tile or row it moves to.
//!
//! Geometry (absolute surface pixels):
//! * a line's left edge is `gutter_width - scroll_left`,
//! * gutter width is `(max_digits + 1) * cell_width` once a gutter has been
//!   committed, else 0.

use crate::cursor::{CursorRenderState, HiddenInputPosition};
use crate::surface::{
    ClientRect, LineHandle, PositionPatch, RenderSurface, SurfaceDimensions, TextRunHandle,
};
use crate::scope_tree::LineTree;
use crate::tree::{LineNumberLabel, ViewTree};
use ahash::AHashMap;
use core_model::ScreenLineId;
use core_text::{ZERO_WIDTH_NBSP, char_cell_width};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
struct LineNode {
    row: u32,
    off_screen: bool,
    tree: Arc<LineTree>,
    /// Cell offset of each text run's leading edge.
    run_cells: Vec<u32>,
    total_cells: u32,
}

impl LineNode {
    fn new(row: u32, off_screen: bool, tree: Arc<LineTree>) -> Self {
        let mut run_cells = Vec::with_capacity(tree.text_runs().len());
        let mut cells = 0u32;
        for run in tree.text_runs() {
            run_cells.push(cells);
            cells += cells_of(run.text.chars());
        }
        Self {
            row,
            off_screen,
            tree,
            run_cells,
            total_cells: cells,
        }
    }
}

fn cells_of(chars: impl Iterator<Item = char>) -> u32 {
    chars.map(|c| u32::from(char_cell_width(c))).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSnapshot {
    pub slot: usize,
    pub start_row: u32,
    pub row_count: u32,
}

/// One visible text row, ready for the terminal writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    pub row: u32,
    pub gutter: Option<String>,
    pub text: String,
}

#[derive(Debug, Default)]
struct SurfaceCounters {
    structural_commits: AtomicU64,
    position_commits: AtomicU64,
    lines_created: AtomicU64,
    lines_removed: AtomicU64,
    range_queries: AtomicU64,
    line_left_queries: AtomicU64,
    dimension_reads: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceCountersSnapshot {
    pub structural_commits: u64,
    pub position_commits: u64,
    pub lines_created: u64,
    pub lines_removed: u64,
    pub range_queries: u64,
    pub line_left_queries: u64,
    pub dimension_reads: u64,
}

impl SurfaceCounters {
    fn snapshot(&self) -> SurfaceCountersSnapshot {
        use std::sync::atomic::Ordering::Relaxed;
        SurfaceCountersSnapshot {
            structural_commits: self.structural_commits.load(Relaxed),
            position_commits: self.position_commits.load(Relaxed),
            lines_created: self.lines_created.load(Relaxed),
            lines_removed: self.lines_removed.load(Relaxed),
            range_queries: self.range_queries.load(Relaxed),
            line_left_queries: self.line_left_queries.load(Relaxed),
            dimension_reads: self.dimension_reads.load(Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug)]
pub struct GridSurface {
    cell_width: f64,
    line_height: f64,
    viewport_width: f64,
    viewport_height: f64,
    attached: bool,
    next_handle: u64,
    handles: AHashMap<ScreenLineId, LineHandle>,
    nodes: AHashMap<LineHandle, LineNode>,
    tiles: Vec<Option<TileSnapshot>>,
    labels: AHashMap<u32, LineNumberLabel>,
    gutter_digits: Option<usize>,
    focused: bool,
    cursors: Vec<CursorRenderState>,
    hidden_input: Option<HiddenInputPosition>,
    scroll_top: f64,
    scroll_left: f64,
    scroll_width: f64,
    counters: SurfaceCounters,
}

impl GridSurface {
    pub fn new(cell_width: f64, line_height: f64, viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            cell_width,
            line_height,
            viewport_width,
            viewport_height,
            attached: true,
            next_handle: 1,
            handles: AHashMap::new(),
            nodes: AHashMap::new(),
            tiles: Vec::new(),
            labels: AHashMap::new(),
            gutter_digits: None,
            focused: false,
            cursors: Vec::new(),
            hidden_input: None,
            scroll_top: 0.0,
            scroll_left: 0.0,
            scroll_width: 0.0,
            counters: SurfaceCounters::default(),
        }
    }

    /// Size of the scroller in pixels (gutter included).
    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    pub fn set_cell_metrics(&mut self, cell_width: f64, line_height: f64) {
        self.cell_width = cell_width;
        self.line_height = line_height;
    }

    /// A detached surface reports no dimensions.
    pub fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    pub fn counters(&self) -> SurfaceCountersSnapshot {
        self.counters.snapshot()
    }

    pub fn line_node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Committed tiles indexed by slot.
    pub fn tiles(&self) -> &[Option<TileSnapshot>] {
        &self.tiles
    }

    pub fn cursors(&self) -> &[CursorRenderState] {
        &self.cursors
    }

    pub fn hidden_input(&self) -> Option<HiddenInputPosition> {
        self.hidden_input
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn scroll_offsets(&self) -> (f64, f64) {
        (self.scroll_top, self.scroll_left)
    }

    pub fn scroll_width(&self) -> f64 {
        self.scroll_width
    }

    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    pub fn line_height(&self) -> f64 {
        self.line_height
    }

    pub fn viewport_size(&self) -> (f64, f64) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn gutter_width(&self) -> f64 {
        self.gutter_digits
            .map_or(0.0, |digits| (digits as f64 + 1.0) * self.cell_width)
    }

    /// Text of the line node rendered at `row` (tiles only).
    pub fn row_text(&self, row: u32) -> Option<String> {
        self.nodes
            .values()
            .find(|n| n.row == row && !n.off_screen)
            .map(|n| visible_text(&n.tree))
    }

    /// Rows inside the scroller, in order, with their gutter labels.
    pub fn visible_rows(&self) -> Vec<GridRow> {
        if self.line_height <= 0.0 {
            return Vec::new();
        }
        let first = (self.scroll_top / self.line_height).floor().max(0.0) as u32;
        let count = (self.viewport_height / self.line_height).ceil().max(0.0) as u32;
        let end = first.saturating_add(count);
        let mut rows: Vec<&LineNode> = self
            .nodes
            .values()
            .filter(|n| !n.off_screen && n.row >= first && n.row < end)
            .collect();
        rows.sort_by_key(|n| n.row);
        rows.into_iter()
            .map(|n| GridRow {
                row: n.row,
                gutter: self.labels.get(&n.row).map(|l| l.text.clone()),
                text: visible_text(&n.tree),
            })
            .collect()
    }

    fn upsert(&mut self, row: u32, line: &Arc<LineTree>, off_screen: bool) {
        match self.handles.get(&line.id()) {
            Some(handle) => {
                if let Some(node) = self.nodes.get_mut(handle) {
                    node.row = row;
                    node.off_screen = off_screen;
                }
            }
            None => {
                let handle = LineHandle(self.next_handle);
                self.next_handle += 1;
                self.handles.insert(line.id(), handle);
                self.nodes
                    .insert(handle, LineNode::new(row, off_screen, Arc::clone(line)));
                bump(&self.counters.lines_created);
            }
        }
    }
}

fn visible_text(tree: &LineTree) -> String {
    tree.text().chars().filter(|c| *c != ZERO_WIDTH_NBSP).collect()
}

impl RenderSurface for GridSurface {
    fn commit(&mut self, tree: &ViewTree) {
        let keep = tree.line_ids();
        let stale: Vec<ScreenLineId> = self
            .handles
            .keys()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(handle) = self.handles.remove(&id) {
                self.nodes.remove(&handle);
                bump(&self.counters.lines_removed);
            }
        }

        for measured in &tree.lines_to_measure {
            self.upsert(measured.row, &measured.line, true);
        }
        self.tiles = tree
            .tiles
            .iter()
            .map(|t| {
                t.as_ref().map(|t| TileSnapshot {
                    slot: t.slot,
                    start_row: t.start_row,
                    row_count: t.row_count,
                })
            })
            .collect();
        for tile in tree.tiles.iter().flatten() {
            for (i, line) in tile.lines.iter().enumerate() {
                self.upsert(tile.start_row + i as u32, line, false);
            }
        }

        self.labels.clear();
        self.gutter_digits = tree.gutter.as_ref().map(|g| g.max_digits);
        if let Some(gutter) = &tree.gutter {
            for label in gutter.tiles.iter().flatten().flat_map(|t| t.labels.iter()) {
                self.labels.insert(label.screen_row, label.clone());
            }
        }
        self.focused = tree.cursor_layer.focused;
        self.cursors = tree.cursor_layer.cursors.clone();
        bump(&self.counters.structural_commits);
    }

    fn line_handle(&self, id: ScreenLineId) -> Option<LineHandle> {
        self.handles.get(&id).copied()
    }

    fn line_client_left(&self, line: LineHandle) -> Option<f64> {
        bump(&self.counters.line_left_queries);
        self.nodes
            .contains_key(&line)
            .then(|| self.gutter_width() - self.scroll_left)
    }

    fn range_client_rect(&self, run: &TextRunHandle, start: u32, end: u32) -> Option<ClientRect> {
        bump(&self.counters.range_queries);
        let node = self.nodes.get(&run.line)?;
        let text_run = node.tree.text_runs().get(run.run)?;
        let origin = self.gutter_width() - self.scroll_left;
        let base = node.run_cells.get(run.run).copied()?;
        let prefix = |n: u32| base + cells_of(text_run.text.chars().take(n as usize));
        Some(ClientRect {
            left: origin + f64::from(prefix(start)) * self.cell_width,
            right: origin + f64::from(prefix(end)) * self.cell_width,
        })
    }

    fn line_content_width(&self, line: LineHandle) -> Option<f64> {
        self.nodes
            .get(&line)
            .map(|n| f64::from(n.total_cells) * self.cell_width)
    }

    fn measure_dimensions(&self) -> Option<SurfaceDimensions> {
        bump(&self.counters.dimension_reads);
        let usable = self.attached
            && self.viewport_width > 0.0
            && self.viewport_height > 0.0
            && self.cell_width > 0.0
            && self.line_height > 0.0;
        if !usable {
            return None;
        }
        let gutter = self.gutter_width();
        Some(SurfaceDimensions {
            scroller_width: (self.viewport_width - gutter).max(0.0),
            scroller_height: self.viewport_height,
            line_height: self.line_height,
            base_character_width: self.cell_width,
            double_width_character_width: 2.0 * self.cell_width,
            half_width_character_width: self.cell_width,
            korean_character_width: 2.0 * self.cell_width,
            line_number_gutter_width: gutter,
        })
    }

    fn commit_positions(&mut self, patch: &PositionPatch) {
        self.scroll_top = patch.scroll_top;
        self.scroll_left = patch.scroll_left;
        self.scroll_width = patch.scroll_width;
        self.cursors = patch.cursors.clone();
        self.hidden_input = patch.hidden_input;
        bump(&self.counters.position_commits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope_tree::build_line_tree;
    use crate::tree::{Gutter, GutterTile, TileBlock};
    use core_model::{ScreenLine, TextDisplayModel};

    fn tree_of(model: &TextDisplayModel, id: u64, text: &str) -> Arc<LineTree> {
        let len = text.chars().count() as i32;
        Arc::new(build_line_tree(&ScreenLine::new(id, text, vec![len]), model))
    }

    fn view(lines: Vec<Arc<LineTree>>, start_row: u32) -> ViewTree {
        ViewTree {
            tiles: vec![Some(TileBlock {
                slot: 0,
                start_row,
                row_count: lines.len() as u32,
                top: 0.0,
                lines,
            })],
            ..ViewTree::default()
        }
    }

    #[test]
    fn node_identity_survives_commits() {
        let model = TextDisplayModel::new("");
        let a = tree_of(&model, 1, "alpha");
        let b = tree_of(&model, 2, "beta");
        let c = tree_of(&model, 3, "gamma");
        let mut s = GridSurface::new(8.0, 16.0, 640.0, 320.0);
        s.commit(&view(vec![a.clone(), b.clone()], 0));
        let hb = s.line_handle(2).unwrap();
        s.commit(&view(vec![b.clone(), c.clone()], 1));
        assert_eq!(s.line_handle(2), Some(hb));
        assert!(s.line_handle(1).is_none());
        let counters = s.counters();
        assert_eq!(counters.lines_created, 3);
        assert_eq!(counters.lines_removed, 1);
        assert_eq!(counters.structural_commits, 2);
        assert_eq!(s.row_text(1).as_deref(), Some("beta"));
    }

    #[test]
    fn wide_glyphs_take_two_cells() {
        let model = TextDisplayModel::new("");
        let line = tree_of(&model, 1, "a漢b");
        let mut s = GridSurface::new(8.0, 16.0, 640.0, 320.0);
        s.commit(&view(vec![line], 0));
        let handle = s.line_handle(1).unwrap();
        let run = TextRunHandle { line: handle, run: 0 };
        let rect = s.range_client_rect(&run, 0, 2).unwrap();
        assert_eq!(rect.right - s.line_client_left(handle).unwrap(), 24.0);
        assert_eq!(s.line_content_width(handle), Some(32.0));
    }

    #[test]
    fn gutter_shifts_lines_and_shrinks_scroller() {
        let model = TextDisplayModel::new("");
        let mut tree = view(vec![tree_of(&model, 1, "x")], 0);
        tree.gutter = Some(Gutter {
            max_digits: 3,
            width: 0.0,
            tiles: vec![Some(GutterTile {
                slot: 0,
                start_row: 0,
                labels: Vec::new(),
            })],
        });
        let mut s = GridSurface::new(8.0, 16.0, 640.0, 320.0);
        assert_eq!(s.measure_dimensions().unwrap().line_number_gutter_width, 0.0);
        s.commit(&tree);
        let dims = s.measure_dimensions().unwrap();
        assert_eq!(dims.line_number_gutter_width, 32.0);
        assert_eq!(dims.scroller_width, 608.0);
        assert_eq!(s.line_client_left(s.line_handle(1).unwrap()), Some(32.0));
    }

    #[test]
    fn detached_surface_has_no_dimensions() {
        let mut s = GridSurface::new(8.0, 16.0, 640.0, 320.0);
        s.set_attached(false);
        assert!(s.measure_dimensions().is_none());
        s.set_attached(true);
        s.set_viewport_size(0.0, 320.0);
        assert!(s.measure_dimensions().is_none());
    }

    #[test]
    fn visible_rows_follow_scroll() {
        let model = TextDisplayModel::new("");
        let lines = (0..6)
            .map(|i| tree_of(&model, i + 1, &format!("row {i}")))
            .collect();
        let mut s = GridSurface::new(8.0, 16.0, 640.0, 32.0);
        s.commit(&view(lines, 0));
        s.commit_positions(&PositionPatch {
            scroll_top: 48.0,
            ..PositionPatch::default()
        });
        let rows: Vec<_> = s.visible_rows().into_iter().map(|r| r.text).collect();
        assert_eq!(rows, vec!["row 3", "row 4"]);
        assert_eq!(s.counters().position_commits, 1);
    }
}
