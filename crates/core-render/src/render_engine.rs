//! RenderEngine: owns one view's render state and runs update cycles.
//!
//! Every cycle executes, in order:
//! 1. re-measure surface dimensions when flagged stale,
//! 2. plan tiles and ask the longest-line tracker for a change,
//! 3. clear pending measurement requests,
//! 4. structural render (tiles, gutter, measurement block, cursor layer
//!    placeholders) committed to the surface,
//! 5. measure the longest line if it changed,
//! 6. query cursors and request their columns,
//! 7. resolve pending requests against committed nodes,
//! 8. compute cursor rectangles,
//! 9. position-only commit.
//!
//! Cycles run either from a frame callback (`on_frame`, batched) or
//! immediately in synchronous mode. A hidden view runs nothing; an
//! unmeasured view defers its cycle until dimensions become available.

use crate::cursor::{CursorGeometry, CursorRenderState, HiddenInputPosition, hidden_input_position};
use crate::error::{RenderError, Result};
use crate::longest_line::LongestLineTracker;
use crate::measurements::Measurements;
use crate::metrics::{RenderCycleMetrics, RenderCycleMetricsSnapshot};
use crate::pending::PendingMeasurements;
use crate::position_cache::HorizontalPositionCache;
use crate::scheduler::{
    FrameRequester, ScheduleAction, SchedulerMetricsSnapshot, UpdateScheduler,
};
use crate::scope_tree::{LineTree, build_line_tree};
use crate::surface::{PositionPatch, RenderSurface};
use crate::timing::record_last_cycle_ns;
use crate::tree::{
    CursorLayer, MeasuredLine, RenderedRows, TreeParts, ViewTree, assemble, line_number_labels,
    max_line_number_digits,
};
use crate::viewport::TilePlan;
use ahash::AHashMap;
use core_events::{ChangeKind, ViewEvent};
use core_model::{DisplayModel, ScreenLine, ScreenLineId, SelectionModel};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

/// Runtime view configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub rows_per_tile: u32,
    pub show_line_numbers: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            rows_per_tile: 6,
            show_line_numbers: true,
        }
    }
}

pub struct RenderEngine<D, S, R>
where
    D: DisplayModel,
    S: SelectionModel,
    R: RenderSurface,
{
    display: D,
    selections: S,
    surface: R,
    options: ViewOptions,
    scheduler: UpdateScheduler,
    frame_requester: Option<Box<dyn FrameRequester>>,
    display_changes: watch::Receiver<u64>,
    selection_changes: watch::Receiver<u64>,
    measurements: Option<Measurements>,
    dimensions_stale: bool,
    visible: bool,
    focused: bool,
    requested_scroll: Option<(f64, f64)>,
    tile_plan: Option<TilePlan>,
    line_trees: AHashMap<ScreenLineId, Arc<LineTree>>,
    rendered: RenderedRows,
    positions: HorizontalPositionCache,
    pending: PendingMeasurements,
    longest: LongestLineTracker,
    cursor_geometry: CursorGeometry,
    cursors: Vec<CursorRenderState>,
    hidden_input: Option<HiddenInputPosition>,
    gutter_digits: Option<usize>,
    metrics: RenderCycleMetrics,
}

impl<D, S, R> RenderEngine<D, S, R>
where
    D: DisplayModel,
    S: SelectionModel,
    R: RenderSurface,
{
    /// A new engine starts hidden; call `did_show` once the surface is attached.
    pub fn new(display: D, selections: S, surface: R, options: ViewOptions) -> Self {
        let display_changes = display.subscribe();
        let selection_changes = selections.subscribe();
        Self {
            display,
            selections,
            surface,
            options,
            scheduler: UpdateScheduler::new(),
            frame_requester: None,
            display_changes,
            selection_changes,
            measurements: None,
            dimensions_stale: true,
            visible: false,
            focused: false,
            requested_scroll: None,
            tile_plan: None,
            line_trees: AHashMap::new(),
            rendered: RenderedRows::default(),
            positions: HorizontalPositionCache::new(),
            pending: PendingMeasurements::new(),
            longest: LongestLineTracker::new(),
            cursor_geometry: CursorGeometry::new(),
            cursors: Vec::new(),
            hidden_input: None,
            gutter_digits: None,
            metrics: RenderCycleMetrics::default(),
        }
    }

    pub fn with_frame_requester(mut self, requester: Box<dyn FrameRequester>) -> Self {
        self.frame_requester = Some(requester);
        self
    }

    // ---------------------------------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------------------------------

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Mutating the display model does not schedule anything by itself; follow
    /// up with `did_change_model` or `poll_notifications`.
    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn selections(&self) -> &S {
        &self.selections
    }

    pub fn selections_mut(&mut self) -> &mut S {
        &mut self.selections
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    pub fn options(&self) -> ViewOptions {
        self.options
    }

    pub fn measurements(&self) -> Option<&Measurements> {
        self.measurements.as_ref()
    }

    pub fn tile_plan(&self) -> Option<&TilePlan> {
        self.tile_plan.as_ref()
    }

    pub fn cursors(&self) -> &[CursorRenderState] {
        &self.cursors
    }

    pub fn hidden_input(&self) -> Option<HiddenInputPosition> {
        self.hidden_input
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_update_scheduled(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    pub fn position_cache(&self) -> &HorizontalPositionCache {
        &self.positions
    }

    pub fn metrics_snapshot(&self) -> RenderCycleMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn scheduler_metrics(&self) -> SchedulerMetricsSnapshot {
        self.scheduler.metrics_snapshot()
    }

    /// Cached pixel offset of `column` on a rendered `row`.
    pub fn pixel_left_for(&self, row: u32, column: u32) -> Result<f64> {
        if self.measurements.is_none() {
            return Err(RenderError::Unmeasured);
        }
        let line = self
            .rendered
            .get(row)
            .ok_or(RenderError::StaleLine { row })?;
        self.positions
            .get(line.id(), column)
            .ok_or(RenderError::MissingPosition { row, column })
    }

    /// Pixel top of a screen row in content coordinates.
    pub fn pixel_top_for_row(&self, row: u32) -> Result<f64> {
        self.measurements
            .as_ref()
            .map(|m| m.pixel_top_for_row(row))
            .ok_or(RenderError::Unmeasured)
    }

    // ---------------------------------------------------------------------------------------------
    // Host-facing operations
    // ---------------------------------------------------------------------------------------------

    pub fn update(&mut self, options: ViewOptions) -> Result<()> {
        if options.show_line_numbers != self.options.show_line_numbers {
            self.dimensions_stale = true;
        }
        self.options = options;
        self.mark(ChangeKind::CONFIG)
    }

    pub fn force_synchronous_updates(&mut self, synchronous: bool) {
        self.scheduler.set_synchronous(synchronous);
    }

    /// Resolves once the next update cycle has completed.
    pub fn await_next_update_applied(&mut self) -> oneshot::Receiver<()> {
        self.scheduler.await_next_update_applied()
    }

    pub fn did_show(&mut self) -> Result<()> {
        if self.visible {
            return Ok(());
        }
        self.visible = true;
        self.dimensions_stale = true;
        self.mark(ChangeKind::VISIBILITY)
    }

    pub fn did_hide(&mut self) {
        if !self.visible {
            return;
        }
        self.visible = false;
        if self.scheduler.cancel() {
            RenderCycleMetrics::add(&self.metrics.suppressed_runs, 1);
        }
    }

    pub fn did_scroll(&mut self, scroll_top: f64, scroll_left: f64) -> Result<()> {
        self.requested_scroll = Some((scroll_top, scroll_left));
        self.mark(ChangeKind::SCROLL)
    }

    pub fn did_resize(&mut self) -> Result<()> {
        self.dimensions_stale = true;
        self.mark(ChangeKind::RESIZE)
    }

    pub fn did_focus(&mut self) -> Result<()> {
        self.focused = true;
        self.mark(ChangeKind::FOCUS)
    }

    pub fn did_blur(&mut self) -> Result<()> {
        self.focused = false;
        self.mark(ChangeKind::FOCUS)
    }

    pub fn did_change_model(&mut self) -> Result<()> {
        self.mark(ChangeKind::MODEL)
    }

    /// Font metrics changed: every cached position is stale and the longest
    /// line must be measured again.
    pub fn did_change_character_dimensions(&mut self) -> Result<()> {
        self.dimensions_stale = true;
        self.positions.clear();
        self.longest.force_remeasure();
        self.mark(ChangeKind::CHARACTER_DIMENSIONS)
    }

    /// Turn observed model / selection notifications into a scheduled update.
    /// Returns true when a change was observed.
    pub fn poll_notifications(&mut self) -> Result<bool> {
        let mut changed = false;
        if self.display_changes.has_changed().unwrap_or(false) {
            self.display_changes.borrow_and_update();
            changed = true;
        }
        if self.selection_changes.has_changed().unwrap_or(false) {
            self.selection_changes.borrow_and_update();
            changed = true;
        }
        if changed {
            self.did_change_model()?;
        }
        Ok(changed)
    }

    /// Batching boundary. Runs the scheduled cycle, if any. Returns true when a
    /// cycle ran.
    pub fn on_frame(&mut self) -> Result<bool> {
        if !self.scheduler.is_scheduled() {
            return Ok(false);
        }
        if !self.visible {
            self.scheduler.cancel();
            RenderCycleMetrics::add(&self.metrics.suppressed_runs, 1);
            return Ok(false);
        }
        self.run_cycle(false)
    }

    /// Run a full cycle now, whatever is scheduled. No-op while hidden.
    pub fn update_sync(&mut self) -> Result<bool> {
        if !self.visible {
            RenderCycleMetrics::add(&self.metrics.suppressed_runs, 1);
            tracing::debug!(target: "render.engine", "update_suppressed_hidden");
            return Ok(false);
        }
        self.run_cycle(true)
    }

    /// Dispatch one host event. Returns false on `Shutdown`.
    pub fn handle_event(&mut self, event: &ViewEvent) -> Result<bool> {
        match event {
            ViewEvent::ModelChanged => self.did_change_model()?,
            ViewEvent::Scroll { top, left } => self.did_scroll(*top, *left)?,
            ViewEvent::Resize => self.did_resize()?,
            ViewEvent::Focus => self.did_focus()?,
            ViewEvent::Blur => self.did_blur()?,
            ViewEvent::Shown => self.did_show()?,
            ViewEvent::Hidden => self.did_hide(),
            ViewEvent::CharacterDimensionsChanged => self.did_change_character_dimensions()?,
            ViewEvent::Frame => {
                self.poll_notifications()?;
                self.on_frame()?;
            }
            ViewEvent::Shutdown => return Ok(false),
        }
        Ok(true)
    }

    // ---------------------------------------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------------------------------------

    fn mark(&mut self, kind: ChangeKind) -> Result<()> {
        if !self.visible {
            self.scheduler.note(kind);
            return Ok(());
        }
        let action = self.scheduler.mark(kind);
        self.dispatch(action)
    }

    fn dispatch(&mut self, action: ScheduleAction) -> Result<()> {
        match action {
            ScheduleAction::RunNow => self.update_sync().map(|_| ()),
            ScheduleAction::RequestFrame => {
                self.request_frame();
                Ok(())
            }
            ScheduleAction::Coalesced | ScheduleAction::Deferred => Ok(()),
        }
    }

    fn request_frame(&self) {
        if let Some(requester) = &self.frame_requester {
            requester.request_frame();
        }
    }

    fn run_cycle(&mut self, synchronous: bool) -> Result<bool> {
        let span = tracing::debug_span!(target: "render.engine", "update_cycle", synchronous);
        let _enter = span.enter();
        let started = std::time::Instant::now();
        let kinds = self.scheduler.begin_cycle(synchronous);
        match self.run_steps(kinds) {
            Ok(true) => {
                let ns = started.elapsed().as_nanos().max(1) as u64;
                self.metrics.last_cycle_ns.store(ns, std::sync::atomic::Ordering::Relaxed);
                RenderCycleMetrics::add(&self.metrics.cycles, 1);
                record_last_cycle_ns(ns);
                if let Some(action) = self.scheduler.finish_cycle() {
                    self.dispatch(action)?;
                }
                Ok(true)
            }
            Ok(false) => {
                let retry = self.scheduler.defer_cycle(kinds);
                RenderCycleMetrics::add(&self.metrics.deferred_unmeasured, 1);
                tracing::debug!(target: "render.engine", ?kinds, "update_deferred_unmeasured");
                if let Some(action) = retry {
                    self.dispatch(action)?;
                }
                Ok(false)
            }
            Err(err) => {
                if let Some(ScheduleAction::RequestFrame) =
                    self.scheduler.defer_cycle(ChangeKind::empty())
                {
                    self.request_frame();
                }
                tracing::error!(target: "render.engine", error = %err, "update_cycle_failed");
                Err(err)
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Cycle steps
    // ---------------------------------------------------------------------------------------------

    fn measure_dimensions(&mut self) {
        match self.surface.measure_dimensions() {
            Some(dims) => {
                let m = self.measurements.get_or_insert_with(Measurements::default);
                m.apply_dimensions(&dims);
                let widths = m.default_char_widths();
                self.dimensions_stale = false;
                if self.display.set_default_char_widths(widths) {
                    // Rewrapped lines are picked up by this cycle's render.
                    self.display_changes.borrow_and_update();
                    tracing::debug!(target: "render.engine", "display_rewrapped");
                }
                tracing::debug!(
                    target: "render.engine",
                    width = dims.scroller_width,
                    height = dims.scroller_height,
                    line_height = dims.line_height,
                    char_width = dims.base_character_width,
                    gutter = dims.line_number_gutter_width,
                    "dimensions_measured"
                );
            }
            None => {
                tracing::debug!(target: "render.engine", "dimensions_unavailable");
            }
        }
    }

    fn line_tree_for(&mut self, line: &ScreenLine) -> Arc<LineTree> {
        let display = &self.display;
        Arc::clone(
            self.line_trees
                .entry(line.id)
                .or_insert_with(|| Arc::new(build_line_tree(line, display))),
        )
    }

    /// Returns false when the cycle had to be deferred.
    fn run_steps(&mut self, kinds: ChangeKind) -> Result<bool> {
        // 1. dimensions
        if self.dimensions_stale || self.measurements.is_none() {
            self.measure_dimensions();
        }
        let Some(mut m) = self.measurements else {
            return Ok(false);
        };

        // 2. tiles + longest line
        let total = self.display.approximate_screen_line_count();
        let (requested_top, requested_left) = self
            .requested_scroll
            .take()
            .unwrap_or((m.scroll_top, m.scroll_left));
        m.clamp_scroll_top(requested_top, total);
        let plan = TilePlan::compute(
            m.scroll_top,
            m.scroller_height,
            m.line_height,
            total,
            self.options.rows_per_tile,
        );
        let (start_row, end_row) = plan.map_or((0, 0), |p| (p.rendered_start_row(), p.rendered_end_row()));
        let longest_changed = self.longest.query(&mut self.display, end_row);

        // 3. pending requests
        self.pending.clear();

        // 4. structural render
        self.rendered.clear();
        let screen_lines = self.display.screen_lines(start_row, end_row);
        let mut lines = Vec::with_capacity(screen_lines.len());
        for (offset, screen_line) in screen_lines.iter().enumerate() {
            let tree = self.line_tree_for(screen_line);
            self.rendered.insert(start_row + offset as u32, Arc::clone(&tree));
            lines.push(tree);
        }
        let rendered_end_row = start_row + lines.len() as u32;

        let probe = if longest_changed {
            self.longest.pending_probe().cloned()
        } else {
            None
        };
        let mut lines_to_measure = Vec::new();
        if let Some(probe) = &probe {
            let tiled = self
                .rendered
                .get(probe.row)
                .is_some_and(|l| l.id() == probe.line.id);
            if !tiled {
                let tree = self.line_tree_for(&probe.line);
                self.rendered.insert(probe.row, Arc::clone(&tree));
                lines_to_measure.push(MeasuredLine {
                    row: probe.row,
                    line: tree,
                });
            }
        }

        let (labels, digits) = if self.options.show_line_numbers && plan.is_some() {
            let digits = max_line_number_digits(&self.display, total);
            let labels = line_number_labels(&self.display, start_row, rendered_end_row, digits);
            (Some(labels), Some(digits))
        } else {
            (None, None)
        };

        let keep = self.rendered.ids();
        let evicted = self.positions.evict_except(&keep);
        self.line_trees.retain(|id, _| keep.contains(id));
        RenderCycleMetrics::add(&self.metrics.evicted_lines, evicted as u64);

        let tree = match &plan {
            Some(plan) => assemble(
                plan,
                &m,
                TreeParts {
                    lines,
                    labels,
                    max_digits: digits.unwrap_or(0),
                    lines_to_measure,
                    focused: self.focused,
                    previous_cursors: self.cursors.clone(),
                },
            ),
            None => ViewTree {
                cursor_layer: CursorLayer {
                    focused: self.focused,
                    cursors: Vec::new(),
                },
                line_height: m.line_height,
                ..ViewTree::default()
            },
        };
        let tiles_rendered = tree.tile_count() as u64;
        self.surface.commit(&tree);
        RenderCycleMetrics::add(&self.metrics.structural_commits, 1);
        RenderCycleMetrics::add(&self.metrics.tiles_rendered, tiles_rendered);

        if digits != self.gutter_digits {
            // Gutter width follows the widest label.
            if let Some(dims) = self.surface.measure_dimensions() {
                m.apply_dimensions(&dims);
            }
            tracing::debug!(
                target: "render.engine",
                from = ?self.gutter_digits,
                to = ?digits,
                width = m.line_number_gutter_width,
                "gutter_remeasured"
            );
            self.gutter_digits = digits;
        }

        // 5. longest line
        if let Some(probe) = &probe {
            let id = probe.line.id;
            let handle = self
                .surface
                .line_handle(id)
                .ok_or(RenderError::StaleScreenLine { id })?;
            let width = self
                .surface
                .line_content_width(handle)
                .ok_or(RenderError::StaleScreenLine { id })?;
            m.set_longest_line_width(width);
            self.longest.mark_measured();
            RenderCycleMetrics::add(&self.metrics.longest_line_measurements, 1);
            tracing::debug!(
                target: "render.longest_line",
                row = probe.row,
                id,
                width,
                scroll_width = m.scroll_width,
                "longest_line_measured"
            );
        }
        m.clamp_scroll_left(requested_left);

        // 6. cursors
        self.cursor_geometry.query(
            &self.display,
            &self.selections,
            start_row,
            rendered_end_row,
            &mut self.pending,
        );

        // 7. measurement
        let stats = self
            .positions
            .measure(&self.pending, &self.rendered, &self.surface)?;
        RenderCycleMetrics::add(&self.metrics.measured_columns, stats.measured);
        RenderCycleMetrics::add(&self.metrics.measurement_queries, stats.surface_queries);
        RenderCycleMetrics::add(&self.metrics.cache_hits, stats.cache_hits);

        // 8. cursor rectangles
        let cursors = self
            .cursor_geometry
            .compute(&self.positions, &self.rendered, &m)?;
        let hidden_input = self
            .cursor_geometry
            .primary_index()
            .and_then(|i| cursors.get(i))
            .map(|c| hidden_input_position(c, &m));

        // 9. position commit
        let patch = PositionPatch {
            scroll_top: m.scroll_top,
            scroll_left: m.scroll_left,
            scroll_width: m.scroll_width,
            content_width: m.content_width,
            cursors: cursors.clone(),
            hidden_input,
        };
        self.surface.commit_positions(&patch);
        RenderCycleMetrics::add(&self.metrics.position_commits, 1);

        tracing::debug!(
            target: "render.engine",
            ?kinds,
            start_row,
            end_row = rendered_end_row,
            tiles = tiles_rendered,
            cursors = cursors.len(),
            measured = stats.measured,
            queries = stats.surface_queries,
            "update_cycle"
        );

        self.measurements = Some(m);
        self.tile_plan = plan;
        self.cursors = cursors;
        self.hidden_input = hidden_input;
        Ok(true)
    }
}
