//! Reference display layer over an in-memory line buffer.
//!
//! Produces screen lines with:
//! * soft wrap at a fixed cell column (grapheme clusters are never split),
//! * folds rendered as the buffer row's text followed by `FOLD_CHARACTER`,
//! * scope tags: every line sits inside a `source` scope, with
//!   `leading-whitespace` / `trailing-whitespace` scopes and a `fold-marker`
//!   scope around the fold character.
//!
//! Screen lines are rebuilt per buffer row; rows an edit does not touch keep
//! their `ScreenLine` (and therefore their id).
//!
//! The "spatial index" mirrors a lazily indexed display layer: the longest-row
//! answer only considers rows that were indexed through
//! `populate_spatial_index_if_needed`, so it is an approximation until the
//! whole document has been indexed.

use crate::display::{DefaultCharWidths, DisplayModel, FOLD_CHARACTER, TagClassifier};
use crate::screen_line::{ScreenLine, ScreenLineId};
use core_text::egc_class;
use core_text::segment::{wrap_char_ranges, wrap_char_ranges_by};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::watch;

const ROOT_SCOPE: &str = "source";
const LEADING_WHITESPACE: &str = "leading-whitespace";
const TRAILING_WHITESPACE: &str = "trailing-whitespace";
const FOLD_MARKER: &str = "fold-marker";

/// Scope name <-> tag code registry. Open codes are `-(2k+1)`, the matching
/// close code is the open code minus one.
#[derive(Debug, Default, Clone)]
pub struct TagRegistry {
    tags: Vec<String>,
    codes: HashMap<String, i32>,
}

impl TagRegistry {
    pub fn open_code(&mut self, tag: &str) -> i32 {
        if let Some(code) = self.codes.get(tag) {
            return *code;
        }
        let index = self.tags.len() as i32;
        let code = -(2 * index + 1);
        self.tags.push(tag.to_string());
        self.codes.insert(tag.to_string(), code);
        code
    }

    pub fn close_code(&mut self, tag: &str) -> i32 {
        self.open_code(tag) - 1
    }

    pub fn tag(&self, code: i32) -> Option<&str> {
        if code >= 0 {
            return None;
        }
        let magnitude = -code;
        let index = if magnitude % 2 == 1 {
            (magnitude - 1) / 2
        } else {
            (magnitude - 2) / 2
        };
        self.tags.get(index as usize).map(String::as_str)
    }
}

pub struct TextDisplayModel {
    lines: Vec<String>,
    soft_wrap_column: u32,
    /// Set once the view reports its glyph advances; soft wrap then budgets
    /// `soft_wrap_column` base characters in pixels.
    char_widths: Option<DefaultCharWidths>,
    /// Inclusive buffer row ranges, sorted and non-overlapping.
    folds: Vec<(u32, u32)>,
    tags: TagRegistry,
    per_buffer_row: Vec<Vec<Arc<ScreenLine>>>,
    screen_rows: Vec<Arc<ScreenLine>>,
    buffer_rows: Vec<u32>,
    next_id: ScreenLineId,
    indexed_rows: u32,
    version: u64,
    changes: watch::Sender<u64>,
}

impl TextDisplayModel {
    pub fn new(text: &str) -> Self {
        let lines = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
            .collect();
        Self::from_lines(lines)
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        let (changes, _) = watch::channel(0);
        let mut model = Self {
            lines,
            soft_wrap_column: 0,
            char_widths: None,
            folds: Vec::new(),
            tags: TagRegistry::default(),
            per_buffer_row: Vec::new(),
            screen_rows: Vec::new(),
            buffer_rows: Vec::new(),
            next_id: 1,
            indexed_rows: 0,
            version: 0,
            changes,
        };
        model.rebuild_all();
        model
    }

    pub fn with_soft_wrap(mut self, column: u32) -> Self {
        self.set_soft_wrap_column(column);
        self
    }

    pub fn buffer_line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, buffer_row: usize) -> Option<&str> {
        self.lines.get(buffer_row).map(String::as_str)
    }

    pub fn default_char_widths(&self) -> Option<DefaultCharWidths> {
        self.char_widths
    }

    pub fn indexed_screen_rows(&self) -> u32 {
        self.indexed_rows
    }

    /// Replace the text of one buffer row. Only that row's screen lines change.
    pub fn set_line(&mut self, buffer_row: usize, text: impl Into<String>) -> bool {
        let Some(slot) = self.lines.get_mut(buffer_row) else {
            return false;
        };
        *slot = text.into();
        self.per_buffer_row[buffer_row] = self.build_buffer_row(buffer_row as u32);
        self.flatten();
        self.notify();
        true
    }

    pub fn insert_line(&mut self, buffer_row: usize, text: impl Into<String>) {
        let at = buffer_row.min(self.lines.len());
        self.lines.insert(at, text.into());
        for fold in &mut self.folds {
            if fold.0 >= at as u32 {
                fold.0 += 1;
                fold.1 += 1;
            }
        }
        let split = self.take_folds(|s, e| s < at as u32 && e >= at as u32);
        self.per_buffer_row.insert(at, Vec::new());
        self.per_buffer_row[at] = self.build_buffer_row(at as u32);
        // A split fold's rows after the insertion point moved down by one.
        self.rebuild_rows(split.into_iter().map(|(s, e)| (s, e + 1)));
        self.flatten();
        self.notify();
    }

    pub fn remove_line(&mut self, buffer_row: usize) -> Option<String> {
        if buffer_row >= self.lines.len() {
            return None;
        }
        let removed = self.lines.remove(buffer_row);
        let row = buffer_row as u32;
        let broken = self.take_folds(|s, e| s <= row && row <= e);
        for fold in &mut self.folds {
            if fold.0 > row {
                fold.0 -= 1;
                fold.1 -= 1;
            }
        }
        self.per_buffer_row.remove(buffer_row);
        self.rebuild_rows(broken.into_iter().map(|(s, e)| (s, e - 1)));
        self.flatten();
        self.notify();
        Some(removed)
    }

    /// Soft wrap at `column` cells; `0` disables wrapping.
    pub fn set_soft_wrap_column(&mut self, column: u32) {
        if self.soft_wrap_column == column {
            return;
        }
        self.soft_wrap_column = column;
        self.rebuild_all();
        self.notify();
    }

    /// Fold buffer rows `start..=end` into a single screen line. Rejects empty
    /// or overlapping ranges.
    pub fn fold_buffer_rows(&mut self, start: u32, end: u32) -> bool {
        if start >= end || end as usize >= self.lines.len() {
            return false;
        }
        if self.folds.iter().any(|(s, e)| start <= *e && end >= *s) {
            return false;
        }
        self.folds.push((start, end));
        self.folds.sort_unstable();
        for row in start..=end {
            self.per_buffer_row[row as usize] = self.build_buffer_row(row);
        }
        self.flatten();
        self.notify();
        true
    }

    pub fn unfold_all(&mut self) {
        if self.folds.is_empty() {
            return;
        }
        let folds = std::mem::take(&mut self.folds);
        self.rebuild_rows(folds);
        self.flatten();
        self.notify();
    }

    /// Remove and return the folds matching `pred`.
    fn take_folds(&mut self, pred: impl Fn(u32, u32) -> bool) -> Vec<(u32, u32)> {
        let (taken, kept) = std::mem::take(&mut self.folds)
            .into_iter()
            .partition(|(s, e)| pred(*s, *e));
        self.folds = kept;
        taken
    }

    /// Rebuild every buffer row of the given inclusive ranges, clamped to the
    /// buffer.
    fn rebuild_rows(&mut self, ranges: impl IntoIterator<Item = (u32, u32)>) {
        let last = self.per_buffer_row.len() as u32;
        for (start, end) in ranges {
            for row in start..=end.min(last.saturating_sub(1)) {
                if row < last {
                    self.per_buffer_row[row as usize] = self.build_buffer_row(row);
                }
            }
        }
    }

    fn notify(&mut self) {
        self.version += 1;
        self.changes.send_replace(self.version);
    }

    fn rebuild_all(&mut self) {
        self.per_buffer_row = (0..self.lines.len() as u32)
            .map(|row| self.build_buffer_row(row))
            .collect();
        self.flatten();
    }

    fn flatten(&mut self) {
        self.screen_rows.clear();
        self.buffer_rows.clear();
        for (buffer_row, lines) in self.per_buffer_row.iter().enumerate() {
            for line in lines {
                self.screen_rows.push(Arc::clone(line));
                self.buffer_rows.push(buffer_row as u32);
            }
        }
        self.indexed_rows = self.indexed_rows.min(self.screen_rows.len() as u32);
        tracing::trace!(
            target: "model.display",
            screen_rows = self.screen_rows.len(),
            buffer_rows = self.lines.len(),
            "display_reflow"
        );
    }

    fn is_hidden_by_fold(&self, row: u32) -> bool {
        self.folds.iter().any(|(s, e)| *s < row && row <= *e)
    }

    fn is_fold_start(&self, row: u32) -> bool {
        self.folds.iter().any(|(s, _)| *s == row)
    }

    fn build_buffer_row(&mut self, row: u32) -> Vec<Arc<ScreenLine>> {
        if self.is_hidden_by_fold(row) {
            return Vec::new();
        }
        let mut text = self.lines[row as usize].clone();
        let folded = self.is_fold_start(row);
        if folded {
            text.push(FOLD_CHARACTER);
        }
        let ranges = match self.char_widths {
            Some(widths) if widths.base > 0.0 => {
                let budget = f64::from(self.soft_wrap_column) * widths.base;
                wrap_char_ranges_by(&text, budget, |seg| widths.width_of(egc_class(seg.cluster)))
            }
            _ => wrap_char_ranges(&text, self.soft_wrap_column as usize),
        };
        let scopes = scope_spans(&text, folded);
        let chars: Vec<char> = text.chars().collect();
        let mut out = Vec::with_capacity(ranges.len());
        for range in ranges {
            let segment: String = chars[range.clone()].iter().collect();
            let tag_codes = self.tag_codes_for_segment(&range, &scopes);
            let id = self.next_id;
            self.next_id += 1;
            out.push(Arc::new(ScreenLine::new(id, segment, tag_codes)));
        }
        out
    }

    fn tag_codes_for_segment(
        &mut self,
        segment: &Range<usize>,
        scopes: &[(Range<usize>, &'static str)],
    ) -> Vec<i32> {
        let mut codes = vec![self.tags.open_code(ROOT_SCOPE)];
        if segment.is_empty() {
            codes.push(0);
        }
        let mut cursor = segment.start;
        for (range, scope) in scopes {
            let start = range.start.max(segment.start);
            let end = range.end.min(segment.end);
            if start >= end {
                continue;
            }
            if start > cursor {
                codes.push((start - cursor) as i32);
            }
            codes.push(self.tags.open_code(scope));
            codes.push((end - start) as i32);
            codes.push(self.tags.close_code(scope));
            cursor = end;
        }
        if segment.end > cursor {
            codes.push((segment.end - cursor) as i32);
        }
        codes.push(self.tags.close_code(ROOT_SCOPE));
        codes
    }
}

/// Non-overlapping scoped char ranges of a full (unwrapped) line, in order.
fn scope_spans(text: &str, folded: bool) -> Vec<(Range<usize>, &'static str)> {
    let chars: Vec<char> = text.chars().collect();
    let content_end = if folded { chars.len() - 1 } else { chars.len() };
    let leading = chars[..content_end]
        .iter()
        .take_while(|c| c.is_whitespace())
        .count();
    let mut spans = Vec::new();
    if leading == content_end {
        // Whitespace-only line: one leading span covers it.
        if leading > 0 {
            spans.push((0..leading, LEADING_WHITESPACE));
        }
    } else {
        let trailing = chars[..content_end]
            .iter()
            .rev()
            .take_while(|c| c.is_whitespace())
            .count();
        if leading > 0 {
            spans.push((0..leading, LEADING_WHITESPACE));
        }
        if trailing > 0 && !folded {
            spans.push((content_end - trailing..content_end, TRAILING_WHITESPACE));
        }
    }
    if folded {
        spans.push((content_end..chars.len(), FOLD_MARKER));
    }
    spans
}

fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

impl TagClassifier for TextDisplayModel {
    fn tag_for_code(&self, code: i32) -> Option<&str> {
        self.tags.tag(code)
    }
}

impl DisplayModel for TextDisplayModel {
    fn approximate_screen_line_count(&self) -> u32 {
        self.screen_rows.len() as u32
    }

    fn screen_line_for_row(&self, row: u32) -> Option<Arc<ScreenLine>> {
        self.screen_rows.get(row as usize).cloned()
    }

    fn screen_lines(&self, start_row: u32, end_row: u32) -> Vec<Arc<ScreenLine>> {
        let len = self.screen_rows.len();
        let start = (start_row as usize).min(len);
        let end = (end_row as usize).clamp(start, len);
        self.screen_rows[start..end].to_vec()
    }

    fn buffer_row_for_screen_row(&self, row: u32) -> u32 {
        if self.buffer_rows.is_empty() {
            return 0;
        }
        let idx = (row as usize).min(self.buffer_rows.len() - 1);
        self.buffer_rows[idx]
    }

    fn is_foldable_at_buffer_row(&self, buffer_row: u32) -> bool {
        let Some(line) = self.lines.get(buffer_row as usize) else {
            return false;
        };
        if line.trim().is_empty() {
            return false;
        }
        let indent = indent_width(line);
        self.lines[buffer_row as usize + 1..]
            .iter()
            .find(|l| !l.trim().is_empty())
            .is_some_and(|next| indent_width(next) > indent)
    }

    fn populate_spatial_index_if_needed(&mut self, _max_column: u32, max_row: u32) {
        let target = max_row.min(self.screen_rows.len() as u32);
        if target > self.indexed_rows {
            tracing::trace!(target: "model.display", from = self.indexed_rows, to = target, "spatial_index_extend");
            self.indexed_rows = target;
        }
    }

    fn approximate_longest_screen_row(&self) -> u32 {
        let mut best_row = 0u32;
        let mut best_len = 0u32;
        for (row, line) in self.screen_rows[..self.indexed_rows as usize]
            .iter()
            .enumerate()
        {
            let len = line.char_len();
            if len > best_len {
                best_len = len;
                best_row = row as u32;
            }
        }
        best_row
    }

    fn set_default_char_widths(&mut self, widths: DefaultCharWidths) -> bool {
        if self.char_widths == Some(widths) {
            return false;
        }
        self.char_widths = Some(widths);
        if self.soft_wrap_column == 0 {
            return false;
        }
        self.rebuild_all();
        self.notify();
        tracing::debug!(
            target: "model.display",
            base = widths.base,
            screen_rows = self.screen_rows.len(),
            "rewrapped_for_char_widths"
        );
        true
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}
