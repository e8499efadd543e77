use crate::screen_line::ScreenLine;
use core_text::CharWidthClass;
use std::sync::Arc;
use tokio::sync::watch;

/// Sentinel character a display model substitutes for a folded region.
pub const FOLD_CHARACTER: char = '\u{22EF}';

/// Reference advances measured by the view, one per width class, in pixels.
/// Display layers that wrap by visual width use them instead of cell counts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DefaultCharWidths {
    pub base: f64,
    pub double_width: f64,
    pub half_width: f64,
    pub korean: f64,
}

impl DefaultCharWidths {
    pub fn width_of(&self, class: CharWidthClass) -> f64 {
        match class {
            CharWidthClass::Zero => 0.0,
            CharWidthClass::Narrow => self.base,
            CharWidthClass::HalfWidth => self.half_width,
            CharWidthClass::DoubleWidth => self.double_width,
            CharWidthClass::Korean => self.korean,
        }
    }
}

/// Classification of the tag codes found in `ScreenLine::tag_codes`.
pub trait TagClassifier {
    fn is_open_tag_code(&self, code: i32) -> bool {
        code < 0 && code % 2 == -1
    }

    fn is_close_tag_code(&self, code: i32) -> bool {
        code < 0 && code % 2 == 0
    }

    /// Scope name for an open or close code. `None` for unknown codes.
    fn tag_for_code(&self, code: i32) -> Option<&str>;

    fn fold_character(&self) -> char {
        FOLD_CHARACTER
    }
}

/// The line-wrapping / display layer the renderer reads from.
///
/// Row arguments past the end are tolerated: implementations return `None`,
/// an empty vector or a clamped answer rather than panicking.
pub trait DisplayModel: TagClassifier {
    /// Screen line count. May be an estimate for lazily indexed models.
    fn approximate_screen_line_count(&self) -> u32;

    fn screen_line_for_row(&self, row: u32) -> Option<Arc<ScreenLine>>;

    /// Screen lines for `[start_row, end_row)`.
    fn screen_lines(&self, start_row: u32, end_row: u32) -> Vec<Arc<ScreenLine>>;

    fn buffer_row_for_screen_row(&self, row: u32) -> u32;

    fn is_foldable_at_buffer_row(&self, buffer_row: u32) -> bool;

    /// Make sure the spatial index covers at least rows `< max_row` (and
    /// columns up to `max_column`).
    fn populate_spatial_index_if_needed(&mut self, max_column: u32, max_row: u32);

    /// Best-known longest screen row within the indexed range.
    fn approximate_longest_screen_row(&self) -> u32;

    /// Receive the view's reference glyph advances. Returns true when screen
    /// lines were rebuilt (and subscribers notified).
    fn set_default_char_widths(&mut self, _widths: DefaultCharWidths) -> bool {
        false
    }

    fn line_length_for_screen_row(&self, row: u32) -> u32 {
        self.screen_line_for_row(row)
            .map(|l| l.char_len())
            .unwrap_or(0)
    }

    /// Subscribe to change notifications. The value is a monotonically
    /// increasing version.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    impl TagClassifier for Plain {
        fn tag_for_code(&self, _code: i32) -> Option<&str> {
            None
        }
    }

    #[test]
    fn default_code_classification() {
        let p = Plain;
        assert!(p.is_open_tag_code(-1));
        assert!(p.is_open_tag_code(-7));
        assert!(p.is_close_tag_code(-2));
        assert!(p.is_close_tag_code(-8));
        assert!(!p.is_open_tag_code(0));
        assert!(!p.is_close_tag_code(0));
        assert!(!p.is_open_tag_code(5));
        assert!(!p.is_close_tag_code(4));
        assert_eq!(p.fold_character(), FOLD_CHARACTER);
    }

    #[test]
    fn reference_width_per_class() {
        let w = DefaultCharWidths {
            base: 7.0,
            double_width: 14.0,
            half_width: 6.0,
            korean: 13.0,
        };
        assert_eq!(w.width_of(CharWidthClass::Zero), 0.0);
        assert_eq!(w.width_of(CharWidthClass::Narrow), 7.0);
        assert_eq!(w.width_of(CharWidthClass::HalfWidth), 6.0);
        assert_eq!(w.width_of(CharWidthClass::DoubleWidth), 14.0);
        assert_eq!(w.width_of(CharWidthClass::Korean), 13.0);
    }
}
