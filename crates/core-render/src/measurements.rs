use crate::surface::SurfaceDimensions;
use core_model::DefaultCharWidths;

/// Live view metrics. The engine holds `Option<Measurements>`: `None` until the
/// surface produced a first meaningful dimension read, and every pixel
/// computation is gated on it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurements {
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub scroller_width: f64,
    pub scroller_height: f64,
    pub line_height: f64,
    pub base_character_width: f64,
    /// Reference advances per width class. Forwarded to the display model so
    /// soft wrap budgets visual width, see `default_char_widths`.
    pub double_width_character_width: f64,
    pub half_width_character_width: f64,
    pub korean_character_width: f64,
    pub line_number_gutter_width: f64,
    pub longest_line_width: f64,
    pub content_width: f64,
    pub scroll_width: f64,
}

impl Measurements {
    pub fn from_dimensions(dims: &SurfaceDimensions) -> Self {
        let mut m = Self::default();
        m.apply_dimensions(dims);
        m
    }

    /// Overwrite every dimension field; scroll offsets and the longest line
    /// width are kept.
    pub fn apply_dimensions(&mut self, dims: &SurfaceDimensions) {
        self.scroller_width = dims.scroller_width;
        self.scroller_height = dims.scroller_height;
        self.line_height = dims.line_height;
        self.base_character_width = dims.base_character_width;
        self.double_width_character_width = dims.double_width_character_width;
        self.half_width_character_width = dims.half_width_character_width;
        self.korean_character_width = dims.korean_character_width;
        self.line_number_gutter_width = dims.line_number_gutter_width;
        self.update_scroll_width();
    }

    pub fn default_char_widths(&self) -> DefaultCharWidths {
        DefaultCharWidths {
            base: self.base_character_width,
            double_width: self.double_width_character_width,
            half_width: self.half_width_character_width,
            korean: self.korean_character_width,
        }
    }

    pub fn set_longest_line_width(&mut self, width: f64) {
        self.longest_line_width = width;
        self.update_scroll_width();
    }

    fn update_scroll_width(&mut self) {
        self.content_width = (self.longest_line_width + self.base_character_width).ceil();
        self.scroll_width = self.content_width.max(self.scroller_width);
    }

    pub fn content_height(&self, total_rows: u32) -> f64 {
        total_rows as f64 * self.line_height
    }

    pub fn max_scroll_top(&self, total_rows: u32) -> f64 {
        (self.content_height(total_rows) - self.scroller_height).max(0.0)
    }

    pub fn max_scroll_left(&self) -> f64 {
        (self.scroll_width - self.scroller_width).max(0.0)
    }

    /// Clamp a requested vertical offset. Returns the applied value.
    pub fn clamp_scroll_top(&mut self, requested: f64, total_rows: u32) -> f64 {
        let top = if requested.is_finite() { requested } else { 0.0 };
        self.scroll_top = top.clamp(0.0, self.max_scroll_top(total_rows));
        self.scroll_top
    }

    pub fn clamp_scroll_left(&mut self, requested: f64) -> f64 {
        let left = if requested.is_finite() { requested } else { 0.0 };
        self.scroll_left = left.clamp(0.0, self.max_scroll_left());
        self.scroll_left
    }

    /// Pixel top of a screen row in content coordinates.
    pub fn pixel_top_for_row(&self, row: u32) -> f64 {
        row as f64 * self.line_height
    }
}
