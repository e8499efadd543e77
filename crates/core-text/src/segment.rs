//! Grapheme segmentation with cell widths.
//!
//! Contract:
//! - Output segments are in order, non-overlapping and cover the whole input.
//! - `start`/`end` are byte offsets, `char_start` is the char column of the
//!   cluster's first code point (columns in this workspace count chars).
//! - Does not log content.

use crate::egc_width;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub cluster: &'a str,
    pub start: usize,
    pub end: usize,
    pub char_start: usize,
    pub width: u16,
}

/// Segment `input` into grapheme clusters with byte ranges and cell widths.
pub fn segments(input: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut char_start = 0usize;
    for (start, g) in input.grapheme_indices(true) {
        out.push(Segment {
            cluster: g,
            start,
            end: start + g.len(),
            char_start,
            width: egc_width(g),
        });
        char_start += g.chars().count();
    }
    out
}

/// Split `input` into chunks no wider than `max_cells`, never breaking a
/// grapheme cluster. A cluster wider than the limit gets a chunk of its own.
/// Returns char ranges.
pub fn wrap_char_ranges(input: &str, max_cells: usize) -> Vec<std::ops::Range<usize>> {
    wrap_char_ranges_by(input, max_cells as f64, |seg| f64::from(seg.width))
}

/// Like `wrap_char_ranges`, with each cluster's advance supplied by
/// `advance` (pixels, or any unit shared with `max_width`). A non-positive
/// `max_width` disables wrapping.
pub fn wrap_char_ranges_by<F>(input: &str, max_width: f64, advance: F) -> Vec<std::ops::Range<usize>>
where
    F: Fn(&Segment<'_>) -> f64,
{
    let total_chars = input.chars().count();
    if max_width <= 0.0 || total_chars == 0 {
        return vec![0..total_chars];
    }
    let mut ranges = Vec::new();
    let mut chunk_start = 0usize;
    let mut chunk_width = 0.0f64;
    for seg in segments(input) {
        let w = advance(&seg);
        if chunk_width > 0.0 && chunk_width + w > max_width {
            ranges.push(chunk_start..seg.char_start);
            chunk_start = seg.char_start;
            chunk_width = 0.0;
        }
        chunk_width += w;
    }
    ranges.push(chunk_start..total_chars);
    ranges
}
