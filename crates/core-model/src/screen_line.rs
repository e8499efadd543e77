/// Stable identity of a screen line, independent of its content.
pub type ScreenLineId = u64;

/// A position in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// One wrapped / folded line as produced by the display model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenLine {
    pub id: ScreenLineId,
    pub line_text: String,
    pub tag_codes: Vec<i32>,
}

impl ScreenLine {
    pub fn new(id: ScreenLineId, line_text: impl Into<String>, tag_codes: Vec<i32>) -> Self {
        Self {
            id,
            line_text: line_text.into(),
            tag_codes,
        }
    }

    /// Line length in columns (chars).
    pub fn char_len(&self) -> u32 {
        self.line_text.chars().count() as u32
    }

    /// Total chars claimed by text-run codes. Equal to `char_len` for a well
    /// formed line.
    pub fn run_len(&self) -> u32 {
        self.tag_codes
            .iter()
            .filter(|c| **c > 0)
            .map(|c| *c as u32)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_count_chars() {
        let l = ScreenLine::new(1, "a漢b", vec![-1, 3, -2]);
        assert_eq!(l.char_len(), 3);
        assert_eq!(l.run_len(), 3);
    }

    #[test]
    fn points_order_row_major() {
        assert!(Point::new(1, 0) > Point::new(0, 99));
        assert!(Point::new(2, 3) < Point::new(2, 4));
    }
}
