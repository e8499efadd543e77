//! Character width classification.
//!
//! The rendering surface and the cursor geometry both need to know how wide a
//! glyph is relative to the base character cell. Classification is split into
//! the script buckets the measurement pass keeps reference widths for:
//!
//! * `DoubleWidth`: East Asian wide / fullwidth characters (CJK ideographs,
//!   fullwidth forms, most emoji presentation characters).
//! * `HalfWidth`: the halfwidth katakana / hangul and halfwidth symbol blocks.
//! * `Korean`: Hangul syllables, leading and compatibility jamo. These are
//!   double width in a terminal
//!   but proportional fonts give them their own advance, so they get a
//!   dedicated reference width instead of sharing the double-width one.
//! * `Zero`: combining marks, format characters (ZWJ, ZWNBSP, ...) and the
//!   conjoining medial / final jamo that attach to a leading jamo.
//!
//! Invariants:
//! - Classification is total; every `char` maps to exactly one class.
//! - `Korean` wins over `DoubleWidth` (Hangul syllables are also East Asian wide).
//! - Unknown / control characters are `Narrow` (over-estimation is harmless,
//!   under-estimation causes render drift).

use unicode_width::UnicodeWidthChar;

/// Zero width no-break space. Appended after a trailing fold marker so the
/// marker's trailing edge can be measured.
pub const ZERO_WIDTH_NBSP: char = '\u{FEFF}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharWidthClass {
    Zero,
    Narrow,
    HalfWidth,
    DoubleWidth,
    Korean,
}

impl CharWidthClass {
    /// Width in terminal / grid cells.
    #[inline]
    pub fn cells(self) -> u16 {
        match self {
            CharWidthClass::Zero => 0,
            CharWidthClass::Narrow | CharWidthClass::HalfWidth => 1,
            CharWidthClass::DoubleWidth | CharWidthClass::Korean => 2,
        }
    }
}

pub fn is_korean_char(c: char) -> bool {
    matches!(c as u32,
        0xAC00..=0xD7A3 // syllables
        | 0x1100..=0x115F // leading jamo
        | 0x3130..=0x318F // compatibility jamo
        | 0xA960..=0xA97F) // jamo extended-A (leading)
}

/// Medial vowel and final consonant jamo. They combine with the preceding
/// leading jamo into one syllable block and add no advance of their own.
pub fn is_conjoining_jamo(c: char) -> bool {
    matches!(c as u32, 0x1160..=0x11FF | 0xD7B0..=0xD7FF)
}

pub fn is_half_width_char(c: char) -> bool {
    matches!(c as u32, 0xFF65..=0xFFDC | 0xFFE8..=0xFFEE)
}

pub fn is_double_width_char(c: char) -> bool {
    !is_korean_char(c) && !is_half_width_char(c) && !is_conjoining_jamo(c) && c.width() == Some(2)
}

fn is_zero_width_char(c: char) -> bool {
    if matches!(c, ZERO_WIDTH_NBSP | '\u{200B}'..='\u{200D}' | '\u{2060}')
        || is_conjoining_jamo(c)
    {
        return true;
    }
    // Control characters report `None`; only genuine zero-advance code points land here.
    c.width() == Some(0)
}

/// Classify a single character.
pub fn classify_char(c: char) -> CharWidthClass {
    if is_korean_char(c) {
        CharWidthClass::Korean
    } else if is_half_width_char(c) {
        CharWidthClass::HalfWidth
    } else if is_zero_width_char(c) {
        CharWidthClass::Zero
    } else if c.width() == Some(2) {
        CharWidthClass::DoubleWidth
    } else {
        CharWidthClass::Narrow
    }
}

#[inline]
pub fn char_cell_width(c: char) -> u16 {
    classify_char(c).cells()
}

/// Sum of cell widths over every character of `s`.
pub fn str_cell_width(s: &str) -> usize {
    s.chars().map(|c| char_cell_width(c) as usize).sum()
}

/// Width class of a grapheme cluster: its widest code point. A cluster made
/// only of zero-width code points is `Narrow` so it stays addressable.
pub fn egc_class(egc: &str) -> CharWidthClass {
    egc.chars()
        .map(classify_char)
        .filter(|class| *class != CharWidthClass::Zero)
        .max_by_key(|class| class.cells())
        .unwrap_or(CharWidthClass::Narrow)
}

/// Cell width of a single grapheme cluster.
pub fn egc_width(egc: &str) -> u16 {
    if egc.is_empty() {
        return 0;
    }
    egc_class(egc).cells()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_narrow() {
        for c in ['a', 'Z', '0', ' ', '~'] {
            assert_eq!(classify_char(c), CharWidthClass::Narrow, "{c:?}");
        }
    }

    #[test]
    fn cjk_is_double_width() {
        assert_eq!(classify_char('漢'), CharWidthClass::DoubleWidth);
        assert_eq!(classify_char('Ａ'), CharWidthClass::DoubleWidth); // fullwidth A
        assert!(is_double_width_char('漢'));
    }

    #[test]
    fn hangul_is_korean_not_double() {
        assert_eq!(classify_char('한'), CharWidthClass::Korean);
        assert_eq!(classify_char('ㄱ'), CharWidthClass::Korean);
        assert!(!is_double_width_char('한'));
        assert_eq!(char_cell_width('한'), 2);
    }

    #[test]
    fn decomposed_hangul_matches_precomposed() {
        let decomposed = "\u{1112}\u{1161}\u{11AB}";
        assert_eq!(classify_char('\u{1112}'), CharWidthClass::Korean);
        assert_eq!(classify_char('\u{1161}'), CharWidthClass::Zero);
        assert_eq!(classify_char('\u{11AB}'), CharWidthClass::Zero);
        assert_eq!(classify_char('\u{D7B0}'), CharWidthClass::Zero);
        assert_eq!(str_cell_width(decomposed), 2);
        assert_eq!(str_cell_width(decomposed), str_cell_width("\u{D55C}"));
        assert_eq!(egc_width(decomposed), 2);
    }

    #[test]
    fn halfwidth_katakana() {
        assert_eq!(classify_char('ｱ'), CharWidthClass::HalfWidth);
        assert_eq!(char_cell_width('ｱ'), 1);
    }

    #[test]
    fn combining_and_format_are_zero() {
        assert_eq!(classify_char('\u{0301}'), CharWidthClass::Zero);
        assert_eq!(classify_char(ZERO_WIDTH_NBSP), CharWidthClass::Zero);
        assert_eq!(classify_char('\u{200D}'), CharWidthClass::Zero);
    }

    #[test]
    fn str_and_cluster_widths() {
        assert_eq!(str_cell_width("ab漢"), 4);
        assert_eq!(egc_width("e\u{0301}"), 1);
        assert_eq!(egc_width("漢"), 2);
        assert_eq!(egc_width(""), 0);
        assert_eq!(egc_width("\u{200D}"), 1);
    }

    #[test]
    fn cluster_class_is_widest_member() {
        assert_eq!(egc_class("e\u{0301}"), CharWidthClass::Narrow);
        assert_eq!(egc_class("\u{1112}\u{1161}"), CharWidthClass::Korean);
        assert_eq!(egc_class("漢"), CharWidthClass::DoubleWidth);
        assert_eq!(egc_class("\u{FEFF}"), CharWidthClass::Narrow);
    }
}
