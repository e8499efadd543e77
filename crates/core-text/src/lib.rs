//! Text width primitives shared by the display model and the rendering surface.
//!
//! Columns throughout the workspace count `char`s; widths count grid cells.

pub mod segment;
pub mod width;

pub use width::{
    CharWidthClass, ZERO_WIDTH_NBSP, char_cell_width, classify_char, egc_class, egc_width,
    is_conjoining_jamo, is_double_width_char, is_half_width_char, is_korean_char,
    str_cell_width,
};
