//! Display and selection model seams consumed by the render engine.
//!
//! The render engine never owns document text. It asks a `DisplayModel` for
//! screen lines (already wrapped and folded, with their tag-code encoding) and
//! a `SelectionModel` for cursor markers. Both are traits so hosts can plug in
//! their own line-wrapping layer and marker store; this crate also ships small
//! reference implementations (`TextDisplayModel`, `CursorSet`) that the binary
//! and the integration tests drive.
//!
//! Core invariants:
//! * A `ScreenLine` is immutable once produced. An edit yields new lines with
//!   new ids; untouched rows keep their ids so renderers can reuse nodes.
//! * Tag codes: positive = text run length in chars, negative odd = open scope,
//!   negative even = close scope, `0` = zero-length marker.
//! * Screen rows and columns are `u32`; columns count chars.
//!
//! Change notification uses `tokio::sync::watch`: every mutation bumps a
//! version; subscribers check `has_changed()` without awaiting.

mod display;
mod screen_line;
mod selection;
mod text_display;

pub use display::{DefaultCharWidths, DisplayModel, FOLD_CHARACTER, TagClassifier};
pub use screen_line::{Point, ScreenLine, ScreenLineId};
pub use selection::{CursorSet, MarkerFilter, MarkerId, SelectionModel};
pub use text_display::{TagRegistry, TextDisplayModel};
