//! Terminal writer.
//!
//! Translates the committed state of a `GridSurface` into primitive terminal
//! commands (MoveTo, ClearLine, Print) and flushes them in one batch. Pixel
//! geometry is converted back to cells using the surface's cell metrics.
//!
//! Invariants:
//! * Commands preserve ordering; no flushing mid-frame.
//! * Every painted row starts with `MoveTo(0, y)` + `ClearLine` so shorter
//!   text never leaves stale glyphs behind.
//! * Text is clipped to the scroller: cells left of `scroll_left` and past the
//!   right edge are dropped; a double-width glyph straddling either edge is
//!   dropped whole.

use crate::grid_surface::GridSurface;
use anyhow::Result;
use core_text::char_cell_width;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::io::{Write, stdout};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MoveTo(u16, u16),
    ClearLine,
    Print(String),
    ShowCursor,
    HideCursor,
}

#[derive(Debug, Default)]
pub struct Writer {
    cmds: Vec<Command>,
}

impl Writer {
    pub fn new() -> Self {
        Self { cmds: Vec::new() }
    }
    pub fn move_to(&mut self, x: u16, y: u16) {
        self.cmds.push(Command::MoveTo(x, y));
    }
    pub fn clear_line(&mut self) {
        self.cmds.push(Command::ClearLine);
    }
    pub fn print<S: Into<String>>(&mut self, s: S) {
        let s: String = s.into();
        if !s.is_empty() {
            self.cmds.push(Command::Print(s));
        }
    }
    pub fn commands(&self) -> &[Command] {
        &self.cmds
    }

    pub fn flush(self) -> Result<()> {
        let mut out = stdout();
        self.flush_to(&mut out)
    }

    pub fn flush_to<W: Write>(self, out: &mut W) -> Result<()> {
        for c in self.cmds {
            match c {
                Command::MoveTo(x, y) => queue!(out, MoveTo(x, y))?,
                Command::ClearLine => queue!(out, Clear(ClearType::CurrentLine))?,
                Command::Print(s) => queue!(out, Print(s))?,
                Command::ShowCursor => queue!(out, Show)?,
                Command::HideCursor => queue!(out, Hide)?,
            }
        }
        out.flush()?;
        Ok(())
    }
}

fn cells(pixels: f64, cell_width: f64) -> u32 {
    if cell_width <= 0.0 {
        return 0;
    }
    (pixels / cell_width).round().max(0.0) as u32
}

/// Keep the chars whose cells fall entirely inside `[skip, skip + width)`.
fn clip_cells(text: &str, skip: u32, width: u32) -> String {
    let end = skip.saturating_add(width);
    let mut at = 0u32;
    let mut out = String::new();
    for ch in text.chars() {
        let w = u32::from(char_cell_width(ch));
        if at >= skip && at + w <= end {
            out.push(ch);
        }
        at += w;
        if at >= end {
            break;
        }
    }
    out
}

/// Build the commands painting every visible row of `surface`, then place the
/// terminal cursor on the hidden input (shown only while focused).
pub fn paint_surface(surface: &GridSurface) -> Writer {
    let mut w = Writer::new();
    let cell = surface.cell_width();
    let line_height = surface.line_height();
    let (viewport_width, viewport_height) = surface.viewport_size();
    let (scroll_top, scroll_left) = surface.scroll_offsets();
    let gutter_cells = cells(surface.gutter_width(), cell);
    let text_cells = cells(viewport_width, cell).saturating_sub(gutter_cells);
    let skip = cells(scroll_left, cell);
    let first_row = if line_height > 0.0 {
        (scroll_top / line_height).floor().max(0.0) as u32
    } else {
        0
    };
    let height = if line_height > 0.0 {
        (viewport_height / line_height).floor().max(0.0) as u32
    } else {
        0
    };

    w.cmds.push(Command::HideCursor);
    let mut painted = 0u32;
    for row in surface.visible_rows() {
        let y = row.row.saturating_sub(first_row);
        if y >= height {
            break;
        }
        let y = y.min(u32::from(u16::MAX)) as u16;
        w.move_to(0, y);
        w.clear_line();
        if gutter_cells > 0 {
            let label = row.gutter.unwrap_or_default();
            let width = gutter_cells as usize;
            w.print(format!("{label:>width$}", width = width.saturating_sub(1)) + " ");
        }
        w.print(clip_cells(&row.text, skip, text_cells));
        painted += 1;
    }
    for y in painted..height {
        let y = y.min(u32::from(u16::MAX)) as u16;
        w.move_to(0, y);
        w.clear_line();
    }

    if let Some(input) = surface.hidden_input().filter(|_| surface.is_focused()) {
        let x = gutter_cells + cells(input.pixel_left, cell);
        let y = if line_height > 0.0 {
            (input.pixel_top / line_height).round().max(0.0) as u32
        } else {
            0
        };
        w.move_to(
            x.min(u32::from(u16::MAX)) as u16,
            y.min(u32::from(u16::MAX)) as u16,
        );
        w.cmds.push(Command::ShowCursor);
    }
    w
}
