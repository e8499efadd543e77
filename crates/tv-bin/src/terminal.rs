//! Alternate-screen handling for painted sessions.

use anyhow::Result;
use crossterm::{
    cursor::Show,
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, SetTitle},
};
use std::io::stdout;

/// RAII guard restoring the primary screen even if the session early-returns or panics.
pub struct AlternateScreen {
    entered: bool,
}

impl AlternateScreen {
    pub fn enter(title: &str) -> Result<Self> {
        execute!(stdout(), EnterAlternateScreen, SetTitle(title))?;
        Ok(Self { entered: true })
    }

    pub fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), LeaveAlternateScreen, Show)?;
            self.entered = false;
        }
        Ok(())
    }
}

impl Drop for AlternateScreen {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

/// Terminal size in cells, if stdout is a terminal.
pub fn size_in_cells() -> Option<(u16, u16)> {
    crossterm::terminal::size()
        .ok()
        .filter(|(w, h)| *w > 0 && *h > 0)
}
