//! Render engine error taxonomy.
//!
//! None of these are user-facing failures. `StaleLine` / `StaleScreenLine` and
//! `MissingPosition` indicate a scheduling-order defect and are surfaced
//! immediately; `Unmeasured` is returned by pixel helpers called before the
//! first successful dimension measurement.

use core_model::ScreenLineId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("measurement requested for screen row {row}, which is not rendered")]
    StaleLine { row: u32 },
    #[error("screen line {id} has no rendered node on the surface")]
    StaleScreenLine { id: ScreenLineId },
    #[error("view has not been measured yet")]
    Unmeasured,
    #[error("no measured position for row {row}, column {column}")]
    MissingPosition { row: u32, column: u32 },
}

pub type Result<T> = std::result::Result<T, RenderError>;
