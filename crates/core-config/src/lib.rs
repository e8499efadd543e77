//! Configuration loading and parsing.
//!
//! Reads `tileview.toml` (or an override path provided by the binary). Two
//! tables are recognised:
//!
//! * `[view]`: `rows_per_tile`, `show_line_numbers`, `soft_wrap_column`.
//! * `[surface]`: cell metrics and viewport size for the grid surface.
//!
//! Missing files and parse errors fall back to defaults. Unknown fields are
//! ignored so the file can evolve ahead of the binary. The raw parsed values are
//! retained; `Config::apply_context` derives the effective (clamped) values and
//! can be re-run when the viewport changes.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "tileview.toml";

/// Viewport facts known only at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigContext {
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl ConfigContext {
    pub fn new(viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            viewport_width,
            viewport_height,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ViewConfig {
    #[serde(default = "ViewConfig::default_rows_per_tile")]
    pub rows_per_tile: u32,
    #[serde(default = "ViewConfig::default_show_line_numbers")]
    pub show_line_numbers: bool,
    #[serde(default)]
    pub soft_wrap_column: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            rows_per_tile: Self::default_rows_per_tile(),
            show_line_numbers: Self::default_show_line_numbers(),
            soft_wrap_column: 0,
        }
    }
}

impl ViewConfig {
    const fn default_rows_per_tile() -> u32 {
        6
    }
    const fn default_show_line_numbers() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SurfaceConfig {
    #[serde(default = "SurfaceConfig::default_cell_width")]
    pub cell_width: f64,
    #[serde(default = "SurfaceConfig::default_line_height")]
    pub line_height: f64,
    #[serde(default = "SurfaceConfig::default_viewport_width")]
    pub viewport_width: f64,
    #[serde(default = "SurfaceConfig::default_viewport_height")]
    pub viewport_height: f64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            cell_width: Self::default_cell_width(),
            line_height: Self::default_line_height(),
            viewport_width: Self::default_viewport_width(),
            viewport_height: Self::default_viewport_height(),
        }
    }
}

impl SurfaceConfig {
    const fn default_cell_width() -> f64 {
        8.0
    }
    const fn default_line_height() -> f64 {
        16.0
    }
    const fn default_viewport_width() -> f64 {
        640.0
    }
    const fn default_viewport_height() -> f64 {
        320.0
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
    pub effective_rows_per_tile: u32,
    pub effective_line_height: f64,
    pub effective_cell_width: f64,
}

/// Best-effort config path: working directory first, then the platform config
/// dir (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("tileview").join(CONFIG_FILE_NAME);
    }
    PathBuf::from(CONFIG_FILE_NAME)
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config {
            raw: Some(content),
            file,
            ..Config::default()
        }),
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Compute the effective values for the given viewport.
    ///
    /// * `rows_per_tile` is at least 1 and at most the number of rows the
    ///   viewport can show (never below 1).
    /// * Non-positive or non-finite cell metrics fall back to their defaults.
    ///
    /// Returns the effective rows-per-tile.
    pub fn apply_context(&mut self, ctx: ConfigContext) -> u32 {
        let line_height = sanitize(
            self.file.surface.line_height,
            SurfaceConfig::default_line_height(),
        );
        let cell_width = sanitize(
            self.file.surface.cell_width,
            SurfaceConfig::default_cell_width(),
        );
        if line_height != self.file.surface.line_height || cell_width != self.file.surface.cell_width
        {
            info!(
                target: "config",
                raw_line_height = self.file.surface.line_height,
                raw_cell_width = self.file.surface.cell_width,
                line_height,
                cell_width,
                "surface_metrics_defaulted"
            );
        }

        let raw = self.file.view.rows_per_tile;
        let visible_rows = if ctx.viewport_height.is_finite() && ctx.viewport_height > 0.0 {
            ((ctx.viewport_height / line_height).ceil() as u32).max(1)
        } else {
            1
        };
        let clamped = raw.clamp(1, visible_rows.max(1));
        if clamped != raw {
            info!(
                target: "config",
                raw,
                clamped,
                visible_rows,
                viewport_height = ctx.viewport_height,
                viewport_width = ctx.viewport_width,
                "rows_per_tile_clamped"
            );
        }
        self.effective_rows_per_tile = clamped;
        self.effective_line_height = line_height;
        self.effective_cell_width = cell_width;
        clamped
    }

    /// Re-run `apply_context` after a viewport change. Returns
    /// `Some(new_rows_per_tile)` when the effective value changed.
    pub fn recompute_with_context(&mut self, ctx: ConfigContext) -> Option<u32> {
        let prev = self.effective_rows_per_tile;
        let current = self.apply_context(ctx);
        if current != prev { Some(current) } else { None }
    }

    /// Context built from the configured surface size.
    pub fn surface_context(&self) -> ConfigContext {
        ConfigContext::new(
            self.file.surface.viewport_width,
            self.file.surface.viewport_height,
        )
    }
}

fn sanitize(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}
