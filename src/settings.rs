use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::components::history::DEFAULT_HISTORY_LIMIT;
use crate::components::tools::{BrushSizes, DEFAULT_SPACING};
use crate::error::TrimapError;
use crate::viewport::MAX_ZOOM;

/// Longest accepted click delay, in milliseconds.
pub const MAX_DOT_DELAY_MS: u64 = 10_000;

/// Colour and opacity used to tint one mask layer in the normal view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tint {
    pub color: [u8; 3],
    /// 0.0 – 1.0
    pub opacity: f32,
}

impl Tint {
    pub const fn new(color: [u8; 3], opacity: f32) -> Self {
        Self { color, opacity }
    }
}

/// Checkerboard behind the cutout view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkerboard {
    /// Cell edge in view pixels.
    pub cell: u32,
    pub light: [u8; 3],
    pub dark: [u8; 3],
}

impl Default for Checkerboard {
    fn default() -> Self {
        Self {
            cell: 10,
            light: [204, 204, 204],
            dark: [153, 153, 153],
        }
    }
}

/// Editor settings that persist across sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    pub unknown_tint: Tint,
    pub foreground_tint: Tint,
    /// Maximum number of undo snapshots.
    pub history_limit: usize,
    pub max_zoom: f32,
    /// Multiplier for keyboard zoom in / out.
    pub zoom_step: f32,
    /// Delay before an unmoved click paints, in milliseconds.
    pub dot_delay_ms: u64,
    /// Stamp spacing as a fraction of the brush radius.
    pub stroke_spacing: f32,
    pub brushes: BrushSizes,
    pub checkerboard: Checkerboard,
    /// Fill outside the image extent.
    pub background: [u8; 4],
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            unknown_tint: Tint::new([255, 193, 7], 0.5),
            foreground_tint: Tint::new([76, 175, 80], 0.5),
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_zoom: MAX_ZOOM,
            zoom_step: 1.25,
            dot_delay_ms: 300,
            stroke_spacing: DEFAULT_SPACING,
            brushes: BrushSizes::default(),
            checkerboard: Checkerboard::default(),
            background: [30, 30, 30, 255],
        }
    }
}

impl EditorSettings {
    pub fn dot_delay(&self) -> Duration {
        Duration::from_millis(self.dot_delay_ms)
    }

    /// Platform settings file: `$XDG_CONFIG_HOME/trimap-editor/settings.json`
    /// on Linux, `%APPDATA%\trimap-editor\settings.json` on Windows and
    /// `~/Library/Application Support/trimap-editor/settings.json` on macOS.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        let base = std::env::var("APPDATA")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from);
        #[cfg(target_os = "macos")]
        let base = std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join("Library").join("Application Support"));
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let base = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            });
        base.map(|dir| dir.join("trimap-editor").join("settings.json"))
    }

    /// Load from the platform path. Missing or broken files give defaults.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, TrimapError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, TrimapError> {
        let settings: EditorSettings = serde_json::from_str(content)?;
        Ok(settings.sanitized())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), TrimapError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Pull out-of-range values back into range.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.history_limit = self.history_limit.max(1);
        self.dot_delay_ms = self.dot_delay_ms.min(MAX_DOT_DELAY_MS);
        if !(self.max_zoom > 0.0) {
            self.max_zoom = defaults.max_zoom;
        }
        if !(self.zoom_step > 1.0) {
            self.zoom_step = defaults.zoom_step;
        }
        if !(self.stroke_spacing > 0.0) {
            self.stroke_spacing = defaults.stroke_spacing;
        }
        self.unknown_tint.opacity = self.unknown_tint.opacity.clamp(0.0, 1.0);
        self.foreground_tint.opacity = self.foreground_tint.opacity.clamp(0.0, 1.0);
        self.checkerboard.cell = self.checkerboard.cell.max(1);
        let b = &mut self.brushes;
        if !(b.min > 0.0 && b.max >= b.min) {
            let d = BrushSizes::default();
            b.min = d.min;
            b.max = d.max;
        }
        b.brush = b.brush.clamp(b.min, b.max);
        b.eraser = b.eraser.clamp(b.min, b.max);
        self
    }
}
