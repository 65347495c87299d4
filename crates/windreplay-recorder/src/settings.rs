//! User settings, stored as `settings.json` in the macro directory
//!
//! Missing fields take their defaults. A zero capture interval is replaced
//! with the default, with a warning.

use crate::capture::CaptureConfig;
use crate::playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use windreplay_core::MotionStyle;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Pointer sampling period in milliseconds. Defaults to `10`.
    #[serde(default = "default_interval_ms")]
    pub capture_interval_ms: u64,
    /// Samples are skipped while the foreground title contains this.
    #[serde(default = "default_marker")]
    pub own_window_marker: String,
    #[serde(default = "default_cancel_key")]
    pub cancel_key: String,
    /// Pointer motion used during playback. Teleport when missing.
    #[serde(default)]
    pub motion: MotionStyle,
    #[serde(default)]
    pub waypoint_delay_ms: u64,
    #[serde(default = "default_loops")]
    pub loops: u32,
    /// Where macros and the cache live. `$HOME/.windreplay` when unset.
    #[serde(default)]
    pub storage_dir: Option<String>,
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_interval_ms() -> u64 {
    10
}

fn default_marker() -> String {
    "Macro Recorder".to_string()
}

fn default_cancel_key() -> String {
    "esc".to_string()
}

fn default_loops() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capture_interval_ms: default_interval_ms(),
            own_window_marker: default_marker(),
            cancel_key: default_cancel_key(),
            motion: MotionStyle::default(),
            waypoint_delay_ms: 0,
            loops: default_loops(),
            storage_dir: None,
            debug_logging: false,
        }
    }
}

impl Settings {
    /// Missing or empty files give the defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn capture_config(&self) -> CaptureConfig {
        let interval_ms = if self.capture_interval_ms == 0 {
            tracing::warn!("capture_interval_ms must be positive; using {}", default_interval_ms());
            default_interval_ms()
        } else {
            self.capture_interval_ms
        };
        CaptureConfig {
            interval: Duration::from_millis(interval_ms),
            own_window_marker: self.own_window_marker.clone(),
        }
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            cancel_key: self.cancel_key.clone(),
            motion: self.motion,
            waypoint_delay: Duration::from_millis(self.waypoint_delay_ms),
            seed: None,
        }
    }

    pub fn storage_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => crate::storage::default_dir(),
        }
    }
}
