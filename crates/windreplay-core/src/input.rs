//! Input backend capability
//!
//! Everything that touches the real pointer, keyboard or window manager goes
//! through [`InputBackend`]. Capture and playback only ever see this trait.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Priority order used when several buttons are held during a sample.
    pub const ALL: [MouseButton; 3] = [MouseButton::Left, MouseButton::Right, MouseButton::Middle];

    pub fn as_str(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPhase {
    Down,
    Up,
}

impl KeyPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyPhase::Down => "down",
            KeyPhase::Up => "up",
        }
    }
}

impl fmt::Display for KeyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyPhase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "down" => Ok(KeyPhase::Down),
            "up" => Ok(KeyPhase::Up),
            other => Err(format!("unknown key phase '{}'", other)),
        }
    }
}

/// Handle returned by [`InputBackend::hook_key_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// Called from a backend-owned thread for every key transition.
pub type KeyCallback = Arc<dyn Fn(&str, KeyPhase) + Send + Sync>;

pub type SharedBackend = Arc<dyn InputBackend>;

/// The capability set the engine consumes.
///
/// Any call may fail with `FailSafeTriggered`, which ends the current run.
pub trait InputBackend: Send + Sync {
    fn pointer_position(&self) -> Result<(i32, i32)>;

    fn is_button_pressed(&self, button: MouseButton) -> Result<bool>;

    fn move_pointer(&self, x: i32, y: i32) -> Result<()>;

    /// Click at the current pointer position.
    fn click(&self, button: MouseButton) -> Result<()>;

    fn press_key(&self, key: &str) -> Result<()>;

    fn release_key(&self, key: &str) -> Result<()>;

    fn foreground_window_title(&self) -> Result<String>;

    /// Bring the window with this exact title forward. `Ok(false)` when no
    /// such window exists.
    fn find_and_focus_window(&self, title: &str) -> Result<bool>;

    fn hook_key_events(&self, callback: KeyCallback) -> Result<HookId>;

    fn unhook(&self, id: HookId);

    fn unhook_all(&self);

    /// Backend-side guard (e.g. pointer parked in a screen corner).
    fn fail_safe_triggered(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_phase_parses_trimmed() {
        assert_eq!("down".parse::<KeyPhase>().unwrap(), KeyPhase::Down);
        assert_eq!(" up\n".parse::<KeyPhase>().unwrap(), KeyPhase::Up);
        assert!("sideways".parse::<KeyPhase>().is_err());
    }

    #[test]
    fn left_button_has_priority() {
        assert_eq!(MouseButton::ALL[0], MouseButton::Left);
    }
}
