//! Event model
//!
//! A recorded action plus its timestamp in seconds. While a capture is live
//! the timestamp is absolute wall-clock time; once optimized or persisted it
//! is relative to the first event.

use serde::{Deserialize, Serialize};
use windreplay_core::{KeyPhase, MouseButton};

/// Single recorded action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds (absolute or relative, see module docs)
    pub t: f64,
    #[serde(flatten)]
    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "e", rename_all = "snake_case")]
pub enum EventData {
    /// Pointer moved, no button held
    Move { x: i32, y: i32 },
    /// Pointer sampled while a button was held
    Click { button: MouseButton, x: i32, y: i32 },
    Key { key: String, phase: KeyPhase },
    WindowFocus { title: String },
}

impl Event {
    pub fn new(t: f64, data: EventData) -> Self {
        Self { t, data }
    }

    pub fn mouse_move(t: f64, x: i32, y: i32) -> Self {
        Self::new(t, EventData::Move { x, y })
    }

    pub fn click(t: f64, button: MouseButton, x: i32, y: i32) -> Self {
        Self::new(t, EventData::Click { button, x, y })
    }

    pub fn key(t: f64, key: impl Into<String>, phase: KeyPhase) -> Self {
        Self::new(t, EventData::Key { key: key.into(), phase })
    }

    pub fn window_focus(t: f64, title: impl Into<String>) -> Self {
        Self::new(t, EventData::WindowFocus { title: title.into() })
    }
}

impl EventData {
    /// Kind tag used by the MacroScript format.
    pub fn kind(&self) -> &'static str {
        match self {
            EventData::Move { .. } => "mouse",
            EventData::Click { button: MouseButton::Left, .. } => "left_click",
            EventData::Click { button: MouseButton::Right, .. } => "right_click",
            EventData::Click { button: MouseButton::Middle, .. } => "middle_click",
            EventData::Key { .. } => "key",
            EventData::WindowFocus { .. } => "window_focus",
        }
    }

    /// Pointer position for moves and clicks.
    pub fn position(&self) -> Option<(i32, i32)> {
        match self {
            EventData::Move { x, y } | EventData::Click { x, y, .. } => Some((*x, *y)),
            _ => None,
        }
    }
}

/// Current wall-clock time in fractional epoch seconds.
pub fn wall_clock() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Shift timestamps so the first event sits at 0.
pub fn to_relative(events: &[Event]) -> Vec<Event> {
    let Some(base) = events.first().map(|e| e.t) else {
        return Vec::new();
    };
    events
        .iter()
        .map(|e| Event::new(e.t - base, e.data.clone()))
        .collect()
}

/// Anchor relative timestamps at `base`.
pub fn reanchor(events: Vec<Event>, base: f64) -> Vec<Event> {
    events
        .into_iter()
        .map(|mut e| {
            e.t += base;
            e
        })
        .collect()
}

/// Per-kind counts for display
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub moves: usize,
    pub clicks: usize,
    pub keys: usize,
    pub window_changes: usize,
    /// Seconds between first and last event
    pub duration: f64,
}

impl Summary {
    pub fn of(events: &[Event]) -> Self {
        let mut s = Summary::default();
        for e in events {
            match &e.data {
                EventData::Move { .. } => s.moves += 1,
                EventData::Click { .. } => s.clicks += 1,
                EventData::Key { .. } => s.keys += 1,
                EventData::WindowFocus { .. } => s.window_changes += 1,
            }
        }
        if let (Some(first), Some(last)) = (events.first(), events.last()) {
            s.duration = (last.t - first.t).max(0.0);
        }
        s
    }

    pub fn total(&self) -> usize {
        self.moves + self.clicks + self.keys + self.window_changes
    }
}
