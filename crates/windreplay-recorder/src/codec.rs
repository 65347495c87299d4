//! Optimizer and MacroScript codec
//!
//! On disk a script is JSON:
//!
//! ```json
//! {"version": 1, "timestamp": 1718000000.5,
//!  "actions": [["window_focus", "Editor", null, 0.0], ["mouse", 10, 20, 0.01],
//!              ["left_click", 10, 20, 0.2], ["key", "a", "down", 0.9]]}
//! ```
//!
//! Older tools wrote one `kind,f1,f2,relative_time` record per line and knew
//! no click kinds. Anything that is not a version 1 script is read with that
//! legacy vocabulary.

use crate::events::{reanchor, to_relative, wall_clock, Event, EventData};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use windreplay_core::{Error, KeyPhase, MouseButton, Result};

pub const FORMAT_VERSION: u32 = 1;

/// Why a script could not be decoded
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("file is not valid UTF-8")]
    NotUtf8,
    #[error("record {record}: expected 4 comma-separated fields, got {count}")]
    FieldCount { record: usize, count: usize },
    #[error("record {record}: unknown action kind '{kind}'")]
    UnknownKind { record: usize, kind: String },
    #[error("record {record}: {field} of '{kind}' must be {expected}, got {found}")]
    BadField {
        record: usize,
        kind: String,
        field: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("record {record}: timestamp '{value}' is not a finite number")]
    BadTime { record: usize, value: String },
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::malformed_file(e)
    }
}

/// Which layout a script was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Versioned,
    Legacy,
}

/// Optimized, relative-time script
#[derive(Debug, Clone, PartialEq)]
pub struct MacroScript {
    pub version: u32,
    /// Wall-clock creation time, epoch seconds
    pub timestamp: f64,
    /// Relative timestamps, first event at 0
    pub events: Vec<Event>,
}

impl MacroScript {
    /// Optimize a finished capture.
    pub fn from_capture(events: &[Event]) -> Self {
        Self {
            version: FORMAT_VERSION,
            timestamp: wall_clock(),
            events: optimize(events),
        }
    }

    /// Keep every event, only rebase the timestamps.
    pub fn verbatim(events: &[Event]) -> Self {
        Self {
            version: FORMAT_VERSION,
            timestamp: wall_clock(),
            events: to_relative(events),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let file = ScriptFile {
            version: Some(self.version),
            timestamp: Some(self.timestamp),
            actions: self.events.iter().map(encode_action).collect(),
        };
        Ok(serde_json::to_string(&file)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_json().map(String::into_bytes)
    }

    /// Events anchored at `base` wall-clock seconds.
    pub fn anchored_at(&self, base: f64) -> Vec<Event> {
        reanchor(self.events.clone(), base)
    }
}

#[derive(Serialize, Deserialize)]
struct ScriptFile {
    version: Option<u32>,
    #[serde(default)]
    timestamp: Option<f64>,
    actions: Vec<RawAction>,
}

/// `[kind, field1, field2, relative_time]`
#[derive(Serialize, Deserialize)]
struct RawAction(String, Value, Value, f64);

/// Drop redundant samples and rebase time on the first kept event.
///
/// A window focus repeating the last kept title and a plain move to the last
/// kept pointer position are dropped. Clicks and keys always stay.
pub fn optimize(events: &[Event]) -> Vec<Event> {
    let Some(base) = events.first().map(|e| e.t) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(events.len());
    let mut last_pos: Option<(i32, i32)> = None;
    let mut last_window: Option<&str> = None;

    for e in events {
        let keep = match &e.data {
            EventData::WindowFocus { title } => {
                if last_window == Some(title.as_str()) {
                    false
                } else {
                    last_window = Some(title.as_str());
                    true
                }
            }
            EventData::Move { x, y } => {
                if last_pos == Some((*x, *y)) {
                    false
                } else {
                    last_pos = Some((*x, *y));
                    true
                }
            }
            EventData::Click { x, y, .. } => {
                last_pos = Some((*x, *y));
                true
            }
            EventData::Key { .. } => true,
        };
        if keep {
            out.push(Event::new(e.t - base, e.data.clone()));
        }
    }
    out
}

/// Encode events (any time base) as a version 1 script stamped now.
pub fn serialize(events: &[Event]) -> Result<Vec<u8>> {
    MacroScript::verbatim(events).to_bytes()
}

/// Decode and anchor at the current wall clock.
pub fn deserialize(bytes: &[u8]) -> Result<Vec<Event>> {
    deserialize_at(bytes, wall_clock())
}

/// Decode and anchor relative timestamps at `base`.
pub fn deserialize_at(bytes: &[u8], base: f64) -> Result<Vec<Event>> {
    let (_, script) = decode(bytes)?;
    Ok(script.anchored_at(base))
}

/// Decode either layout into a relative-time script. Any malformed record
/// rejects the whole file.
pub fn decode(bytes: &[u8]) -> Result<(Format, MacroScript)> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;

    if let Ok(file) = serde_json::from_str::<ScriptFile>(text) {
        let versioned = file.version == Some(FORMAT_VERSION);
        if !versioned {
            tracing::debug!(version = ?file.version, "unrecognized script version, using legacy vocabulary");
        }
        let events = file
            .actions
            .iter()
            .enumerate()
            .map(|(i, a)| {
                decode_record(i + 1, &a.0, Field::Json(&a.1), Field::Json(&a.2), a.3, !versioned)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let format = if versioned { Format::Versioned } else { Format::Legacy };
        let script = MacroScript {
            version: FORMAT_VERSION,
            timestamp: file.timestamp.unwrap_or_else(wall_clock),
            events,
        };
        return Ok((format, script));
    }

    let events = decode_legacy_lines(text)?;
    Ok((
        Format::Legacy,
        MacroScript {
            version: FORMAT_VERSION,
            timestamp: wall_clock(),
            events,
        },
    ))
}

fn decode_legacy_lines(text: &str) -> std::result::Result<Vec<Event>, DecodeError> {
    let mut events = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let record = i + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Titles may contain commas: kind is the first field, time and
        // field2 the last two, field1 whatever sits in between.
        let Some((kind, rest)) = line.split_once(',') else {
            return Err(DecodeError::FieldCount { record, count: 1 });
        };
        let mut tail = rest.rsplitn(3, ',');
        let (Some(t), Some(f2), Some(f1)) = (tail.next(), tail.next(), tail.next()) else {
            let count = 1 + rest.split(',').count();
            return Err(DecodeError::FieldCount { record, count });
        };

        let t = t.trim();
        let time = t.parse::<f64>().map_err(|_| DecodeError::BadTime {
            record,
            value: t.to_string(),
        })?;
        events.push(decode_record(
            record,
            kind.trim(),
            Field::Text(f1),
            Field::Text(f2),
            time,
            true,
        )?);
    }
    Ok(events)
}

#[derive(Clone, Copy)]
enum Field<'a> {
    Json(&'a Value),
    Text(&'a str),
}

impl<'a> Field<'a> {
    fn describe(self) -> String {
        match self {
            Field::Json(v) => v.to_string(),
            Field::Text(s) => format!("'{}'", s),
        }
    }

    fn as_int(self) -> Option<i32> {
        match self {
            Field::Json(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .and_then(|v| i32::try_from(v).ok()),
            Field::Json(Value::String(s)) => s.trim().parse().ok(),
            Field::Text(s) => s.trim().parse().ok(),
            Field::Json(_) => None,
        }
    }

    fn text(self) -> Option<&'a str> {
        match self {
            Field::Json(Value::String(s)) => Some(s.as_str()),
            Field::Text(s) => Some(s),
            Field::Json(_) => None,
        }
    }
}

fn decode_record(
    record: usize,
    kind: &str,
    f1: Field<'_>,
    f2: Field<'_>,
    t: f64,
    legacy: bool,
) -> std::result::Result<Event, DecodeError> {
    if !t.is_finite() {
        return Err(DecodeError::BadTime {
            record,
            value: t.to_string(),
        });
    }

    let bad = |field: &'static str, expected: &'static str, found: String| DecodeError::BadField {
        record,
        kind: kind.to_string(),
        field,
        expected,
        found,
    };
    let coords = || -> std::result::Result<(i32, i32), DecodeError> {
        let x = f1.as_int().ok_or_else(|| bad("x", "an integer", f1.describe()))?;
        let y = f2.as_int().ok_or_else(|| bad("y", "an integer", f2.describe()))?;
        Ok((x, y))
    };

    let button = match kind {
        "left_click" if !legacy => Some(MouseButton::Left),
        "right_click" if !legacy => Some(MouseButton::Right),
        "middle_click" if !legacy => Some(MouseButton::Middle),
        _ => None,
    };

    let data = match (kind, button) {
        (_, Some(button)) => {
            let (x, y) = coords()?;
            EventData::Click { button, x, y }
        }
        ("mouse", None) => {
            let (x, y) = coords()?;
            EventData::Move { x, y }
        }
        ("key", None) => {
            let key = f1.text().ok_or_else(|| bad("key", "a key name", f1.describe()))?;
            let phase = f2
                .text()
                .and_then(|p| p.parse::<KeyPhase>().ok())
                .ok_or_else(|| bad("phase", "'down' or 'up'", f2.describe()))?;
            EventData::Key {
                key: key.trim().to_string(),
                phase,
            }
        }
        ("window_focus", None) => {
            let title = f1.text().ok_or_else(|| bad("title", "a string", f1.describe()))?;
            EventData::WindowFocus {
                title: title.to_string(),
            }
        }
        _ => {
            return Err(DecodeError::UnknownKind {
                record,
                kind: kind.to_string(),
            })
        }
    };

    Ok(Event::new(t, data))
}

fn encode_action(e: &Event) -> RawAction {
    let kind = e.data.kind().to_string();
    match &e.data {
        EventData::Move { x, y } | EventData::Click { x, y, .. } => {
            RawAction(kind, Value::from(*x), Value::from(*y), e.t)
        }
        EventData::Key { key, phase } => {
            RawAction(kind, Value::from(key.as_str()), Value::from(phase.as_str()), e.t)
        }
        EventData::WindowFocus { title } => RawAction(kind, Value::from(title.as_str()), Value::Null, e.t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture() -> Vec<Event> {
        vec![
            Event::window_focus(100.0, "Editor"),
            Event::mouse_move(100.0, 10, 20),
            Event::mouse_move(100.01, 10, 20),
            Event::mouse_move(100.02, 11, 21),
            Event::click(100.03, MouseButton::Left, 11, 21),
            Event::click(100.04, MouseButton::Left, 11, 21),
            Event::window_focus(100.05, "Editor"),
            Event::key(100.5, "a", KeyPhase::Down),
            Event::key(100.6, "a", KeyPhase::Up),
            Event::mouse_move(100.7, 11, 21),
            Event::window_focus(101.0, "Terminal, 2"),
        ]
    }

    fn assert_same_events(a: &[Event], b: &[Event]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert_eq!(x.data, y.data);
            assert!((x.t - y.t).abs() < 1e-6, "{} vs {}", x.t, y.t);
        }
    }

    #[test]
    fn optimize_drops_only_redundant_samples() {
        let opt = optimize(&capture());
        let kinds: Vec<_> = opt.iter().map(|e| e.data.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "window_focus",
                "mouse",
                "mouse",
                "left_click",
                "left_click",
                "key",
                "key",
                "window_focus"
            ]
        );
        assert_eq!(opt[0].t, 0.0);
        assert!(opt.windows(2).all(|w| w[0].t <= w[1].t));
    }

    #[test]
    fn optimize_is_idempotent() {
        let once = optimize(&capture());
        assert_eq!(optimize(&once), once);
    }

    #[test]
    fn optimize_keeps_distinct_sequences_intact() {
        let events = vec![
            Event::mouse_move(5.0, 1, 1),
            Event::mouse_move(5.1, 2, 2),
            Event::mouse_move(5.2, 1, 1),
            Event::key(5.3, "b", KeyPhase::Down),
        ];
        let opt = optimize(&events);
        assert_eq!(opt.len(), events.len());
        for (o, e) in opt.iter().zip(&events) {
            assert_eq!(o.data, e.data);
        }
    }

    #[test]
    fn round_trip_through_versioned_format() {
        let opt = optimize(&capture());
        let bytes = serialize(&opt).unwrap();
        let back = deserialize_at(&bytes, 500.0).unwrap();
        let rel: Vec<_> = back.into_iter().map(|mut e| {
            e.t -= 500.0;
            e
        }).collect();
        assert_same_events(&rel, &opt);

        let (format, _) = decode(&bytes).unwrap();
        assert_eq!(format, Format::Versioned);
    }

    #[test]
    fn written_layout_matches_file_format() {
        let script = MacroScript::verbatim(&[
            Event::window_focus(2.0, "Editor"),
            Event::click(2.5, MouseButton::Right, 3, 4),
            Event::key(3.0, "enter", KeyPhase::Up),
        ]);
        let json: Value = serde_json::from_str(&script.to_json().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert!(json["timestamp"].as_f64().unwrap() > 0.0);
        assert_eq!(json["actions"][0], serde_json::json!(["window_focus", "Editor", null, 0.0]));
        assert_eq!(json["actions"][1], serde_json::json!(["right_click", 3, 4, 0.5]));
        assert_eq!(json["actions"][2], serde_json::json!(["key", "enter", "up", 1.0]));
    }

    #[test]
    fn legacy_lines_are_reanchored() {
        let events = deserialize_at(b"mouse,100,200,0.5\nkey,a,down,0.9\n", 1000.0).unwrap();
        assert_eq!(
            events,
            vec![
                Event::mouse_move(1000.5, 100, 200),
                Event::key(1000.9, "a", KeyPhase::Down)
            ]
        );
    }

    #[test]
    fn legacy_load_uses_current_time() {
        let before = wall_clock();
        let events = deserialize(b"mouse,100,200,0.5\nkey,a,down,0.9\n").unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].t >= before + 0.5);
        assert_eq!(events[0].data, EventData::Move { x: 100, y: 200 });
    }

    #[test]
    fn missing_version_falls_back_to_legacy() {
        let json = br#"{"actions": [["mouse", 1, 2, 0.0], ["window_focus", "Editor", null, 0.1]]}"#;
        let (format, script) = decode(json).unwrap();
        assert_eq!(format, Format::Legacy);
        assert_eq!(script.events.len(), 2);

        // Click kinds are not part of the legacy vocabulary
        let json = br#"{"version": 7, "actions": [["left_click", 1, 2, 0.0]]}"#;
        let err = decode(json).unwrap_err();
        assert_eq!(err.code, windreplay_core::ErrorCode::MalformedFile);
    }

    #[test]
    fn legacy_titles_may_contain_commas() {
        let events = deserialize_at(b"window_focus,Inbox, 3 unread,None,0.0\n", 0.0).unwrap();
        assert_eq!(events, vec![Event::window_focus(0.0, "Inbox, 3 unread")]);
    }

    #[test]
    fn malformed_records_reject_the_whole_file() {
        let cases: [&[u8]; 5] = [
            b"mouse,100,200,0.5\nmouse,abc,200,0.6\n",
            b"mouse,100\n",
            b"teleport,1,2,0.0\n",
            b"key,a,sideways,0.0\n",
            b"mouse,1,2,nan\n",
        ];
        for bytes in cases {
            let err = deserialize(bytes).unwrap_err();
            assert_eq!(err.code, windreplay_core::ErrorCode::MalformedFile, "{:?}", err);
        }
    }

    #[test]
    fn versioned_bad_record_is_fatal() {
        let json = br#"{"version": 1, "timestamp": 1.0, "actions": [["mouse", "x", 2, 0.0]]}"#;
        let err = decode(json).unwrap_err();
        assert!(err.message.contains("record 1"), "{}", err.message);
    }

    #[test]
    fn float_coordinates_are_truncated() {
        let json = br#"{"version": 1, "timestamp": 1.0, "actions": [["mouse", 10.7, 20.2, 0.0]]}"#;
        let (_, script) = decode(json).unwrap();
        assert_eq!(script.events[0].data, EventData::Move { x: 10, y: 20 });
    }

    #[test]
    fn non_utf8_is_malformed() {
        assert!(deserialize(&[0xff, 0xfe, 0x00]).is_err());
    }
}
