//! windreplay-recorder - capture, persist and replay input macros
//!
//! - [`capture`]: samples the pointer on a fixed tick and hooks keys
//! - [`codec`]: optimizer and the `.MacroScript` format, legacy files included
//! - [`playback`]: timing-faithful replay with cancel and fail-safe
//! - [`engine`]: [`MacroEngine`], the controller a front end drives

pub mod capture;
pub mod codec;
pub mod engine;
pub mod events;
pub mod notify;
pub mod playback;
pub mod settings;
pub mod storage;

pub use capture::{CaptureConfig, CaptureSession, Recorder, RecordingHandle, Sample};
pub use codec::{decode, deserialize, deserialize_at, optimize, serialize, DecodeError, Format, MacroScript, FORMAT_VERSION};
pub use engine::MacroEngine;
pub use events::*;
pub use notify::{Notification, Notifier, Receiver, Sender};
pub use playback::{Outcome, PlaybackConfig, PlaybackHandle, PlaybackReport, PlaybackState, Player};
pub use settings::Settings;
pub use storage::MacroStorage;

pub mod prelude {
    pub use crate::capture::{CaptureConfig, Recorder, RecordingHandle};
    pub use crate::codec::MacroScript;
    pub use crate::engine::MacroEngine;
    pub use crate::events::*;
    pub use crate::notify::{Notification, Notifier};
    pub use crate::playback::{Outcome, PlaybackConfig, PlaybackReport, Player};
    pub use crate::settings::Settings;
    pub use crate::storage::MacroStorage;
}
