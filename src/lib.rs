//! windreplay - record input macros and replay them faithfully
//!
//! Re-exports the two workspace crates:
//!
//! - [`windreplay_core`]: the input backend capability, errors and pointer motion
//! - [`windreplay_recorder`]: capture, the `.MacroScript` codec, playback and the
//!   [`MacroEngine`] controller
//!
//! ```no_run
//! use std::sync::Arc;
//! use windreplay::prelude::*;
//!
//! let backend = Arc::new(HeadlessBackend::new());
//! let (notifier, _rx) = Notifier::channel();
//! let mut engine = MacroEngine::new(backend, Settings::default(), notifier)
//!     .with_storage(MacroStorage::new().unwrap());
//! engine.restore_cache();
//! engine.play(1).unwrap();
//! ```

pub use windreplay_core;
pub use windreplay_recorder;

pub use windreplay_core::{
    BackendCall, Easing, Error, ErrorCode, HeadlessBackend, InputBackend, KeyPhase, MotionStyle, MouseButton,
    Result, Severity, SharedBackend, WindMouse,
};
pub use windreplay_recorder::{
    Event, EventData, MacroEngine, MacroScript, MacroStorage, Notification, Notifier, Outcome, PlaybackConfig,
    PlaybackReport, Player, Recorder, Settings, Summary,
};

pub mod prelude {
    pub use windreplay_core::prelude::*;
    pub use windreplay_recorder::prelude::*;
}
