//! windreplay-core - input capability and pointer motion
//!
//! The engine never talks to the OS directly. It consumes an
//! [`InputBackend`] and, when replaying with human-like motion, one of the
//! [`motion`] models.

pub mod error;
pub mod input;
pub mod motion;
pub mod platform;

pub use error::{Error, ErrorCode, Result, Severity};
pub use input::{HookId, InputBackend, KeyCallback, KeyPhase, MouseButton, SharedBackend};
pub use motion::{tween_path, Easing, MotionStyle, WindMouse, WindPath, MAX_TWEEN_STEPS};
pub use platform::{BackendCall, HeadlessBackend};

pub mod prelude {
    pub use crate::error::{Error, ErrorCode, Result, Severity};
    pub use crate::input::{InputBackend, KeyPhase, MouseButton, SharedBackend};
    pub use crate::motion::{Easing, MotionStyle, WindMouse};
    pub use crate::platform::HeadlessBackend;
}
