//! Structured errors shared by capture, codec and playback

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Nothing to play or save
    EmptySequence,
    /// Script could not be decoded in either format
    MalformedFile,
    /// A single action failed; playback goes on
    DispatchFailure,
    /// Pointer hit the guard position; the current run is over
    FailSafeTriggered,
    /// Backend could not serve the request (window lookup etc.)
    BackendUnavailable,
    /// A playback is already in progress
    PlaybackBusy,
    Io,
    Unknown,
}

/// Notification tier an error is reported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl ErrorCode {
    pub fn severity(self) -> Severity {
        match self {
            ErrorCode::EmptySequence | ErrorCode::PlaybackBusy => Severity::Warning,
            ErrorCode::DispatchFailure | ErrorCode::BackendUnavailable => Severity::Warning,
            ErrorCode::MalformedFile
            | ErrorCode::FailSafeTriggered
            | ErrorCode::Io
            | ErrorCode::Unknown => Severity::Error,
        }
    }

    /// Whether the failure ends the run it happened in.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorCode::FailSafeTriggered)
    }
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn empty_sequence() -> Self {
        Self::new(ErrorCode::EmptySequence, "No macro recorded!")
    }

    pub fn malformed_file(reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::MalformedFile, format!("Malformed macro file: {}", reason))
    }

    pub fn dispatch_failure(action: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::DispatchFailure,
            format!("{} failed: {}", action, reason),
        )
    }

    pub fn fail_safe() -> Self {
        Self::new(
            ErrorCode::FailSafeTriggered,
            "Macro stopped - failsafe triggered (mouse to corner)",
        )
    }

    pub fn backend_unavailable(what: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::BackendUnavailable,
            format!("Input backend unavailable: {}", what),
        )
    }

    pub fn playback_busy() -> Self {
        Self::new(ErrorCode::PlaybackBusy, "A macro is already playing")
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn is_fatal(&self) -> bool {
        self.code.is_fatal()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        let message = format!("{:#}", e);
        match e.downcast::<Error>() {
            Ok(inner) => inner,
            Err(e) => match e.downcast::<std::io::Error>() {
                Ok(_) => Self::new(ErrorCode::Io, message),
                Err(_) => Self::new(ErrorCode::Unknown, message),
            },
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::malformed_file(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_safe_is_the_only_fatal_code() {
        assert!(Error::fail_safe().is_fatal());
        assert!(!Error::dispatch_failure("click", "boom").is_fatal());
        assert!(!Error::backend_unavailable("no window").is_fatal());
    }

    #[test]
    fn serializes_code_in_screaming_case() {
        let json = serde_json::to_value(Error::empty_sequence()).unwrap();
        assert_eq!(json["code"], "EMPTY_SEQUENCE");
        assert!(json.get("context").is_none());
    }

    #[test]
    fn anyhow_keeps_the_inner_code() {
        use anyhow::Context;
        let wrapped: anyhow::Result<()> = Err(Error::empty_sequence()).context("loading cache");
        let err: Error = wrapped.unwrap_err().into();
        assert_eq!(err.code, ErrorCode::EmptySequence);
        assert_eq!(err.message, "No macro recorded!");
    }

    #[test]
    fn severity_tiers() {
        assert_eq!(ErrorCode::DispatchFailure.severity(), Severity::Warning);
        assert_eq!(ErrorCode::MalformedFile.severity(), Severity::Error);
    }
}
