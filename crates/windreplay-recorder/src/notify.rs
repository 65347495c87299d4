//! Messages from background flows to the presentation layer
//!
//! Capture and playback run off the UI thread. Instead of calling into the UI
//! they push [`Notification`]s on a channel the UI thread drains.

pub use crossbeam_channel::{Receiver, Sender};
use crossbeam_channel::unbounded;
use windreplay_core::{Error, Severity};

use crate::events::Event;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Full capture buffer after an append
    BufferUpdated(Vec<Event>),
    /// Playback ended; `loops` is the number of loops fully replayed
    PlaybackCompleted { loops: u32, cancelled: bool },
    Message { severity: Severity, text: String },
}

/// Cloneable sending half. A disabled notifier drops everything.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<Sender<Notification>>,
}

impl Notifier {
    pub fn channel() -> (Notifier, Receiver<Notification>) {
        let (tx, rx) = unbounded();
        (Notifier { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn send(&self, notification: Notification) {
        if let Some(tx) = &self.tx {
            if tx.try_send(notification).is_err() {
                tracing::trace!("notification receiver gone");
            }
        }
    }

    pub fn message(&self, severity: Severity, text: impl Into<String>) {
        self.send(Notification::Message {
            severity,
            text: text.into(),
        });
    }

    pub fn info(&self, text: impl Into<String>) {
        self.message(Severity::Info, text);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.message(Severity::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.message(Severity::Error, text);
    }

    /// Report an error at its own severity tier.
    pub fn report(&self, err: &Error) {
        self.message(err.severity(), err.message.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_uses_error_severity() {
        let (n, rx) = Notifier::channel();
        n.report(&Error::fail_safe());
        match rx.try_recv().unwrap() {
            Notification::Message { severity, text } => {
                assert_eq!(severity, Severity::Error);
                assert!(text.contains("failsafe"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn disabled_notifier_is_silent() {
        Notifier::disabled().info("nobody listens");
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (n, rx) = Notifier::channel();
        drop(rx);
        n.warning("late");
    }
}
