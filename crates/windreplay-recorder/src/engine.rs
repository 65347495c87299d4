//! MacroEngine - the one object a front end drives
//!
//! Owns the current macro and at most one recording and one playback. Every
//! user-visible outcome is also pushed through the [`Notifier`].

use crate::capture::{Recorder, RecordingHandle};
use crate::codec::MacroScript;
use crate::events::{wall_clock, Event, Summary};
use crate::notify::Notifier;
use crate::playback::{PlaybackHandle, PlaybackReport, Player};
use crate::settings::Settings;
use crate::storage::MacroStorage;
use std::path::PathBuf;
use windreplay_core::{Error, ErrorCode, Result, SharedBackend};

pub struct MacroEngine {
    backend: SharedBackend,
    settings: Settings,
    notifier: Notifier,
    storage: Option<MacroStorage>,
    recorder: Recorder,
    player: Player,
    recording: Option<RecordingHandle>,
    playback: Option<PlaybackHandle>,
    events: Vec<Event>,
}

impl MacroEngine {
    pub fn new(backend: SharedBackend, settings: Settings, notifier: Notifier) -> Self {
        let recorder = Recorder::with_config(backend.clone(), settings.capture_config(), notifier.clone());
        let player = Player::with_config(backend.clone(), settings.playback_config(), notifier.clone());
        Self {
            backend,
            settings,
            notifier,
            storage: None,
            recorder,
            player,
            recording: None,
            playback: None,
            events: Vec::new(),
        }
    }

    /// Persist macros and the cache in `storage`.
    pub fn with_storage(mut self, storage: MacroStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Takes effect for the next recording or playback.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.recorder = Recorder::with_config(
            self.backend.clone(),
            settings.capture_config(),
            self.notifier.clone(),
        );
        self.player.set_config(settings.playback_config());
        self.settings = settings;
    }

    /// Reload the macro from the cache. Returns the number of events restored.
    pub fn restore_cache(&mut self) -> usize {
        let Some(storage) = &self.storage else {
            return 0;
        };
        match storage.load_cache() {
            Ok(Some(script)) => {
                self.events = script.anchored_at(wall_clock());
                tracing::info!(events = self.events.len(), "restored cached macro");
                self.events.len()
            }
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "ignoring unreadable macro cache");
                0
            }
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.as_ref().is_some_and(|r| r.is_running())
    }

    /// A playback thread is alive, including one finishing after a cancel.
    pub fn is_playing(&self) -> bool {
        self.player.is_busy()
    }

    /// Start recording when idle, stop when recording. Returns whether a
    /// recording is now running.
    pub fn toggle_record(&mut self) -> Result<bool> {
        if self.recording.is_some() {
            self.stop_recording();
            Ok(false)
        } else {
            self.start_recording()?;
            Ok(true)
        }
    }

    pub fn start_recording(&mut self) -> Result<()> {
        if self.is_playing() {
            return Err(Error::playback_busy());
        }
        if let Some(old) = self.recording.take() {
            drop(old.stop());
        }
        match self.recorder.start() {
            Ok(handle) => {
                self.recording = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.notifier.report(&e);
                Err(e)
            }
        }
    }

    /// Stop recording and make the buffer the current macro.
    pub fn stop_recording(&mut self) -> usize {
        let Some(handle) = self.recording.take() else {
            return self.events.len();
        };
        self.events = handle.stop();
        self.write_cache();
        self.events.len()
    }

    /// Replay the current macro `loops` times in the background.
    pub fn play(&mut self, loops: u32) -> Result<()> {
        if self.recording.is_some() {
            self.stop_recording();
        }
        self.reap_playback();
        let handle = self.player.play(self.events.clone(), loops)?;
        self.playback = Some(handle);
        Ok(())
    }

    /// Replay with the configured loop count.
    pub fn play_default(&mut self) -> Result<()> {
        self.play(self.settings.loops)
    }

    pub fn cancel(&self) {
        self.player.cancel();
    }

    /// Block until the current playback ends.
    pub fn wait(&mut self) -> Option<PlaybackReport> {
        self.playback.take().map(PlaybackHandle::join)
    }

    /// Save the current macro, optimized. `name` picks the file name.
    pub fn save(&mut self, name: Option<&str>) -> Result<PathBuf> {
        if self.events.is_empty() {
            let err = Error::empty_sequence();
            self.notifier.warning(err.message.clone());
            return Err(err);
        }
        let Some(storage) = &self.storage else {
            return Err(self.no_storage());
        };

        let script = MacroScript::from_capture(&self.events);
        match storage.save(&script, name) {
            Ok(path) => {
                self.notifier.info("Macro saved successfully!");
                self.write_cache();
                Ok(path)
            }
            Err(e) => {
                let err = Error::from(e);
                self.notifier.error(format!("Failed to save macro: {}", err.message));
                Err(err)
            }
        }
    }

    /// Load a saved macro and make it current, anchored at now.
    pub fn load(&mut self, name: &str) -> Result<usize> {
        let Some(storage) = &self.storage else {
            return Err(self.no_storage());
        };
        match storage.load(name) {
            Ok(script) => {
                self.events = script.anchored_at(wall_clock());
                self.notifier.info("Macro loaded successfully!");
                self.write_cache();
                Ok(self.events.len())
            }
            Err(e) => {
                let err = Error::from(e);
                self.notifier.error(format!("Failed to load macro: {}", err.message));
                Err(err)
            }
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The live buffer while recording, the current macro otherwise.
    pub fn live_events(&self) -> Vec<Event> {
        match &self.recording {
            Some(r) => r.snapshot(),
            None => self.events.clone(),
        }
    }

    pub fn summary(&self) -> Summary {
        Summary::of(&self.events)
    }

    /// Append a hand-made event. Its timestamp is clamped so the macro stays
    /// ordered.
    pub fn append(&mut self, mut event: Event) {
        if let Some(last) = self.events.last() {
            event.t = event.t.max(last.t);
        }
        self.events.push(event);
        self.write_cache();
    }

    /// Remove every positioned event at `(x, y)`. Returns how many went.
    pub fn remove_at(&mut self, x: i32, y: i32) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.data.position() != Some((x, y)));
        let removed = before - self.events.len();
        if removed > 0 {
            self.write_cache();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.write_cache();
    }

    /// Stop everything and release every backend hook.
    pub fn shutdown(&mut self) {
        self.player.cancel();
        if let Some(handle) = self.recording.take() {
            self.events = handle.stop();
            self.write_cache();
        }
        if let Some(handle) = self.playback.take() {
            handle.join();
        }
        self.backend.unhook_all();
    }

    /// Join the previous playback if it has ended or was cancelled. A
    /// cancelled run only has its current dispatch left to finish.
    fn reap_playback(&mut self) {
        let done = self
            .playback
            .as_ref()
            .is_some_and(|h| h.is_finished() || !h.is_running());
        if done {
            if let Some(handle) = self.playback.take() {
                tracing::debug!(report = ?handle.join(), "previous playback reaped");
            }
        }
    }

    fn write_cache(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(e) = storage.save_cache(&MacroScript::verbatim(&self.events)) {
            tracing::warn!(error = %format!("{:#}", e), "failed to update macro cache");
        }
    }

    fn no_storage(&self) -> Error {
        let err = Error::new(ErrorCode::Io, "No macro storage configured");
        self.notifier.report(&err);
        err
    }
}

impl Drop for MacroEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notification;
    use std::sync::Arc;
    use windreplay_core::{BackendCall, HeadlessBackend, KeyPhase, MouseButton, Severity};

    fn engine() -> (MacroEngine, Arc<HeadlessBackend>, crate::notify::Receiver<Notification>, tempfile::TempDir) {
        let backend = Arc::new(HeadlessBackend::new());
        let (notifier, rx) = Notifier::channel();
        let dir = tempfile::tempdir().unwrap();
        let engine = MacroEngine::new(backend.clone(), Settings::default(), notifier)
            .with_storage(MacroStorage::with_dir(dir.path()).unwrap());
        (engine, backend, rx, dir)
    }

    fn messages(rx: &crate::notify::Receiver<Notification>) -> Vec<(Severity, String)> {
        rx.try_iter()
            .filter_map(|n| match n {
                Notification::Message { severity, text } => Some((severity, text)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn save_without_events_warns() {
        let (mut engine, _backend, rx, _dir) = engine();
        let err = engine.save(Some("empty")).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptySequence);
        assert_eq!(
            messages(&rx),
            vec![(Severity::Warning, "No macro recorded!".to_string())]
        );
    }

    #[test]
    fn play_without_events_is_rejected() {
        let (mut engine, _backend, rx, _dir) = engine();
        let err = engine.play(1).unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptySequence);
        assert!(messages(&rx).iter().any(|(_, t)| t == "No macro recorded!"));
    }

    #[test]
    fn save_load_and_cache() {
        let (mut engine, backend, rx, dir) = engine();
        engine.append(Event::mouse_move(100.0, 5, 5));
        engine.append(Event::mouse_move(100.1, 5, 5));
        engine.append(Event::click(100.2, MouseButton::Left, 5, 5));
        engine.append(Event::key(100.3, "a", KeyPhase::Down));

        let path = engine.save(Some("demo")).unwrap();
        assert!(path.exists());
        assert!(messages(&rx).contains(&(Severity::Info, "Macro saved successfully!".to_string())));

        engine.clear();
        assert_eq!(engine.load("demo.MacroScript").unwrap(), 3);
        let events = engine.events();
        assert!((events[1].t - events[0].t - 0.2).abs() < 1e-6);

        drop(engine);
        let mut restored = MacroEngine::new(backend, Settings::default(), Notifier::disabled())
            .with_storage(MacroStorage::with_dir(dir.path()).unwrap());
        assert_eq!(restored.restore_cache(), 3);
    }

    #[test]
    fn remove_at_drops_positioned_events() {
        let (mut engine, _backend, _rx, _dir) = engine();
        engine.append(Event::mouse_move(1.0, 3, 4));
        engine.append(Event::key(2.0, "b", KeyPhase::Up));
        engine.append(Event::click(3.0, MouseButton::Right, 3, 4));
        assert_eq!(engine.remove_at(3, 4), 2);
        assert_eq!(engine.events().len(), 1);
    }

    #[test]
    fn append_keeps_order() {
        let (mut engine, _backend, _rx, _dir) = engine();
        engine.append(Event::mouse_move(5.0, 0, 0));
        engine.append(Event::mouse_move(1.0, 1, 1));
        assert_eq!(engine.events()[1].t, 5.0);
    }

    #[test]
    fn play_after_cancel_replaces_the_old_run() {
        let (mut engine, backend, _rx, _dir) = engine();
        backend.slow_key("slow", std::time::Duration::from_millis(150));
        engine.append(Event::key(0.0, "slow", KeyPhase::Down));
        engine.append(Event::key(0.01, "after", KeyPhase::Down));

        engine.play(1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(40));
        engine.cancel();
        engine.play(1).unwrap();
        assert!(engine.is_playing());

        let report = engine.wait().unwrap();
        assert_eq!(report.outcome, crate::playback::Outcome::Completed);
        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::Press("slow".into()),
                BackendCall::Press("slow".into()),
                BackendCall::Press("after".into()),
            ]
        );
    }

    #[test]
    fn shutdown_releases_hooks() {
        let (mut engine, backend, _rx, _dir) = engine();
        assert!(engine.toggle_record().unwrap());
        assert!(backend.hook_count() > 0);
        engine.shutdown();
        assert_eq!(backend.hook_count(), 0);
        assert!(!engine.is_recording());
    }
}
