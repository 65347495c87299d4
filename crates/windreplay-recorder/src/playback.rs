//! Timing-faithful playback
//!
//! Events are replayed on a dedicated thread. Before event `i` the scheduler
//! waits `t[i] - t[i-1]` (never negative), and between loops it pads the
//! iteration out to the recorded span so loops start at steady intervals.
//!
//! Cancellation is cooperative: it is checked between events and between
//! loops. Waits wake up as soon as a cancel arrives, but a dispatch that has
//! started always runs to the end.

use crate::events::{Event, EventData};
use crate::notify::{Notification, Notifier};
use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use windreplay_core::{Error, HookId, KeyPhase, MotionStyle, Result, SharedBackend};

/// Playback configuration
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Pressing this key stops playback
    pub cancel_key: String,
    /// How the pointer travels to each recorded position
    pub motion: MotionStyle,
    /// Pause between synthesized waypoints
    pub waypoint_delay: Duration,
    /// Seed for motion randomness; entropy when `None`
    pub seed: Option<u64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            cancel_key: "esc".to_string(),
            motion: MotionStyle::Teleport,
            waypoint_delay: Duration::ZERO,
            seed: None,
        }
    }
}

/// Run state shared by the player, its handles and the playback thread.
///
/// `busy` is held from `begin` until the playback thread exits, so a cancelled
/// run still finishing its last dispatch keeps later runs out. `cancelled` is
/// the stop request; it is reset only when a new run begins.
#[derive(Debug, Default)]
pub struct PlaybackState {
    busy: AtomicBool,
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A run is active and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.is_busy() && !self.cancelled.load(Ordering::SeqCst)
    }

    /// The playback thread has not exited yet, cancelled or not.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Request an early stop.
    pub fn cancel(&self) {
        let _guard = self.lock.lock();
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_all();
    }

    fn begin(&self) -> bool {
        let _guard = self.lock.lock();
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.cancelled.store(false, Ordering::SeqCst);
        true
    }

    fn finish(&self) {
        let _guard = self.lock.lock();
        self.cancelled.store(true, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
        self.wake.notify_all();
    }

    /// Wait up to `d`. Returns `false` when cancelled before or during the wait.
    pub fn sleep(&self, d: Duration) -> bool {
        let deadline = Instant::now() + d;
        let mut guard = self.lock.lock();
        while self.is_running() {
            if Instant::now() >= deadline {
                return true;
            }
            if self.wake.wait_until(&mut guard, deadline).timed_out() {
                return self.is_running();
            }
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    Cancelled,
    /// Fail-safe or a lost playback thread; carries the message
    Faulted(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackReport {
    pub outcome: Outcome,
    pub loops_completed: u32,
    pub dispatched: usize,
    /// Recovered per-event failures
    pub warnings: usize,
}

impl PlaybackReport {
    fn new() -> Self {
        Self {
            outcome: Outcome::Completed,
            loops_completed: 0,
            dispatched: 0,
            warnings: 0,
        }
    }
}

/// Replays event sequences against a backend, one at a time.
pub struct Player {
    backend: SharedBackend,
    config: PlaybackConfig,
    notifier: Notifier,
    state: Arc<PlaybackState>,
}

impl Player {
    pub fn new(backend: SharedBackend, notifier: Notifier) -> Self {
        Self::with_config(backend, PlaybackConfig::default(), notifier)
    }

    pub fn with_config(backend: SharedBackend, config: PlaybackConfig, notifier: Notifier) -> Self {
        Self {
            backend,
            config,
            notifier,
            state: Arc::new(PlaybackState::new()),
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PlaybackConfig) {
        self.config = config;
    }

    pub fn state(&self) -> Arc<PlaybackState> {
        self.state.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// True until the playback thread exits, including after a cancel.
    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn cancel(&self) {
        self.state.cancel();
    }

    /// Start replaying `events` `loops` times on a new thread.
    pub fn play(&self, events: impl Into<Arc<[Event]>>, loops: u32) -> Result<PlaybackHandle> {
        let events = events.into();
        if events.is_empty() {
            let err = Error::empty_sequence();
            self.notifier.report(&err);
            return Err(err);
        }
        if !self.state.begin() {
            return Err(Error::playback_busy());
        }

        let hook = self.hook_cancel_key();
        tracing::info!(events = events.len(), loops, "playback started");

        let run = PlaybackRun {
            backend: self.backend.clone(),
            events,
            loops,
            config: self.config.clone(),
            notifier: self.notifier.clone(),
            state: self.state.clone(),
            hook,
        };
        let spawned = thread::Builder::new()
            .name("windreplay-playback".into())
            .spawn(move || run.run());

        match spawned {
            Ok(thread) => Ok(PlaybackHandle {
                state: self.state.clone(),
                thread: Some(thread),
            }),
            Err(e) => {
                self.state.finish();
                if let Some(h) = hook {
                    self.backend.unhook(h);
                }
                Err(e.into())
            }
        }
    }

    /// Play and wait for the report.
    pub fn play_blocking(&self, events: impl Into<Arc<[Event]>>, loops: u32) -> Result<PlaybackReport> {
        Ok(self.play(events, loops)?.join())
    }

    fn hook_cancel_key(&self) -> Option<HookId> {
        let state = self.state.clone();
        let cancel_key = self.config.cancel_key.clone();
        let hooked = self.backend.hook_key_events(Arc::new(move |key: &str, phase: KeyPhase| {
            if phase == KeyPhase::Down && key.eq_ignore_ascii_case(&cancel_key) {
                tracing::info!(key, "cancel key pressed");
                state.cancel();
            }
        }));
        match hooked {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "cancel key unavailable for this playback");
                None
            }
        }
    }
}

/// A playback in progress. Dropping it leaves the playback running.
pub struct PlaybackHandle {
    state: Arc<PlaybackState>,
    thread: Option<thread::JoinHandle<PlaybackReport>>,
}

impl PlaybackHandle {
    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    pub fn join(mut self) -> PlaybackReport {
        let Some(thread) = self.thread.take() else {
            return PlaybackReport {
                outcome: Outcome::Faulted("playback already joined".into()),
                ..PlaybackReport::new()
            };
        };
        thread.join().unwrap_or_else(|_| {
            self.state.finish();
            PlaybackReport {
                outcome: Outcome::Faulted("playback thread panicked".into()),
                ..PlaybackReport::new()
            }
        })
    }
}

/// Releases `busy` when the playback thread leaves `run`, unwinding included.
struct FinishOnExit(Arc<PlaybackState>);

impl Drop for FinishOnExit {
    fn drop(&mut self) {
        self.0.finish();
    }
}

struct PlaybackRun {
    backend: SharedBackend,
    events: Arc<[Event]>,
    loops: u32,
    config: PlaybackConfig,
    notifier: Notifier,
    state: Arc<PlaybackState>,
    hook: Option<HookId>,
}

impl PlaybackRun {
    fn run(self) -> PlaybackReport {
        let _finish = FinishOnExit(self.state.clone());
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut report = PlaybackReport::new();
        let outcome = self.replay(&mut rng, &mut report);

        if let Some(h) = self.hook {
            self.backend.unhook(h);
        }

        match &outcome {
            Outcome::Completed | Outcome::Cancelled => {
                let cancelled = outcome == Outcome::Cancelled;
                tracing::info!(
                    loops = report.loops_completed,
                    dispatched = report.dispatched,
                    warnings = report.warnings,
                    cancelled,
                    "playback finished"
                );
                self.notifier.send(Notification::PlaybackCompleted {
                    loops: report.loops_completed,
                    cancelled,
                });
            }
            Outcome::Faulted(message) => {
                tracing::error!(loops = report.loops_completed, "{}", message);
                self.notifier.error(message.clone());
            }
        }

        report.outcome = outcome;
        report
    }

    fn replay(&self, rng: &mut StdRng, report: &mut PlaybackReport) -> Outcome {
        let events = &self.events;
        let span = match (events.first(), events.last()) {
            (Some(first), Some(last)) => (last.t - first.t).max(0.0),
            _ => 0.0,
        };

        for lp in 0..self.loops {
            if !self.state.is_running() {
                return Outcome::Cancelled;
            }
            let started = Instant::now();

            for (i, event) in events.iter().enumerate() {
                if i > 0 && !self.state.sleep(secs(event.t - events[i - 1].t)) {
                    return Outcome::Cancelled;
                }
                if !self.state.is_running() {
                    return Outcome::Cancelled;
                }
                if self.backend.fail_safe_triggered() {
                    return Outcome::Faulted(Error::fail_safe().message);
                }

                match self.dispatch_guarded(event, rng) {
                    Ok(()) => report.dispatched += 1,
                    Err(e) if e.is_fatal() => return Outcome::Faulted(e.message),
                    Err(e) => {
                        report.warnings += 1;
                        tracing::warn!(index = i, error = %e, "action failed, continuing");
                        self.notifier.warning(format!("Action error: {}", e.message));
                    }
                }
            }

            report.loops_completed += 1;

            if lp + 1 < self.loops {
                let remaining = span - started.elapsed().as_secs_f64();
                if remaining > 0.0 && !self.state.sleep(secs(remaining)) {
                    return Outcome::Cancelled;
                }
            }
        }

        Outcome::Completed
    }

    /// Run one dispatch; backend errors and panics both come back as errors.
    fn dispatch_guarded(&self, event: &Event, rng: &mut StdRng) -> Result<()> {
        let kind = event.data.kind();
        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(event, rng))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_fatal() => Err(e),
            Ok(Err(e)) => Err(Error::dispatch_failure(kind, e.message)),
            Err(payload) => Err(Error::dispatch_failure(kind, panic_message(&payload))),
        }
    }

    fn dispatch(&self, event: &Event, rng: &mut StdRng) -> Result<()> {
        tracing::debug!(t = event.t, kind = event.data.kind(), "dispatch");
        match &event.data {
            EventData::WindowFocus { title } => {
                match self.backend.find_and_focus_window(title) {
                    Ok(true) => {}
                    Ok(false) => tracing::debug!(title = %title, "window not found, focus skipped"),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => tracing::debug!(error = %e, "focus skipped"),
                }
                Ok(())
            }
            EventData::Move { x, y } => self.move_to(*x, *y, rng),
            EventData::Click { button, x, y } => {
                self.move_to(*x, *y, rng)?;
                self.backend.click(*button)
            }
            EventData::Key { key, phase } => match phase {
                KeyPhase::Down => self.backend.press_key(key),
                KeyPhase::Up => self.backend.release_key(key),
            },
        }
    }

    fn move_to(&self, x: i32, y: i32, rng: &mut StdRng) -> Result<()> {
        if self.config.motion == MotionStyle::Teleport {
            return self.backend.move_pointer(x, y);
        }

        let from = self.backend.pointer_position()?;
        let path = self.config.motion.waypoints(from, (x, y), rng);
        for &(px, py) in &path {
            self.backend.move_pointer(px, py)?;
            if !self.config.waypoint_delay.is_zero() {
                thread::sleep(self.config.waypoint_delay);
            }
        }
        if path.last() != Some(&(x, y)) {
            self.backend.move_pointer(x, y)?;
        }
        Ok(())
    }
}

fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s.max(0.0)).unwrap_or(Duration::ZERO)
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during dispatch".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_returns_early_on_cancel() {
        let state = Arc::new(PlaybackState::new());
        assert!(state.begin());
        let s = state.clone();
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            s.cancel();
        });
        let start = Instant::now();
        assert!(!state.sleep(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(2));
        waker.join().unwrap();
    }

    #[test]
    fn sleep_completes_while_running() {
        let state = PlaybackState::new();
        assert!(state.begin());
        assert!(state.sleep(Duration::from_millis(5)));
        assert!(state.sleep(Duration::ZERO));
    }

    #[test]
    fn begin_is_exclusive() {
        let state = PlaybackState::new();
        assert!(state.begin());
        assert!(!state.begin());
        state.finish();
        assert!(state.begin());
    }

    #[test]
    fn cancel_keeps_busy_until_the_run_exits() {
        let state = PlaybackState::new();
        assert!(state.begin());
        state.cancel();
        assert!(!state.is_running());
        assert!(state.is_busy());
        assert!(!state.begin());

        state.finish();
        assert!(!state.is_busy());
        assert!(state.begin());
        assert!(state.is_running());
    }

    #[test]
    fn finish_guard_releases_on_unwind() {
        let state = Arc::new(PlaybackState::new());
        assert!(state.begin());
        let s = state.clone();
        let res = thread::spawn(move || {
            let _finish = FinishOnExit(s);
            panic!("dispatch blew up");
        })
        .join();
        assert!(res.is_err());
        assert!(!state.is_busy());
        assert!(state.begin());
    }

    #[test]
    fn negative_and_nan_delays_are_zero() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(0.25), Duration::from_millis(250));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload = panic::catch_unwind(|| panic!("backend exploded")).unwrap_err();
        assert_eq!(panic_message(&payload), "backend exploded");
    }
}
