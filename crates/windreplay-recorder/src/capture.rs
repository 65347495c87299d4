//! Capture: poll the pointer on a fixed tick, listen for keys, buffer events
//!
//! Two writers feed one [`CaptureSession`]: the sampler thread and the
//! backend's key hook. Both append under the same mutex, and the timestamp is
//! taken while the lock is held so the buffer stays time-ordered.

use crate::events::{wall_clock, Event, EventData};
use crate::notify::{Notification, Notifier};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use windreplay_core::{Error, HookId, InputBackend, KeyPhase, MouseButton, Result, SharedBackend};

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Pointer polling cadence
    pub interval: Duration,
    /// Samples are skipped while the foreground title contains this
    pub own_window_marker: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            own_window_marker: "Macro Recorder".to_string(),
        }
    }
}

/// What the backend reported at one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub pointer: (i32, i32),
    /// Held button, by priority left > right > middle
    pub pressed: Option<MouseButton>,
    pub foreground: String,
}

impl Sample {
    pub fn read(backend: &dyn InputBackend) -> Result<Self> {
        let pointer = backend.pointer_position()?;
        let mut pressed = None;
        for button in MouseButton::ALL {
            if backend.is_button_pressed(button)? {
                pressed = Some(button);
                break;
            }
        }
        let foreground = backend.foreground_window_title()?;
        Ok(Self {
            pointer,
            pressed,
            foreground,
        })
    }
}

/// In-progress recording
pub struct CaptureSession {
    config: CaptureConfig,
    notifier: Notifier,
    buffer: Vec<Event>,
    last_pos: Option<(i32, i32)>,
    last_window: Option<String>,
    active: bool,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig, notifier: Notifier) -> Self {
        Self {
            config,
            notifier,
            buffer: Vec::new(),
            last_pos: None,
            last_window: None,
            active: false,
        }
    }

    /// Clear everything and start accepting events. Restarting an active
    /// session discards what was buffered.
    pub fn start(&mut self) {
        if self.active {
            tracing::debug!(dropped = self.buffer.len(), "capture restarted while active");
        }
        self.buffer.clear();
        self.last_pos = None;
        self.last_window = None;
        self.active = true;
        self.notifier.send(Notification::BufferUpdated(Vec::new()));
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn events(&self) -> &[Event] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drain the buffer, leaving the session empty.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.buffer)
    }

    /// Handle one polling tick. Returns whether anything was appended.
    pub fn on_sample(&mut self, sample: &Sample, t: f64) -> bool {
        if !self.active {
            return false;
        }
        let marker = &self.config.own_window_marker;
        if !marker.is_empty() && sample.foreground.contains(marker.as_str()) {
            return false;
        }

        let mut appended = false;

        if self.last_window.as_deref() != Some(sample.foreground.as_str()) {
            self.last_window = Some(sample.foreground.clone());
            self.push(Event::window_focus(t, sample.foreground.clone()));
            appended = true;
        }

        let moved = self.last_pos != Some(sample.pointer);
        if moved || sample.pressed.is_some() {
            let (x, y) = sample.pointer;
            let data = match sample.pressed {
                Some(button) => EventData::Click { button, x, y },
                None => EventData::Move { x, y },
            };
            self.last_pos = Some(sample.pointer);
            self.push(Event::new(t, data));
            appended = true;
        }

        appended
    }

    pub fn on_key(&mut self, key: &str, phase: KeyPhase, t: f64) -> bool {
        if !self.active {
            return false;
        }
        self.push(Event::key(t, key, phase));
        true
    }

    fn push(&mut self, mut event: Event) {
        // Wall clock can step backwards; keep the buffer non-decreasing
        if let Some(last) = self.buffer.last() {
            if event.t < last.t {
                event.t = last.t;
            }
        }
        self.buffer.push(event);
        self.notifier
            .send(Notification::BufferUpdated(self.buffer.clone()));
    }
}

/// Starts recordings against a backend
pub struct Recorder {
    backend: SharedBackend,
    config: CaptureConfig,
    notifier: Notifier,
}

impl Recorder {
    pub fn new(backend: SharedBackend, notifier: Notifier) -> Self {
        Self::with_config(backend, CaptureConfig::default(), notifier)
    }

    pub fn with_config(backend: SharedBackend, config: CaptureConfig, notifier: Notifier) -> Self {
        Self {
            backend,
            config,
            notifier,
        }
    }

    pub fn start(&self) -> Result<RecordingHandle> {
        let session = Arc::new(Mutex::new(CaptureSession::new(
            self.config.clone(),
            self.notifier.clone(),
        )));
        session.lock().start();

        let keys = session.clone();
        let hook = self.backend.hook_key_events(Arc::new(move |key: &str, phase: KeyPhase| {
            let mut s = keys.lock();
            let t = wall_clock();
            s.on_key(key, phase, t);
        }))?;

        let stop = Arc::new(AtomicBool::new(false));
        let sampler = Sampler {
            backend: self.backend.clone(),
            session: session.clone(),
            stop: stop.clone(),
            interval: self.config.interval,
            notifier: self.notifier.clone(),
        };
        let thread = thread::Builder::new()
            .name("windreplay-sampler".into())
            .spawn(move || sampler.run());
        let thread = match thread {
            Ok(t) => t,
            Err(e) => {
                self.backend.unhook(hook);
                return Err(e.into());
            }
        };

        tracing::info!(interval_ms = self.config.interval.as_millis() as u64, "recording started");

        Ok(RecordingHandle {
            session,
            stop,
            hook,
            backend: self.backend.clone(),
            thread: Some(thread),
        })
    }
}

struct Sampler {
    backend: SharedBackend,
    session: Arc<Mutex<CaptureSession>>,
    stop: Arc<AtomicBool>,
    interval: Duration,
    notifier: Notifier,
}

impl Sampler {
    fn run(self) {
        let mut next = Instant::now();

        while !self.stop.load(Ordering::Relaxed) {
            if self.backend.fail_safe_triggered() {
                self.abort(&Error::fail_safe());
                break;
            }

            match Sample::read(&*self.backend) {
                Ok(sample) => {
                    let mut s = self.session.lock();
                    if !s.is_active() {
                        break;
                    }
                    let t = wall_clock();
                    s.on_sample(&sample, t);
                }
                Err(e) if e.is_fatal() => {
                    self.abort(&e);
                    break;
                }
                Err(e) => tracing::debug!(error = %e, "skipping sample"),
            }

            next += self.interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                next = now;
            }
        }
    }

    fn abort(&self, err: &Error) {
        tracing::error!(error = %err, "recording aborted");
        self.session.lock().stop();
        self.stop.store(true, Ordering::SeqCst);
        self.notifier.report(err);
    }
}

/// Owns a live recording. Dropping it stops the recording and discards the
/// buffer.
pub struct RecordingHandle {
    session: Arc<Mutex<CaptureSession>>,
    stop: Arc<AtomicBool>,
    hook: HookId,
    backend: SharedBackend,
    thread: Option<thread::JoinHandle<()>>,
}

impl RecordingHandle {
    /// False once stopped, aborted, or the sampler thread has died.
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Relaxed)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
            && self.session.lock().is_active()
    }

    /// Copy of what has been captured so far
    pub fn snapshot(&self) -> Vec<Event> {
        self.session.lock().events().to_vec()
    }

    pub fn len(&self) -> usize {
        self.session.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop recording and hand back the raw buffer (absolute timestamps).
    pub fn stop(mut self) -> Vec<Event> {
        self.shutdown();
        let events = self.session.lock().take_events();
        tracing::info!(events = events.len(), "recording stopped");
        events
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.backend.unhook(self.hook);
        self.session.lock().stop();
        if let Some(t) = self.thread.take() {
            if t.join().is_err() {
                tracing::error!("sampler thread panicked, keeping what was captured");
            }
        }
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}
