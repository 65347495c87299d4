//! In-memory input backend
//!
//! Simulates a pointer, buttons, keyboard hooks and a window list without
//! touching the OS. Every injected action is logged with the instant it
//! happened, so callers can inspect what a playback did and when.

use crate::error::{Error, Result};
use crate::input::{HookId, InputBackend, KeyCallback, KeyPhase, MouseButton};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// One injected action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Move { x: i32, y: i32 },
    Click(MouseButton),
    Press(String),
    Release(String),
    Focus(String),
}

struct State {
    pointer: (i32, i32),
    pressed: HashSet<MouseButton>,
    held_keys: HashSet<String>,
    windows: Vec<String>,
    foreground: String,
    guard: Option<(i32, i32)>,
    failing_keys: HashSet<String>,
    slow_keys: HashMap<String, Duration>,
    calls: Vec<(Instant, BackendCall)>,
}

pub struct HeadlessBackend {
    state: Mutex<State>,
    hooks: Mutex<Vec<(HookId, KeyCallback)>>,
    next_hook: AtomicU64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pointer: (0, 0),
                pressed: HashSet::new(),
                held_keys: HashSet::new(),
                windows: Vec::new(),
                foreground: String::new(),
                guard: None,
                failing_keys: HashSet::new(),
                slow_keys: HashMap::new(),
                calls: Vec::new(),
            }),
            hooks: Mutex::new(Vec::new()),
            next_hook: AtomicU64::new(1),
        }
    }

    /// Known top-level windows; the first one starts in the foreground.
    pub fn with_windows<I, S>(self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut st = self.state.lock();
            st.windows = titles.into_iter().map(Into::into).collect();
            st.foreground = st.windows.first().cloned().unwrap_or_default();
        }
        self
    }

    /// Arm the fail-safe: any action while the pointer sits here fails.
    pub fn with_guard(self, corner: (i32, i32)) -> Self {
        self.state.lock().guard = Some(corner);
        self
    }

    /// Make pressing or releasing `key` fail with a dispatch error.
    pub fn fail_on_key(&self, key: impl Into<String>) {
        self.state.lock().failing_keys.insert(key.into());
    }

    /// Make pressing or releasing `key` take `delay` before it lands.
    pub fn slow_key(&self, key: impl Into<String>, delay: Duration) {
        self.state.lock().slow_keys.insert(key.into(), delay);
    }

    /// Simulate the user moving the physical mouse.
    pub fn set_pointer(&self, x: i32, y: i32) {
        self.state.lock().pointer = (x, y);
    }

    pub fn set_button(&self, button: MouseButton, down: bool) {
        let mut st = self.state.lock();
        if down {
            st.pressed.insert(button);
        } else {
            st.pressed.remove(&button);
        }
    }

    pub fn set_foreground(&self, title: impl Into<String>) {
        let title = title.into();
        let mut st = self.state.lock();
        if !st.windows.contains(&title) {
            st.windows.push(title.clone());
        }
        st.foreground = title;
    }

    /// Simulate a physical key transition, delivered to every hook.
    pub fn emit_key(&self, key: &str, phase: KeyPhase) {
        // Callbacks may call back into the backend
        let hooks: Vec<KeyCallback> = self.hooks.lock().iter().map(|(_, cb)| cb.clone()).collect();
        for cb in hooks {
            cb(key, phase);
        }
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, BackendCall)> {
        self.state.lock().calls.clone()
    }

    pub fn held_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.state.lock().held_keys.iter().cloned().collect();
        keys.sort();
        keys
    }

    fn check_guard(st: &State) -> Result<()> {
        match st.guard {
            Some(corner) if st.pointer == corner => Err(Error::fail_safe()),
            _ => Ok(()),
        }
    }

    fn record(st: &mut State, call: BackendCall) {
        tracing::debug!(?call, "headless input");
        st.calls.push((Instant::now(), call));
    }

    fn key(&self, key: &str, phase: KeyPhase) -> Result<()> {
        let delay = self.state.lock().slow_keys.get(key).copied();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let mut st = self.state.lock();
        Self::check_guard(&st)?;
        if st.failing_keys.contains(key) {
            return Err(Error::dispatch_failure("key", format!("cannot {} '{}'", phase, key)));
        }
        match phase {
            KeyPhase::Down => {
                st.held_keys.insert(key.to_string());
                Self::record(&mut st, BackendCall::Press(key.to_string()));
            }
            KeyPhase::Up => {
                st.held_keys.remove(key);
                Self::record(&mut st, BackendCall::Release(key.to_string()));
            }
        }
        Ok(())
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBackend for HeadlessBackend {
    fn pointer_position(&self) -> Result<(i32, i32)> {
        Ok(self.state.lock().pointer)
    }

    fn is_button_pressed(&self, button: MouseButton) -> Result<bool> {
        Ok(self.state.lock().pressed.contains(&button))
    }

    fn move_pointer(&self, x: i32, y: i32) -> Result<()> {
        let mut st = self.state.lock();
        Self::check_guard(&st)?;
        st.pointer = (x, y);
        Self::record(&mut st, BackendCall::Move { x, y });
        Ok(())
    }

    fn click(&self, button: MouseButton) -> Result<()> {
        let mut st = self.state.lock();
        Self::check_guard(&st)?;
        Self::record(&mut st, BackendCall::Click(button));
        Ok(())
    }

    fn press_key(&self, key: &str) -> Result<()> {
        self.key(key, KeyPhase::Down)
    }

    fn release_key(&self, key: &str) -> Result<()> {
        self.key(key, KeyPhase::Up)
    }

    fn foreground_window_title(&self) -> Result<String> {
        Ok(self.state.lock().foreground.clone())
    }

    fn find_and_focus_window(&self, title: &str) -> Result<bool> {
        let mut st = self.state.lock();
        Self::check_guard(&st)?;
        if !st.windows.iter().any(|w| w == title) {
            return Ok(false);
        }
        st.foreground = title.to_string();
        Self::record(&mut st, BackendCall::Focus(title.to_string()));
        Ok(true)
    }

    fn hook_key_events(&self, callback: KeyCallback) -> Result<HookId> {
        let id = HookId(self.next_hook.fetch_add(1, Ordering::Relaxed));
        self.hooks.lock().push((id, callback));
        Ok(id)
    }

    fn unhook(&self, id: HookId) {
        self.hooks.lock().retain(|(h, _)| *h != id);
    }

    fn unhook_all(&self) {
        self.hooks.lock().clear();
    }

    fn fail_safe_triggered(&self) -> bool {
        Self::check_guard(&self.state.lock()).is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn guard_corner_blocks_actions() {
        let backend = HeadlessBackend::new().with_guard((0, 0));
        backend.set_pointer(5, 5);
        backend.move_pointer(0, 0).unwrap();
        assert!(backend.fail_safe_triggered());
        let err = backend.click(MouseButton::Left).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn hooks_receive_keys_until_unhooked() {
        let backend = HeadlessBackend::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let id = backend
            .hook_key_events(Arc::new(move |_: &str, _: KeyPhase| {
                s.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        backend.emit_key("a", KeyPhase::Down);
        backend.unhook(id);
        backend.emit_key("a", KeyPhase::Up);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(backend.hook_count(), 0);
    }

    #[test]
    fn focus_only_known_windows() {
        let backend = HeadlessBackend::new().with_windows(["Editor", "Terminal"]);
        assert_eq!(backend.foreground_window_title().unwrap(), "Editor");
        assert!(backend.find_and_focus_window("Terminal").unwrap());
        assert!(!backend.find_and_focus_window("Browser").unwrap());
        assert_eq!(backend.calls(), vec![BackendCall::Focus("Terminal".into())]);
    }

    #[test]
    fn key_state_is_tracked() {
        let backend = HeadlessBackend::new();
        backend.press_key("shift").unwrap();
        backend.press_key("a").unwrap();
        backend.release_key("a").unwrap();
        assert_eq!(backend.held_keys(), vec!["shift".to_string()]);

        backend.fail_on_key("f13");
        assert!(backend.press_key("f13").is_err());
    }

    #[test]
    fn slow_keys_land_after_the_delay() {
        let backend = HeadlessBackend::new();
        backend.slow_key("f1", Duration::from_millis(40));
        let start = Instant::now();
        backend.press_key("f1").unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(backend.calls(), vec![BackendCall::Press("f1".into())]);
    }
}
