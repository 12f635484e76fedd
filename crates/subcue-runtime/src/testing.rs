#![forbid(unsafe_code)]

//! Scripted collaborators for tests.
//!
//! Enabled for this crate's own tests and, through the `test-helpers`
//! feature, for downstream crates.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

use subcue_core::{Document, Timecodes};

use crate::context::{PathMode, Persistence, Playback, Prompt, PromptTime};
use crate::error::PersistError;
use crate::log::{Level, Notifier};

// ============================================================================
// Playback
// ============================================================================

/// One call observed by [`FakePlayback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCall {
    Seek { pts: i64, precise: bool },
    Play { start: i64, end: i64 },
    Paused(bool),
}

/// Constant-rate video that records what it is asked to do.
///
/// Clones share the call record, so a test can keep one clone and box the
/// other into the editor.
#[derive(Debug, Clone)]
pub struct FakePlayback {
    timecodes: Option<Timecodes>,
    pts: i64,
    paused: bool,
    calls: Arc<Mutex<Vec<PlaybackCall>>>,
}

impl FakePlayback {
    /// `frames` frames at `fps`, positioned on the first frame, paused.
    #[must_use]
    pub fn at_fps(fps: f64, frames: usize) -> Self {
        Self {
            timecodes: Some(Timecodes::from_fps(fps, frames).expect("valid frame rate")),
            pts: 0,
            paused: true,
            calls: Arc::default(),
        }
    }

    /// No media loaded.
    #[must_use]
    pub fn unloaded() -> Self {
        Self {
            timecodes: None,
            pts: 0,
            paused: true,
            calls: Arc::default(),
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<PlaybackCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: PlaybackCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

impl Playback for FakePlayback {
    fn is_loaded(&self) -> bool {
        self.timecodes.is_some()
    }

    fn current_pts(&self) -> i64 {
        self.pts
    }

    fn max_pts(&self) -> i64 {
        self.timecodes
            .as_ref()
            .and_then(|tc| tc.pts().last().copied())
            .unwrap_or(0)
    }

    fn timecodes(&self) -> Option<&Timecodes> {
        self.timecodes.as_ref()
    }

    fn seek(&mut self, pts: i64, precise: bool) {
        self.pts = pts;
        self.record(PlaybackCall::Seek { pts, precise });
    }

    fn play(&mut self, start: i64, end: i64) {
        self.paused = false;
        self.record(PlaybackCall::Play { start, end });
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.record(PlaybackCall::Paused(paused));
    }
}

// ============================================================================
// Prompt
// ============================================================================

/// Prompt that replays queued answers; an exhausted queue cancels.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    numbers: VecDeque<Option<i64>>,
    times: VecDeque<Option<PromptTime>>,
    paths: VecDeque<Option<PathBuf>>,
}

impl ScriptedPrompt {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn number(mut self, n: i64) -> Self {
        self.numbers.push_back(Some(n));
        self
    }

    #[must_use]
    pub fn cancel_number(mut self) -> Self {
        self.numbers.push_back(None);
        self
    }

    #[must_use]
    pub fn time(mut self, time: PromptTime) -> Self {
        self.times.push_back(Some(time));
        self
    }

    #[must_use]
    pub fn cancel_time(mut self) -> Self {
        self.times.push_back(None);
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push_back(Some(path.into()));
        self
    }

    #[must_use]
    pub fn cancel_path(mut self) -> Self {
        self.paths.push_back(None);
        self
    }
}

impl Prompt for ScriptedPrompt {
    fn ask_number(&mut self, _title: &str, _min: i64, _max: i64) -> Option<i64> {
        self.numbers.pop_front().flatten()
    }

    fn ask_time(&mut self, _title: &str, _origin: Option<i64>) -> Option<PromptTime> {
        self.times.pop_front().flatten()
    }

    fn ask_path(&mut self, _title: &str, _mode: PathMode) -> Option<PathBuf> {
        self.paths.pop_front().flatten()
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Notifier that keeps every message. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotifier {
    messages: Arc<Mutex<Vec<(Level, String)>>>,
}

impl MemoryNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(&self, level: Level, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((level, message.to_owned()));
    }
}

impl Notifier for MemoryNotifier {
    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }
    fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }
    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Latch shared between a test and [`GatedPersistence`].
#[derive(Debug, Clone, Default)]
pub struct Gate {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.state;
        *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (lock, cvar) = &*self.state;
        let mut open = lock.lock().unwrap_or_else(|e| e.into_inner());
        while !*open {
            open = cvar.wait(open).unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// JSON persistence whose loads and saves block until the gate opens, so a
/// test can act while a background job is in flight.
#[derive(Debug, Clone, Default)]
pub struct GatedPersistence {
    gate: Gate,
}

impl GatedPersistence {
    #[must_use]
    pub fn new(gate: Gate) -> Self {
        Self { gate }
    }
}

impl Persistence for GatedPersistence {
    fn load(&self, path: &Path) -> Result<Document, PersistError> {
        self.gate.wait();
        crate::context::JsonPersistence.load(path)
    }

    fn save(&self, document: &Document, path: &Path) -> Result<(), PersistError> {
        self.gate.wait();
        crate::context::JsonPersistence.save(document, path)
    }
}
