#![forbid(unsafe_code)]

//! The editing context passed to every command.
//!
//! [`Editor`] owns the document, selection, undo log and audio view, plus
//! boxed collaborators for playback, prompts, persistence and notifications.
//! It is owned by the interactive thread; commands receive it by `&mut` and
//! background work never sees it.
//!
//! ```text
//!   Engine ──execute──▶ Command::run(&mut Editor, &Args)
//!                             │
//!             ┌───────────────┼────────────────┐
//!             ▼               ▼                ▼
//!        Document +      Playback /        UndoLog via
//!        Selection       Prompt / ...      begin_capture()
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use subcue_core::{Document, DocumentData, Selection, Timecodes};

use crate::error::PersistError;
use crate::log::{Notifier, UserLog};
use crate::options::Options;
use crate::undo::{Capture, UndoLog};

// ============================================================================
// Collaborators
// ============================================================================

/// Video/audio playback as seen by the editing core.
pub trait Playback {
    /// Whether media is loaded.
    fn is_loaded(&self) -> bool;
    /// Timestamp of the frame on screen.
    fn current_pts(&self) -> i64;
    /// Timestamp of the last frame.
    fn max_pts(&self) -> i64;
    /// Frame timing of the loaded video, if any.
    fn timecodes(&self) -> Option<&Timecodes>;
    fn seek(&mut self, pts: i64, precise: bool);
    fn play(&mut self, start: i64, end: i64);
    fn is_paused(&self) -> bool;
    fn set_paused(&mut self, paused: bool);
}

/// Playback stand-in when no media is loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlayback;

impl Playback for NoPlayback {
    fn is_loaded(&self) -> bool {
        false
    }
    fn current_pts(&self) -> i64 {
        0
    }
    fn max_pts(&self) -> i64 {
        0
    }
    fn timecodes(&self) -> Option<&Timecodes> {
        None
    }
    fn seek(&mut self, _pts: i64, _precise: bool) {}
    fn play(&mut self, _start: i64, _end: i64) {}
    fn is_paused(&self) -> bool {
        true
    }
    fn set_paused(&mut self, _paused: bool) {}
}

/// Answer of a time prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTime {
    Absolute(i64),
    /// Offset from the origin the prompt was opened with.
    Relative(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    Open,
    Save,
}

/// Modal prompts. `None` means the user cancelled.
pub trait Prompt {
    fn ask_number(&mut self, title: &str, min: i64, max: i64) -> Option<i64>;
    fn ask_time(&mut self, title: &str, origin: Option<i64>) -> Option<PromptTime>;
    fn ask_path(&mut self, title: &str, mode: PathMode) -> Option<PathBuf>;
}

/// Prompt that always cancels; used when there is nobody to ask.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompt for NoPrompt {
    fn ask_number(&mut self, _title: &str, _min: i64, _max: i64) -> Option<i64> {
        None
    }
    fn ask_time(&mut self, _title: &str, _origin: Option<i64>) -> Option<PromptTime> {
        None
    }
    fn ask_path(&mut self, _title: &str, _mode: PathMode) -> Option<PathBuf> {
        None
    }
}

/// Subtitle file reader/writer. Called from background workers.
pub trait Persistence: Send + Sync {
    fn load(&self, path: &Path) -> Result<Document, PersistError>;
    fn save(&self, document: &Document, path: &Path) -> Result<(), PersistError>;
}

/// Stores documents as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonPersistence;

impl Persistence for JsonPersistence {
    fn load(&self, path: &Path) -> Result<Document, PersistError> {
        let text = std::fs::read_to_string(path).map_err(|e| PersistError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let data: DocumentData = serde_json::from_str(&text).map_err(|e| PersistError::Format {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Document::from_data(data))
    }

    fn save(&self, document: &Document, path: &Path) -> Result<(), PersistError> {
        let write_err = |message: String| PersistError::Write {
            path: path.display().to_string(),
            message,
        };
        let text =
            serde_json::to_string_pretty(&document.to_data()).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| write_err(e.to_string()))
    }
}

// ============================================================================
// Audio view
// ============================================================================

/// Audio selection and visible range of the spectrogram, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioView {
    pub selection_start: i64,
    pub selection_end: i64,
    pub view_start: i64,
    pub view_end: i64,
}

impl AudioView {
    /// Set the selection, keeping `start <= end`.
    pub fn select(&mut self, start: i64, end: i64) {
        self.selection_start = start.min(end);
        self.selection_end = start.max(end);
    }
}

// ============================================================================
// Editor
// ============================================================================

/// Explicit editing context.
pub struct Editor {
    pub document: Document,
    pub selection: Selection,
    pub audio: AudioView,
    pub options: Options,
    /// File the document was loaded from or last saved to.
    pub path: Option<PathBuf>,
    pub(crate) undo: UndoLog,
    pub(crate) capture: Option<Capture>,
    playback: Box<dyn Playback>,
    prompt: Box<dyn Prompt>,
    persistence: Arc<dyn Persistence>,
    log: UserLog,
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("events", &self.document.len())
            .field("selection", &self.selection.len())
            .field("path", &self.path)
            .field("undo", &self.undo)
            .field("capturing", &self.capture.is_some())
            .finish()
    }
}

impl Editor {
    /// Editor with the given options and no-op collaborators.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            document: Document::new(),
            selection: Selection::new(),
            audio: AudioView::default(),
            undo: UndoLog::new(options.undo.max_depth),
            log: UserLog::new(Box::new(crate::log::NullNotifier), options.log.history),
            options,
            path: None,
            capture: None,
            playback: Box::new(NoPlayback),
            prompt: Box::new(NoPrompt),
            persistence: Arc::new(JsonPersistence),
        }
    }

    /// Default options, no media, prompts that cancel, JSON files.
    #[must_use]
    pub fn headless() -> Self {
        Self::new(Options::default())
    }

    #[must_use]
    pub fn with_playback(mut self, playback: Box<dyn Playback>) -> Self {
        self.playback = playback;
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: Box<dyn Prompt>) -> Self {
        self.prompt = prompt;
        self
    }

    #[must_use]
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = persistence;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.log.set_notifier(notifier);
        self
    }

    #[must_use]
    pub fn with_document(mut self, document: Document) -> Self {
        self.replace_document(document, None);
        self
    }

    pub fn playback(&self) -> &dyn Playback {
        self.playback.as_ref()
    }

    pub fn playback_mut(&mut self) -> &mut dyn Playback {
        self.playback.as_mut()
    }

    pub fn prompt(&mut self) -> &mut dyn Prompt {
        self.prompt.as_mut()
    }

    #[must_use]
    pub fn persistence(&self) -> Arc<dyn Persistence> {
        Arc::clone(&self.persistence)
    }

    pub fn log(&mut self) -> &mut UserLog {
        &mut self.log
    }

    #[must_use]
    pub fn user_log(&self) -> &UserLog {
        &self.log
    }

    #[must_use]
    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    /// Timecodes of loaded media.
    #[must_use]
    pub fn timecodes(&self) -> Option<&Timecodes> {
        if self.playback.is_loaded() {
            self.playback.timecodes()
        } else {
            None
        }
    }

    /// Snap `ms` to the nearest frame when timecodes are available.
    #[must_use]
    pub fn align(&self, ms: i64) -> i64 {
        self.timecodes()
            .map_or(ms, |tc| tc.align_to_near_frame(ms))
    }

    /// Snap only when `align` is set.
    #[must_use]
    pub fn maybe_align(&self, ms: i64, align: bool) -> i64 {
        if align { self.align(ms) } else { ms }
    }

    /// Install a freshly loaded or new document. The undo log starts over.
    pub fn replace_document(&mut self, document: Document, path: Option<PathBuf>) {
        self.document = document;
        self.selection = Selection::new();
        self.selection.revalidate(&self.document);
        self.undo.reset();
        self.capture = None;
        self.path = path;
    }

    /// Apply option changes that affect owned components.
    pub fn set_options(&mut self, options: Options) {
        self.undo.set_max_depth(options.undo.max_depth);
        self.log.set_capacity(options.log.history);
        self.options = options;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePlayback;
    use subcue_core::SubtitleEvent;

    #[test]
    fn alignment_needs_loaded_media() {
        let ed = Editor::headless();
        assert_eq!(ed.align(1015), 1015);
        let ed = ed.with_playback(Box::new(FakePlayback::at_fps(25.0, 100)));
        assert_eq!(ed.align(1015), 1000);
        assert_eq!(ed.align(1025), 1040);
        assert_eq!(ed.maybe_align(1025, false), 1025);
    }

    #[test]
    fn json_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let mut doc = Document::new();
        doc.push(SubtitleEvent::new(0, 1000).with_text("hello"));
        doc.set_meta("Title", "test");
        JsonPersistence.save(&doc, &path).unwrap();
        let back = JsonPersistence.load(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.get(0).map(|e| e.text.as_str()), Some("hello"));
        assert_eq!(back.meta("Title"), Some("test"));
        assert!(back.validate().is_ok());

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonPersistence.load(&path),
            Err(PersistError::Format { .. })
        ));
        assert!(matches!(
            JsonPersistence.load(&dir.path().join("missing.json")),
            Err(PersistError::Read { .. })
        ));
    }

    #[test]
    fn replace_document_resets_state() {
        let mut ed = Editor::headless();
        ed.document.push(SubtitleEvent::new(0, 1));
        ed.selection = Selection::of_indexes(&ed.document, &[0]);
        let mut doc = Document::new();
        doc.push(SubtitleEvent::new(5, 6));
        ed.replace_document(doc, Some(PathBuf::from("x.json")));
        assert!(ed.selection.is_empty());
        assert!(ed.selection.is_current(&ed.document));
        assert_eq!(ed.document.len(), 1);
        assert!(!ed.undo_log().can_undo());
        assert!(!ed.undo_log().needs_save());
    }
}
