#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use super::state::UndoState;

/// One committed transaction.
#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub label: String,
    pub before: Arc<UndoState>,
    pub after: Arc<UndoState>,
    /// Revision numbers of the two states, for the saved marker.
    pub(crate) before_rev: u64,
    pub(crate) after_rev: u64,
}

/// Linear undo history.
pub struct UndoLog {
    /// Newest at back.
    undo_stack: VecDeque<UndoEntry>,
    /// Newest at back.
    redo_stack: VecDeque<UndoEntry>,
    max_depth: usize,
    /// Revision of the current state.
    revision: u64,
    next_revision: u64,
    saved_revision: Option<u64>,
}

impl fmt::Debug for UndoLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoLog")
            .field("undo_depth", &self.undo_stack.len())
            .field("redo_depth", &self.redo_stack.len())
            .field("max_depth", &self.max_depth)
            .field("needs_save", &self.needs_save())
            .finish()
    }
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(100)
    }
}

impl UndoLog {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
            revision: 0,
            next_revision: 1,
            saved_revision: Some(0),
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Record a committed transaction. Clears the redo stack.
    pub fn push(&mut self, label: String, before: UndoState, after: UndoState) {
        self.redo_stack.clear();
        let after_rev = self.next_revision;
        self.next_revision += 1;
        self.undo_stack.push_back(UndoEntry {
            label,
            before: Arc::new(before),
            after: Arc::new(after),
            before_rev: self.revision,
            after_rev,
        });
        self.revision = after_rev;
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
        tracing::debug!(
            target: "subcue.undo",
            depth = self.undo_stack.len(),
            "transaction committed"
        );
    }

    /// Move the newest entry to the redo stack and return it.
    pub(crate) fn pop_undo(&mut self) -> Option<UndoEntry> {
        let entry = self.undo_stack.pop_back()?;
        self.revision = entry.before_rev;
        self.redo_stack.push_back(entry.clone());
        Some(entry)
    }

    /// Move the newest undone entry back and return it.
    pub(crate) fn pop_redo(&mut self) -> Option<UndoEntry> {
        let entry = self.redo_stack.pop_back()?;
        self.revision = entry.after_rev;
        self.undo_stack.push_back(entry.clone());
        Some(entry)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    // ========================================================================
    // Info
    // ========================================================================

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Labels of undoable entries, most recent first.
    pub fn undo_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.undo_stack.iter().rev().map(|e| e.label.as_str())
    }

    /// Labels of redoable entries, most recent first.
    pub fn redo_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.redo_stack.iter().rev().map(|e| e.label.as_str())
    }

    #[must_use]
    pub fn next_undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.label.as_str())
    }

    #[must_use]
    pub fn next_redo_label(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.label.as_str())
    }

    /// Whether the current state differs from the last saved one.
    #[must_use]
    pub fn needs_save(&self) -> bool {
        self.saved_revision != Some(self.revision)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Forget all history; the current state counts as saved.
    pub fn reset(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.revision = 0;
        self.next_revision = 1;
        self.saved_revision = Some(0);
    }

    pub fn mark_saved(&mut self) {
        self.saved_revision = Some(self.revision);
    }

    /// Revision of the current state; pair with [`mark_saved_at`](Self::mark_saved_at)
    /// when the save finishes later.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mark revision `revision` as the saved one.
    pub fn mark_saved_at(&mut self, revision: u64) {
        self.saved_revision = Some(revision);
    }

    /// Mark the current state as never saved (new, unnamed document).
    pub fn mark_unsaved(&mut self) {
        self.saved_revision = None;
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth.max(1);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use subcue_core::{Document, Selection, SubtitleEvent};

    fn state(n: i64) -> UndoState {
        let mut document = Document::new();
        for i in 0..n {
            document.push(SubtitleEvent::new(i, i + 1));
        }
        UndoState {
            document,
            selection: Selection::new(),
        }
    }

    #[test]
    fn push_clears_redo() {
        let mut log = UndoLog::new(10);
        log.push("a".into(), state(0), state(1));
        log.push("b".into(), state(1), state(2));
        assert_eq!(log.pop_undo().map(|e| e.label), Some("b".to_owned()));
        assert!(log.can_redo());
        log.push("c".into(), state(1), state(3));
        assert!(!log.can_redo());
        assert_eq!(log.undo_labels().collect::<Vec<_>>(), vec!["c", "a"]);
    }

    #[test]
    fn depth_limit_evicts_oldest() {
        let mut log = UndoLog::new(2);
        for i in 0..5 {
            log.push(format!("e{i}"), state(i), state(i + 1));
        }
        assert_eq!(log.undo_depth(), 2);
        assert_eq!(log.next_undo_label(), Some("e4"));
        log.set_max_depth(1);
        assert_eq!(log.undo_labels().collect::<Vec<_>>(), vec!["e4"]);
    }

    #[test]
    fn saved_marker_follows_undo_and_redo() {
        let mut log = UndoLog::new(10);
        assert!(!log.needs_save());
        log.push("a".into(), state(0), state(1));
        assert!(log.needs_save());
        log.mark_saved();
        assert!(!log.needs_save());
        log.pop_undo();
        assert!(log.needs_save());
        log.pop_redo();
        assert!(!log.needs_save());
        log.mark_unsaved();
        assert!(log.needs_save());
        let rev = log.revision();
        log.push("b".into(), state(1), state(2));
        log.mark_saved_at(rev);
        assert!(log.needs_save());
        log.pop_undo();
        assert!(!log.needs_save());
        log.reset();
        assert!(!log.needs_save());
        assert!(!log.can_undo());
    }
}
