#![forbid(unsafe_code)]

//! Scoped edit capture.

use std::ops::{Deref, DerefMut};

use super::state::UndoState;
use crate::context::Editor;
use crate::error::{CommandError, CommandResult};

/// The open outermost transaction, stored on the editor.
#[derive(Debug)]
pub(crate) struct Capture {
    label: String,
    before: UndoState,
    poisoned: bool,
}

/// Guard for an open edit. Dereferences to the [`Editor`].
///
/// Resolves exactly once: [`commit`](Self::commit) records the edit, dropping
/// the guard without committing rolls it back (early return, `?`, panic).
#[must_use = "dropping a transaction without commit() rolls it back"]
pub struct Transaction<'a> {
    editor: &'a mut Editor,
    outermost: bool,
    resolved: bool,
}

impl Deref for Transaction<'_> {
    type Target = Editor;

    fn deref(&self) -> &Editor {
        self.editor
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Editor {
        self.editor
    }
}

impl Transaction<'_> {
    /// Whether this guard owns the transaction (is not nested).
    #[must_use]
    pub fn is_outermost(&self) -> bool {
        self.outermost
    }

    /// Record the edit. Nested guards only mark their part as done.
    ///
    /// The outermost commit validates the document first; an invalid result
    /// is rolled back and reported as [`CommandError::Invariant`].
    pub fn commit(mut self) -> CommandResult<()> {
        self.resolved = true;
        if !self.outermost {
            return Ok(());
        }
        let Some(capture) = self.editor.capture.take() else {
            return Err(CommandError::Invariant("transaction closed twice".to_owned()));
        };
        if capture.poisoned {
            capture.before.restore_into(self.editor);
            tracing::warn!(target: "subcue.undo", label = %capture.label, "nested edit failed, rolled back");
            return Err(CommandError::Invariant(format!(
                "a nested edit inside \"{}\" failed",
                capture.label
            )));
        }
        self.editor.selection.revalidate(&self.editor.document);
        if let Err(err) = self.editor.document.validate() {
            capture.before.restore_into(self.editor);
            tracing::error!(target: "subcue.undo", label = %capture.label, %err, "invalid edit rolled back");
            return Err(CommandError::Invariant(err.to_string()));
        }
        let after = UndoState::capture(self.editor);
        if after != capture.before {
            self.editor.undo.push(capture.label, capture.before, after);
        }
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        if self.outermost {
            if let Some(capture) = self.editor.capture.take() {
                capture.before.restore_into(self.editor);
                tracing::debug!(target: "subcue.undo", label = %capture.label, "transaction rolled back");
            }
        } else if let Some(capture) = self.editor.capture.as_mut() {
            capture.poisoned = true;
        }
    }
}

impl Editor {
    /// Open a transaction labelled `label`, or join the one already open.
    pub fn begin_capture(&mut self, label: &str) -> Transaction<'_> {
        let outermost = self.capture.is_none();
        if outermost {
            self.capture = Some(Capture {
                label: label.to_owned(),
                before: UndoState::capture(self),
                poisoned: false,
            });
        }
        Transaction {
            editor: self,
            outermost,
            resolved: false,
        }
    }

    /// Run `edit` inside a transaction; commit on `Ok`, roll back on `Err`.
    pub fn capture<R>(
        &mut self,
        label: &str,
        edit: impl FnOnce(&mut Editor) -> CommandResult<R>,
    ) -> CommandResult<R> {
        let mut tx = self.begin_capture(label);
        let out = edit(&mut tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Whether a transaction is open.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Restore the state before the newest entry. Returns its label.
    pub fn undo(&mut self) -> CommandResult<String> {
        self.ensure_idle()?;
        let entry = self.undo.pop_undo().ok_or(CommandError::NothingToUndo)?;
        entry.before.restore_into(self);
        tracing::debug!(target: "subcue.undo", label = %entry.label, "undo");
        Ok(entry.label)
    }

    /// Re-apply the newest undone entry. Returns its label.
    pub fn redo(&mut self) -> CommandResult<String> {
        self.ensure_idle()?;
        let entry = self.undo.pop_redo().ok_or(CommandError::NothingToRedo)?;
        entry.after.restore_into(self);
        tracing::debug!(target: "subcue.undo", label = %entry.label, "redo");
        Ok(entry.label)
    }

    /// Mark the current state as saved.
    pub fn mark_saved(&mut self) {
        self.undo.mark_saved();
    }

    /// Roll back a transaction whose guard was leaked. Returns its label.
    pub(crate) fn abort_capture(&mut self) -> Option<String> {
        let capture = self.capture.take()?;
        capture.before.restore_into(self);
        Some(capture.label)
    }

    fn ensure_idle(&self) -> CommandResult<()> {
        if self.capture.is_some() {
            return Err(CommandError::Invariant(
                "undo history cannot move while an edit is open".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use subcue_core::{Selection, SubtitleEvent};

    use super::*;

    fn editor() -> Editor {
        let mut ed = Editor::headless();
        ed.document.push(SubtitleEvent::new(0, 1000).with_text("a"));
        ed.selection = Selection::of_indexes(&ed.document, &[0]);
        ed
    }

    #[test]
    fn commit_records_and_undo_restores() {
        let mut ed = editor();
        let before = UndoState::capture(&ed);
        let mut tx = ed.begin_capture("insert");
        let id = tx.document.push(SubtitleEvent::new(1000, 2000));
        let doc = tx.document.clone();
        tx.selection.set(&doc, &[id]);
        tx.commit().unwrap();
        let after = UndoState::capture(&ed);
        assert_eq!(ed.undo_log().next_undo_label(), Some("insert"));

        assert_eq!(ed.undo(), Ok("insert".to_owned()));
        assert_eq!(UndoState::capture(&ed), before);
        assert_eq!(ed.redo(), Ok("insert".to_owned()));
        assert_eq!(UndoState::capture(&ed), after);
        assert_eq!(ed.redo(), Err(CommandError::NothingToRedo));
    }

    #[test]
    fn drop_without_commit_rolls_back() {
        let mut ed = editor();
        let before = UndoState::capture(&ed);
        {
            let mut tx = ed.begin_capture("oops");
            tx.document.push(SubtitleEvent::new(5, 6));
            tx.selection.clear();
        }
        assert_eq!(UndoState::capture(&ed), before);
        assert!(!ed.is_capturing());
        assert_eq!(ed.undo(), Err(CommandError::NothingToUndo));
    }

    #[test]
    fn capture_rolls_back_on_error() {
        let mut ed = editor();
        let result: CommandResult<()> = ed.capture("fail", |ed| {
            ed.document.push(SubtitleEvent::new(5, 6));
            Err(CommandError::Cancelled)
        });
        assert_eq!(result, Err(CommandError::Cancelled));
        assert_eq!(ed.document.len(), 1);
        assert!(!ed.undo_log().can_undo());
    }

    #[test]
    fn unchanged_state_pushes_nothing() {
        let mut ed = editor();
        ed.capture("noop", |_| Ok(())).unwrap();
        assert!(!ed.undo_log().can_undo());
    }

    #[test]
    fn nested_capture_joins_outer() {
        let mut ed = editor();
        let mut outer = ed.begin_capture("outer");
        outer.document.push(SubtitleEvent::new(1, 2));
        {
            let mut inner = outer.begin_capture("inner");
            assert!(!inner.is_outermost());
            inner.document.push(SubtitleEvent::new(3, 4));
            inner.commit().unwrap();
        }
        outer.commit().unwrap();
        assert_eq!(ed.undo_log().undo_depth(), 1);
        assert_eq!(ed.undo_log().next_undo_label(), Some("outer"));
        ed.undo().unwrap();
        assert_eq!(ed.document.len(), 1);
    }

    #[test]
    fn sibling_and_deep_nesting_share_one_entry() {
        let mut ed = editor();
        ed.capture("outer", |ed| {
            ed.capture("first", |ed| {
                ed.capture("deep", |ed| {
                    ed.document.push(SubtitleEvent::new(1, 2));
                    Ok(())
                })
            })?;
            ed.capture("second", |ed| {
                ed.document.push(SubtitleEvent::new(3, 4));
                Ok(())
            })
        })
        .unwrap();
        assert!(!ed.is_capturing());
        assert_eq!(ed.undo_log().undo_depth(), 1);
        assert_eq!(ed.undo(), Ok("outer".to_owned()));
        assert_eq!(ed.document.len(), 1);
    }

    #[test]
    fn failed_inner_poisons_outer() {
        let mut ed = editor();
        let mut outer = ed.begin_capture("outer");
        outer.document.push(SubtitleEvent::new(1, 2));
        let inner: CommandResult<()> = outer.capture("inner", |_| Err(CommandError::failed("x")));
        assert!(inner.is_err());
        assert!(matches!(outer.commit(), Err(CommandError::Invariant(_))));
        assert_eq!(ed.document.len(), 1);
        assert!(!ed.undo_log().can_undo());
    }

    #[test]
    fn panic_inside_capture_rolls_back() {
        let mut ed = editor();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut tx = ed.begin_capture("boom");
            tx.document.push(SubtitleEvent::new(5, 6));
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(ed.document.len(), 1);
        assert!(!ed.is_capturing());
    }

    #[test]
    fn undo_refused_while_capturing() {
        let mut ed = editor();
        ed.capture("a", |ed| {
            ed.document.push(SubtitleEvent::new(5, 6));
            Ok(())
        })
        .unwrap();
        let mut tx = ed.begin_capture("b");
        assert!(matches!(tx.undo(), Err(CommandError::Invariant(_))));
        drop(tx);
        assert!(ed.undo().is_ok());
    }

    #[test]
    fn leaked_guard_is_aborted() {
        let mut ed = editor();
        let mut tx = ed.begin_capture("leak");
        tx.document.push(SubtitleEvent::new(5, 6));
        std::mem::forget(tx);
        assert!(ed.is_capturing());
        assert_eq!(ed.abort_capture(), Some("leak".to_owned()));
        assert_eq!(ed.document.len(), 1);
        assert_eq!(ed.abort_capture(), None);
    }
}
