#![forbid(unsafe_code)]

use subcue_core::{Document, Selection};

use crate::context::Editor;

/// Snapshot of everything undo restores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoState {
    pub document: Document,
    pub selection: Selection,
}

impl UndoState {
    #[must_use]
    pub fn capture(editor: &Editor) -> Self {
        Self {
            document: editor.document.clone(),
            selection: editor.selection.clone(),
        }
    }

    /// Put this state back into `editor`. Event ids survive, so the
    /// selection is restored verbatim and then restamped.
    pub fn restore_into(&self, editor: &mut Editor) {
        editor.document.restore(&self.document);
        editor.selection = self.selection.clone();
        editor.selection.revalidate(&editor.document);
    }
}
