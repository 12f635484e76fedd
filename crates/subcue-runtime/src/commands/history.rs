#![forbid(unsafe_code)]

//! `undo` and `redo`.

use crate::invocation::CommandDescriptor;
use crate::registry::Flow;

use super::Builtin;

pub(super) fn commands() -> Vec<Builtin> {
    vec![
        Builtin::new(
            CommandDescriptor::new("undo").help("Reverts the last edit."),
            |editor, _| {
                editor.undo()?;
                Ok(Flow::Done)
            },
        )
        .enabled_when(|editor, _| editor.undo_log().can_undo()),
        Builtin::new(
            CommandDescriptor::new("redo").help("Re-applies the last reverted edit."),
            |editor, _| {
                editor.redo()?;
                Ok(Flow::Done)
            },
        )
        .enabled_when(|editor, _| editor.undo_log().can_redo()),
    ]
}
