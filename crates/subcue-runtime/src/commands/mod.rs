#![forbid(unsafe_code)]

//! Built-in commands.
//!
//! | Module | Commands |
//! |--------|----------|
//! | [`history`] | `undo`, `redo` |
//! | [`edit`] | `sub-select`, `sub-insert`, `sub-delete`, `sub-merge`, `sub-split`, `sub-clone`, `sub-move`, `sub-sort`, `sub-set`, `sub-shift` |
//! | [`audio`] | `audio-set-sel`, `audio-shift-sel` |
//! | [`video`] | `seek`, `pause`, `play-region`, `play-sub` |
//! | [`file`] | `file-open`, `file-save`, `reload-cmds` |
//!
//! Every command that changes the document does so inside one transaction,
//! so a single `undo` reverts it.

pub mod audio;
pub mod edit;
pub mod file;
pub mod history;
pub mod video;

use std::fmt;
use std::sync::Arc;

use subcue_core::EventId;

use crate::context::Editor;
use crate::error::{CommandError, CommandResult};
use crate::invocation::{Args, CommandDescriptor, ParamKind, ParamSpec};
use crate::registry::{Command, Flow};

type RunFn = fn(&mut Editor, &Args) -> CommandResult<Flow>;
type EnabledFn = fn(&Editor, &Args) -> bool;

/// A command made of a descriptor and two plain functions.
pub struct Builtin {
    descriptor: CommandDescriptor,
    enabled: EnabledFn,
    run: RunFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.descriptor.name())
            .finish_non_exhaustive()
    }
}

impl Builtin {
    #[must_use]
    pub fn new(descriptor: CommandDescriptor, run: RunFn) -> Self {
        Self {
            descriptor,
            enabled: |_, _| true,
            run,
        }
    }

    #[must_use]
    pub fn enabled_when(mut self, enabled: EnabledFn) -> Self {
        self.enabled = enabled;
        self
    }

    fn boxed(self) -> Arc<dyn Command> {
        Arc::new(self)
    }
}

impl Command for Builtin {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    fn is_enabled(&self, editor: &Editor, args: &Args) -> bool {
        (self.enabled)(editor, args)
    }

    fn run(&self, editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
        (self.run)(editor, args)
    }
}

/// Every built-in command, in catalogue order.
#[must_use]
pub fn builtins() -> Vec<Arc<dyn Command>> {
    [
        history::commands(),
        edit::commands(),
        audio::commands(),
        video::commands(),
        file::commands(),
    ]
    .into_iter()
    .flatten()
    .map(Builtin::boxed)
    .collect()
}

// ============================================================================
// Shared parameters and predicates
// ============================================================================

const TARGET: &str = "target";
const NO_ALIGN: &str = "no-align";

/// `-t/--target`, defaulting to the selection.
fn target_param() -> ParamSpec {
    ParamSpec::option(TARGET, ParamKind::Target)
        .short('t')
        .default("selected")
        .help("Events to act on.")
}

fn no_align_param() -> ParamSpec {
    ParamSpec::flag(NO_ALIGN).help("Do not snap computed times to video frames.")
}

fn align(args: &Args) -> bool {
    !args.flag(NO_ALIGN)
}

/// Resolved `--target` ids, which must not be empty.
fn targets(args: &Args) -> CommandResult<Vec<EventId>> {
    let ids = args.targets(TARGET)?;
    if ids.is_empty() {
        return Err(CommandError::NoSelection);
    }
    Ok(ids.to_vec())
}

/// Positions of `ids`, ascending.
fn sorted_positions(editor: &Editor, ids: &[EventId]) -> Vec<usize> {
    let mut positions = editor.document.positions(ids);
    positions.sort_unstable();
    positions
}

fn target_makes_sense(editor: &Editor, args: &Args) -> bool {
    args.target(TARGET).is_none_or(|t| t.makes_sense(editor))
}

fn media_loaded(editor: &Editor, _args: &Args) -> bool {
    editor.playback().is_loaded()
}

fn require_media(editor: &Editor) -> CommandResult<()> {
    if editor.playback().is_loaded() {
        Ok(())
    } else {
        Err(CommandError::unavailable("no video loaded"))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CommandRegistry;

    #[test]
    fn builtin_names_are_unique() {
        let registry = CommandRegistry::new();
        for command in builtins() {
            registry.register(command).unwrap();
        }
        let table = registry.snapshot();
        for name in [
            "undo",
            "redo",
            "sub-select",
            "sub-insert",
            "sub-delete",
            "sub-merge",
            "sub-join",
            "sub-split",
            "sub-clone",
            "sub-duplicate",
            "sub-move",
            "sub-sort",
            "sub-set",
            "sub-shift",
            "audio-set-sel",
            "spectrogram-set-sel",
            "audio-shift-sel",
            "spectrogram-shift-sel",
            "seek",
            "pause",
            "play-region",
            "play-sub",
            "file-open",
            "file-save",
            "reload-cmds",
        ] {
            assert!(table.contains(name), "{name}");
        }
    }

    #[test]
    fn every_builtin_has_help() {
        for command in builtins() {
            let desc = command.descriptor();
            assert!(!desc.help.is_empty(), "{}", desc.name());
            assert!(desc.usage().starts_with(desc.name()), "{}", desc.usage());
        }
    }
}
