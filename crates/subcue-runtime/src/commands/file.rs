#![forbid(unsafe_code)]

//! File commands. Loading and saving run on the worker pool; the document
//! swap and the saved mark happen in the continuation.

use std::path::PathBuf;

use subcue_core::Document;

use crate::context::Editor;
use crate::error::CommandResult;
use crate::invocation::{Args, CommandDescriptor, ParamKind, ParamSpec};
use crate::registry::Flow;
use crate::target::PathArg;
use crate::worker::BackgroundTask;

use super::Builtin;

pub(super) fn commands() -> Vec<Builtin> {
    vec![
        Builtin::new(
            CommandDescriptor::new("file-open")
                .help("Loads a subtitle file, replacing the document.")
                .param(ParamSpec::option("path", ParamKind::Path).default("ask"))
                .asynchronous(),
            open,
        ),
        Builtin::new(
            CommandDescriptor::new("file-save")
                .help("Saves the document, by default to the file it came from.")
                .param(ParamSpec::option("path", ParamKind::Path))
                .asynchronous(),
            save,
        ),
        Builtin::new(
            CommandDescriptor::new("reload-cmds")
                .help("Rescans command sources and rebuilds the registry."),
            |_, _| Ok(Flow::ReloadRegistry),
        ),
    ]
}

fn open(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let path = args
        .path("path")
        .unwrap_or(&PathArg::Ask)
        .resolve_open(editor)?;
    let persistence = editor.persistence();
    let source = path.clone();
    Ok(Flow::Background(BackgroundTask::new(
        "open",
        move |token| {
            token.check()?;
            let document = persistence.load(&source)?;
            token.check()?;
            Ok(document)
        },
        move |editor: &mut Editor, document: Document| {
            let count = document.len();
            editor.replace_document(document, Some(path.clone()));
            editor
                .log()
                .info(format!("opened {} ({count} subtitles)", path.display()));
            Ok(())
        },
    )))
}

fn save(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let arg = match (args.path("path"), &editor.path) {
        (Some(arg), _) => arg.clone(),
        (None, Some(current)) => PathArg::Path(current.clone()),
        (None, None) => PathArg::Ask,
    };
    let path: PathBuf = arg.resolve_save(editor)?;
    let persistence = editor.persistence();
    let document = editor.document.clone();
    let revision = editor.undo.revision();
    let target = path.clone();
    Ok(Flow::Background(BackgroundTask::new(
        "save",
        move |token| {
            token.check()?;
            persistence.save(&document, &target)?;
            Ok(())
        },
        move |editor: &mut Editor, ()| {
            editor.undo.mark_saved_at(revision);
            editor.log().info(format!("saved {}", path.display()));
            editor.path = Some(path);
            Ok(())
        },
    )))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::test_support::*;
    use crate::context::{Editor, JsonPersistence, Persistence};
    use crate::error::Outcome;
    use crate::testing::ScriptedPrompt;
    use subcue_core::SubtitleEvent;

    fn finish(engine: &mut crate::engine::Engine, ed: &mut Editor, outcome: Outcome) -> Vec<Outcome> {
        assert!(matches!(outcome, Outcome::Pending(_)), "{outcome:?}");
        engine
            .drain_blocking(ed, Duration::from_secs(10))
            .into_iter()
            .map(|(_, outcome)| outcome)
            .collect()
    }

    #[test]
    fn save_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("subs.json");
        let mut engine = engine();
        let mut ed = editor(&["one", "two"]);
        ed.capture("touch", |ed| {
            ed.document.push(SubtitleEvent::new(5000, 6000).with_text("three"));
            Ok(())
        })
        .unwrap();
        assert!(ed.undo_log().needs_save());

        let cmd = format!("file-save --path '{}'", file.display());
        let outcome = run(&mut engine, &mut ed, &cmd);
        assert_eq!(finish(&mut engine, &mut ed, outcome), [Outcome::Completed]);
        assert!(!ed.undo_log().needs_save());
        assert_eq!(ed.path.as_deref(), Some(file.as_path()));

        let mut fresh = editor(&[]);
        let cmd = format!("file-open --path '{}'", file.display());
        let outcome = run(&mut engine, &mut fresh, &cmd);
        assert_eq!(finish(&mut engine, &mut fresh, outcome), [Outcome::Completed]);
        assert_eq!(texts(&fresh), ["one", "two", "three"]);
        assert!(!fresh.undo_log().can_undo());
        assert_eq!(fresh.path.as_deref(), Some(file.as_path()));
    }

    #[test]
    fn edits_during_save_stay_unsaved() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("subs.json");
        let mut engine = engine();
        let mut ed = editor(&["a"]);
        ed.path = Some(file.clone());
        ed.capture("first", |ed| {
            ed.document.push(SubtitleEvent::new(1, 2));
            Ok(())
        })
        .unwrap();
        let pending = run(&mut engine, &mut ed, "file-save");
        ed.capture("second", |ed| {
            ed.document.push(SubtitleEvent::new(3, 4));
            Ok(())
        })
        .unwrap();
        assert_eq!(finish(&mut engine, &mut ed, pending), [Outcome::Completed]);
        assert!(ed.undo_log().needs_save());
        assert_eq!(JsonPersistence.load(&file).unwrap().len(), 2);
    }

    #[test]
    fn open_asks_and_honours_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("subs.json");
        JsonPersistence
            .save(&editor(&["x"]).document, &file)
            .unwrap();
        let mut engine = engine();
        let mut ed = editor(&[]).with_prompt(Box::new(ScriptedPrompt::new().cancel_path().path(file.clone())));
        assert_eq!(run(&mut engine, &mut ed, "file-open"), Outcome::Cancelled);
        let outcome = run(&mut engine, &mut ed, "file-open");
        assert_eq!(finish(&mut engine, &mut ed, outcome), [Outcome::Completed]);
        assert_eq!(texts(&ed), ["x"]);
    }

    #[test]
    fn open_missing_file_is_unavailable() {
        let mut engine = engine();
        let mut ed = editor(&["keep"]);
        let outcome = run(&mut engine, &mut ed, "file-open --path /nonexistent/subs.json");
        assert!(matches!(outcome, Outcome::Unavailable(_)), "{outcome:?}");
        assert_eq!(texts(&ed), ["keep"]);
    }

    #[test]
    fn broken_file_fails_in_the_worker() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.json");
        std::fs::write(&file, "{ not json").unwrap();
        let mut engine = engine();
        let mut ed = editor(&["keep"]);
        let outcome = run(&mut engine, &mut ed, &format!("file-open --path '{}'", file.display()));
        let done = finish(&mut engine, &mut ed, outcome);
        assert!(done[0].is_failed(), "{done:?}");
        assert_eq!(texts(&ed), ["keep"]);
    }
}
