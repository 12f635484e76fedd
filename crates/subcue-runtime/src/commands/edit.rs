#![forbid(unsafe_code)]

//! Subtitle editing commands.
//!
//! Each body resolves what it needs first, then opens one transaction for
//! all of its changes. Errors raised after the transaction is open roll it
//! back when the guard drops.

use subcue_core::{DocumentError, EventId, SubtitleEvent, format_ms};

use crate::context::Editor;
use crate::error::{CommandError, CommandResult};
use crate::invocation::{Args, CommandDescriptor, ParamKind, ParamSpec};
use crate::registry::Flow;

use super::{
    Builtin, TARGET, align, no_align_param, sorted_positions, target_makes_sense,
    target_param, targets,
};

const ORIGIN: &str = "origin";
const POSITION: &str = "position";
const DIRECTION: &str = "direction";
const EDGE: &str = "edge";

pub(super) fn commands() -> Vec<Builtin> {
    vec![
        Builtin::new(
            CommandDescriptor::new("sub-select")
                .help("Replaces the selection with the given subtitles.")
                .param(ParamSpec::positional(TARGET, ParamKind::Target).required()),
            select,
        ),
        Builtin::new(
            CommandDescriptor::new("sub-insert")
                .help("Inserts an empty subtitle next to the origin and selects it.")
                .param(
                    ParamSpec::option(ORIGIN, ParamKind::Target)
                        .short('o')
                        .default("selected"),
                )
                .param(ParamSpec::selector(POSITION, &["before", "after"]).required())
                .param(no_align_param()),
            insert,
        )
        .enabled_when(|editor, args| {
            editor.document.is_empty()
                || args.target(ORIGIN).is_none_or(|t| t.makes_sense(editor))
        }),
        Builtin::new(
            CommandDescriptor::new("sub-delete")
                .help("Deletes subtitles.")
                .param(target_param()),
            delete,
        )
        .enabled_when(target_makes_sense),
        Builtin::new(
            CommandDescriptor::new("sub-merge")
                .alias("sub-join")
                .help("Merges subtitles into the first one; a single subtitle merges with the next.")
                .param(target_param())
                .param(ParamSpec::flag("concat").alias("concatenate"))
                .param(ParamSpec::option("separator", ParamKind::Text)),
            merge,
        )
        .enabled_when(target_makes_sense),
        Builtin::new(
            CommandDescriptor::new("sub-split")
                .help("Splits subtitles in two at a position.")
                .param(target_param())
                .param(
                    ParamSpec::option(POSITION, ParamKind::Time)
                        .short('p')
                        .required(),
                )
                .param(no_align_param()),
            split,
        )
        .enabled_when(target_makes_sense),
        Builtin::new(
            CommandDescriptor::new("sub-clone")
                .alias("sub-duplicate")
                .help("Inserts copies of subtitles after the last one and selects them.")
                .param(target_param()),
            clone,
        )
        .enabled_when(target_makes_sense),
        Builtin::new(
            CommandDescriptor::new("sub-move")
                .help("Moves a contiguous block of subtitles up, down or to a given line.")
                .param(target_param())
                .param(ParamSpec::selector(DIRECTION, &["above", "below", "gui"]).required()),
            move_block,
        )
        .enabled_when(target_makes_sense),
        Builtin::new(
            CommandDescriptor::new("sub-sort")
                .help("Sorts subtitles by start time.")
                .param(
                    ParamSpec::option(TARGET, ParamKind::Target)
                        .short('t')
                        .default("all"),
                ),
            sort,
        )
        .enabled_when(target_makes_sense),
        Builtin::new(
            CommandDescriptor::new("sub-set")
                .help("Sets subtitle fields. Text values may use {text}, {note}, {actor} and {style}.")
                .param(target_param())
                .param(ParamSpec::option("text", ParamKind::Text))
                .param(ParamSpec::option("note", ParamKind::Text))
                .param(ParamSpec::option("actor", ParamKind::Text))
                .param(ParamSpec::option("style", ParamKind::Text))
                .param(ParamSpec::selector("comment", &["comment", "no-comment"]))
                .param(ParamSpec::option("layer", ParamKind::Int))
                .param(ParamSpec::option("start", ParamKind::Time).short('s'))
                .param(ParamSpec::option("end", ParamKind::Time).short('e'))
                .param(no_align_param()),
            set,
        )
        .enabled_when(target_makes_sense),
        Builtin::new(
            CommandDescriptor::new("sub-shift")
                .help("Shifts subtitle times by a delta.")
                .param(target_param())
                .param(ParamSpec::option("delta", ParamKind::Time).short('d').required())
                .param(ParamSpec::selector(EDGE, &["start-only", "end-only"]))
                .param(no_align_param()),
            shift,
        )
        .enabled_when(target_makes_sense),
    ]
}

/// Select `ids` in the editor's document.
fn select_ids(editor: &mut Editor, ids: &[EventId]) {
    editor.selection.set(&editor.document, ids);
}

fn required_time<'a>(args: &'a Args, name: &str) -> CommandResult<&'a crate::pts::PtsExpr> {
    args.time(name)
        .ok_or_else(|| CommandError::Invariant(format!("required parameter {name} is missing")))
}

// ============================================================================
// Bodies
// ============================================================================

fn select(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let ids = args.targets(TARGET)?.to_vec();
    select_ids(editor, &ids);
    Ok(Flow::Done)
}

fn insert(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let after = args.choice(POSITION) == Some("after");
    let duration = editor.options.subs.default_duration;
    let (index, start, end) = if editor.document.is_empty() {
        (0, 0, duration)
    } else {
        let positions = sorted_positions(editor, args.targets(ORIGIN)?);
        let (Some(&first), Some(&last)) = (positions.first(), positions.last()) else {
            return Err(CommandError::NoSelection);
        };
        let doc = &editor.document;
        if after {
            let start = doc.get(last).map_or(0, |ev| ev.end);
            let mut end = start + duration;
            if let Some(next) = doc.get(last + 1)
                && next.start > start
            {
                end = end.min(next.start);
            }
            (last + 1, start, end)
        } else {
            let end = doc.get(first).map_or(0, |ev| ev.start);
            let mut start = (end - duration).max(0);
            if let Some(prev) = first.checked_sub(1).and_then(|i| doc.get(i))
                && prev.end < end
            {
                start = start.max(prev.end);
            }
            (first, start, end)
        }
    };
    let start = editor.maybe_align(start, align(args));
    let end = editor.maybe_align(end, align(args)).max(start);

    let mut tx = editor.begin_capture("insert subtitle");
    let id = tx.document.insert(index, SubtitleEvent::new(start, end))?;
    select_ids(&mut tx, &[id]);
    tx.commit()?;
    Ok(Flow::Done)
}

fn delete(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let ids = targets(args)?;
    let mut tx = editor.begin_capture("delete subtitles");
    tx.document.remove_ids(&ids);
    tx.commit()?;
    Ok(Flow::Done)
}

fn merge(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let ids = targets(args)?;
    let mut positions = sorted_positions(editor, &ids);
    if let [only] = positions[..] {
        if only + 1 >= editor.document.len() {
            return Err(CommandError::unavailable("there is no subtitle to merge with"));
        }
        positions.push(only + 1);
    }
    let events = positions
        .iter()
        .filter_map(|&i| editor.document.get(i).cloned())
        .collect::<Vec<_>>();
    let Some((first, rest)) = events.split_first() else {
        return Err(CommandError::NoSelection);
    };
    let first_id = first
        .id()
        .ok_or_else(|| CommandError::Invariant("merged subtitle has no id".to_owned()))?;
    let end = events.iter().map(|ev| ev.end).max().unwrap_or(first.end);
    let (text, note) = if args.flag("concat") {
        let separator = args
            .text("separator")
            .map_or_else(|| editor.options.subs.merge_separator.clone(), str::to_owned);
        let text = events
            .iter()
            .map(|ev| ev.text.as_str())
            .collect::<Vec<_>>()
            .join(&separator);
        let note = events
            .iter()
            .map(|ev| ev.note.as_str())
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join(&separator);
        (text, note)
    } else {
        (first.text.clone(), first.note.clone())
    };
    let others = rest.iter().filter_map(SubtitleEvent::id).collect::<Vec<_>>();

    let mut tx = editor.begin_capture("merge subtitles");
    tx.document.update_by_id(first_id, |ev| {
        ev.end = end;
        ev.text = text;
        ev.note = note;
    })?;
    tx.document.remove_ids(&others);
    select_ids(&mut tx, &[first_id]);
    tx.commit()?;
    Ok(Flow::Done)
}

fn split(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let ids = targets(args)?;
    let expr = required_time(args, POSITION)?;
    let align = align(args);

    let mut tx = editor.begin_capture("split subtitles");
    let mut halves = Vec::new();
    for id in ids {
        let ed: &mut Editor = &mut tx;
        let Some(event) = ed.document.by_id(id).cloned() else {
            continue;
        };
        let at = expr.eval(ed, Some(event.start), align)?;
        if at <= event.start || at >= event.end {
            return Err(CommandError::failed(format!(
                "{} is outside the subtitle {}-{}",
                format_ms(at),
                format_ms(event.start),
                format_ms(event.end)
            )));
        }
        ed.document.update_by_id(id, |ev| ev.end = at)?;
        let index = ed
            .document
            .position(id)
            .ok_or(DocumentError::UnknownId(id))?;
        let mut second = event.detached();
        second.start = at;
        let second_id = ed.document.insert(index + 1, second)?;
        halves = vec![id, second_id];
    }
    select_ids(&mut tx, &halves);
    tx.commit()?;
    Ok(Flow::Done)
}

fn clone(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let ids = targets(args)?;
    let positions = sorted_positions(editor, &ids);
    let Some(&last) = positions.last() else {
        return Err(CommandError::NoSelection);
    };
    let copies = positions
        .iter()
        .filter_map(|&i| editor.document.get(i).map(SubtitleEvent::detached))
        .collect::<Vec<_>>();

    let mut tx = editor.begin_capture("duplicate subtitles");
    let new_ids = tx.document.insert_many(last + 1, copies)?;
    select_ids(&mut tx, &new_ids);
    tx.commit()?;
    Ok(Flow::Done)
}

fn move_block(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let ids = targets(args)?;
    let positions = sorted_positions(editor, &ids);
    let (Some(&first), Some(&last)) = (positions.first(), positions.last()) else {
        return Err(CommandError::NoSelection);
    };
    if last - first + 1 != positions.len() {
        return Err(CommandError::unavailable(
            "only a contiguous block of subtitles can be moved",
        ));
    }
    let len = editor.document.len();
    let dest = match args.choice(DIRECTION) {
        Some("above") if first == 0 => return Ok(Flow::Done),
        Some("above") => first - 1,
        Some("below") if last + 1 >= len => return Ok(Flow::Done),
        Some("below") => first + 1,
        _ => {
            let max = (len - positions.len() + 1) as i64;
            let line = editor
                .prompt()
                .ask_number("Move to line", 1, max)
                .ok_or(CommandError::Cancelled)?;
            if !(1..=max).contains(&line) {
                return Err(CommandError::unavailable(format!("there is no line {line}")));
            }
            (line - 1) as usize
        }
    };
    if dest == first {
        return Ok(Flow::Done);
    }
    let mut tx = editor.begin_capture("move subtitles");
    tx.document.move_range(first..last + 1, dest)?;
    tx.commit()?;
    Ok(Flow::Done)
}

fn sort(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let ids = targets(args)?;
    let positions = sorted_positions(editor, &ids);
    let mut tx = editor.begin_capture("sort subtitles");
    tx.document.sort_by_start_at(&positions)?;
    tx.commit()?;
    Ok(Flow::Done)
}

fn set(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let ids = targets(args)?;
    let align = align(args);
    let layer = args
        .int("layer")
        .map(|n| i32::try_from(n).map_err(|_| CommandError::failed(format!("layer {n} is out of range"))))
        .transpose()?;

    let mut tx = editor.begin_capture("set subtitle fields");
    let index = tx.document.id_index();
    for id in ids {
        let ed: &mut Editor = &mut tx;
        let Some((at, old)) = index
            .get(&id)
            .and_then(|&i| Some((i, ed.document.get(i)?.clone())))
        else {
            continue;
        };
        let mut new = old.clone();
        if let Some(t) = args.text("text") {
            new.text = expand(t, &old);
        }
        if let Some(t) = args.text("note") {
            new.note = expand(t, &old);
        }
        if let Some(t) = args.text("actor") {
            new.actor = expand(t, &old);
        }
        if let Some(t) = args.text("style") {
            new.style = expand(t, &old);
        }
        match args.choice("comment") {
            Some("comment") => new.is_comment = true,
            Some("no-comment") => new.is_comment = false,
            _ => {}
        }
        if let Some(layer) = layer {
            new.layer = layer;
        }
        if let Some(expr) = args.time("start") {
            new.start = expr.eval(ed, Some(old.start), align)?;
        }
        if let Some(expr) = args.time("end") {
            new.end = expr.eval(ed, Some(old.end), align)?;
        }
        ed.document.update(at, |ev| *ev = new)?;
    }
    tx.commit()?;
    Ok(Flow::Done)
}

/// Replace `{text}`, `{note}`, `{actor}` and `{style}` with the event's
/// current values in one pass.
fn expand(template: &str, event: &SubtitleEvent) -> String {
    let fields = [
        ("{text}", event.text.as_str()),
        ("{note}", event.note.as_str()),
        ("{actor}", event.actor.as_str()),
        ("{style}", event.style.as_str()),
    ];
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match fields.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn shift(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    let ids = targets(args)?;
    let expr = required_time(args, "delta")?;
    let offset = expr.as_offset();
    let align = align(args);
    let edge = args.choice(EDGE);

    let mut tx = editor.begin_capture("shift subtitles");
    // Prompted deltas are asked once and reused for every event.
    let mut asked: Option<i64> = None;
    let index = tx.document.id_index();
    for id in ids {
        let ed: &mut Editor = &mut tx;
        let Some((at, ev)) = index
            .get(&id)
            .and_then(|&i| Some((i, ed.document.get(i)?.clone())))
        else {
            continue;
        };
        let origin = if edge == Some("end-only") { ev.end } else { ev.start };
        let delta = match asked {
            Some(delta) => delta,
            None => {
                let delta = offset.eval(ed, Some(origin), align)? - origin;
                if expr.is_interactive() {
                    asked = Some(delta);
                }
                delta
            }
        };
        let (start, end) = match edge {
            Some("start-only") => ((ev.start + delta).min(ev.end), ev.end),
            Some("end-only") => (ev.start, (ev.end + delta).max(ev.start)),
            _ => (ev.start + delta, ed.maybe_align(ev.end + delta, align)),
        };
        ed.document.update(at, |e| {
            e.start = start;
            e.end = end;
        })?;
    }
    tx.commit()?;
    Ok(Flow::Done)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::context::PromptTime;
    use crate::error::Outcome;
    use crate::testing::{FakePlayback, ScriptedPrompt};
    use crate::undo::UndoState;

    fn times(ed: &Editor) -> Vec<(i64, i64)> {
        ed.document.events().map(|e| (e.start, e.end)).collect()
    }

    /// Runs `cmdline`, then checks that undo and redo reproduce the exact
    /// before and after states.
    fn run_undoable(engine: &mut crate::engine::Engine, ed: &mut Editor, cmdline: &str) {
        let before = UndoState::capture(ed);
        assert_eq!(run(engine, ed, cmdline), Outcome::Completed, "{cmdline}");
        let after = UndoState::capture(ed);
        assert_ne!(before, after, "{cmdline} changed nothing");
        ed.undo().unwrap();
        assert_eq!(UndoState::capture(ed), before, "{cmdline}");
        ed.redo().unwrap();
        assert_eq!(UndoState::capture(ed), after, "{cmdline}");
    }

    #[test]
    fn select_replaces_selection() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b", "c"]);
        assert!(run(&mut engine, &mut ed, "sub-select 1,3").is_completed());
        assert_eq!(selected(&ed), [0, 2]);
        assert!(run(&mut engine, &mut ed, "sub-select none").is_completed());
        assert!(ed.selection.is_empty());
        assert!(!ed.undo_log().can_undo());
        assert!(run(&mut engine, &mut ed, "sub-select").is_failed());
    }

    #[test]
    fn insert_after_and_before() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b"]);
        ed.document.update(1, |ev| ev.start = 1500).unwrap();
        select_rows(&mut ed, &[0]);
        run_undoable(&mut engine, &mut ed, "sub-insert --after");
        assert_eq!(times(&ed), [(0, 1000), (1000, 1500), (1500, 2000)]);
        assert_eq!(selected(&ed), [1]);

        let mut ed = editor(&["a", "b"]);
        ed.document
            .update(1, |ev| {
                ev.start = 5000;
                ev.end = 6000;
            })
            .unwrap();
        select_rows(&mut ed, &[1]);
        run_undoable(&mut engine, &mut ed, "sub-insert --before");
        assert_eq!(times(&ed)[1], (3000, 5000));
        assert_eq!(selected(&ed), [1]);
    }

    #[test]
    fn insert_into_empty_document() {
        let mut engine = engine();
        let mut ed = editor(&[]);
        assert!(run(&mut engine, &mut ed, "sub-insert --before").is_completed());
        assert_eq!(times(&ed), [(0, 2000)]);
        assert_eq!(selected(&ed), [0]);
    }

    #[test]
    fn insert_requires_a_side_and_an_origin() {
        let mut engine = engine();
        let mut ed = editor(&["a"]);
        assert!(run(&mut engine, &mut ed, "sub-insert").is_failed());
        assert!(run(&mut engine, &mut ed, "sub-insert --before --after").is_failed());
        assert_eq!(run(&mut engine, &mut ed, "sub-insert --after"), Outcome::Disabled);
        assert!(run(&mut engine, &mut ed, "sub-insert -o 1 --after").is_completed());
    }

    #[test]
    fn insert_snaps_to_frames_unless_told_not_to() {
        let mut engine = engine();
        let mut ed = editor(&["a"]).with_playback(Box::new(FakePlayback::at_fps(25.0, 1000)));
        ed.document.update(0, |ev| ev.end = 1015).unwrap();
        select_rows(&mut ed, &[0]);
        assert!(run(&mut engine, &mut ed, "sub-insert --after").is_completed());
        assert_eq!(times(&ed)[1], (1000, 3000));
        select_rows(&mut ed, &[0]);
        assert!(run(&mut engine, &mut ed, "sub-insert --after --no-align").is_completed());
        assert_eq!(times(&ed)[1], (1015, 3015));
    }

    #[test]
    fn delete_keeps_survivors_selected() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b", "c"]);
        select_rows(&mut ed, &[0, 2]);
        run_undoable(&mut engine, &mut ed, "sub-delete -t 1");
        assert_eq!(texts(&ed), ["b", "c"]);
        assert_eq!(selected(&ed), [1]);
    }

    #[test]
    fn merge_concat_and_plain() {
        let mut engine = engine();
        let mut ed = editor(&["foo", "bar", "baz"]);
        ed.document.update(1, |ev| ev.note = "n".into()).unwrap();
        select_rows(&mut ed, &[0, 1]);
        run_undoable(&mut engine, &mut ed, "sub-merge --concat");
        assert_eq!(texts(&ed), ["foo\\Nbar", "baz"]);
        assert_eq!(ed.document.get(0).map(|e| (e.end, e.note.as_str())), Some((2000, "n")));
        assert_eq!(selected(&ed), [0]);

        select_rows(&mut ed, &[0]);
        run_undoable(&mut engine, &mut ed, "sub-join --concatenate --separator ' / '");
        assert_eq!(texts(&ed), ["foo\\Nbar / baz"]);

        let mut ed = editor(&["x", "y"]);
        select_rows(&mut ed, &[0, 1]);
        run_undoable(&mut engine, &mut ed, "sub-merge");
        assert_eq!(texts(&ed), ["x"]);
        assert_eq!(times(&ed), [(0, 2000)]);
    }

    #[test]
    fn merge_last_line_alone_is_unavailable() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b"]);
        select_rows(&mut ed, &[1]);
        assert!(matches!(run(&mut engine, &mut ed, "sub-merge"), Outcome::Unavailable(_)));
        assert_eq!(texts(&ed), ["a", "b"]);
    }

    #[test]
    fn split_at_position() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b"]);
        select_rows(&mut ed, &[0, 1]);
        run_undoable(&mut engine, &mut ed, "sub-split -p +400ms");
        assert_eq!(times(&ed), [(0, 400), (400, 1000), (1000, 1400), (1400, 2000)]);
        assert_eq!(texts(&ed), ["a", "a", "b", "b"]);
        assert_eq!(selected(&ed), [2, 3]);
    }

    #[test]
    fn split_outside_rolls_back() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b"]);
        select_rows(&mut ed, &[0, 1]);
        assert!(run(&mut engine, &mut ed, "sub-split -p 1500ms").is_failed());
        assert_eq!(times(&ed), [(0, 1000), (1000, 2000)]);
        assert!(!ed.undo_log().can_undo());
    }

    #[test]
    fn clone_inserts_after_last_target() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b", "c"]);
        select_rows(&mut ed, &[0, 1]);
        run_undoable(&mut engine, &mut ed, "sub-duplicate");
        assert_eq!(texts(&ed), ["a", "b", "a", "b", "c"]);
        assert_eq!(selected(&ed), [2, 3]);
    }

    #[test]
    fn move_up_down_and_to_line() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b", "c", "d"])
            .with_prompt(Box::new(ScriptedPrompt::new().number(1).cancel_number()));
        select_rows(&mut ed, &[1, 2]);
        run_undoable(&mut engine, &mut ed, "sub-move --above");
        assert_eq!(texts(&ed), ["b", "c", "a", "d"]);
        assert_eq!(run(&mut engine, &mut ed, "sub-move --above"), Outcome::Completed);
        assert_eq!(texts(&ed), ["b", "c", "a", "d"]);
        run_undoable(&mut engine, &mut ed, "sub-move --below");
        assert_eq!(texts(&ed), ["a", "b", "c", "d"]);
        select_rows(&mut ed, &[3]);
        run_undoable(&mut engine, &mut ed, "sub-move --gui");
        assert_eq!(texts(&ed), ["d", "a", "b", "c"]);
        assert_eq!(run(&mut engine, &mut ed, "sub-move --gui"), Outcome::Cancelled);
        select_rows(&mut ed, &[0, 2]);
        assert!(matches!(run(&mut engine, &mut ed, "sub-move --below"), Outcome::Unavailable(_)));
    }

    #[test]
    fn sort_by_start() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b", "c"]);
        ed.document.update(0, |ev| ev.start = 2500).unwrap();
        run_undoable(&mut engine, &mut ed, "sub-sort");
        assert_eq!(texts(&ed), ["b", "c", "a"]);
    }

    #[test]
    fn set_fields_with_placeholders_and_times() {
        let mut engine = engine();
        let mut ed = editor(&["hello", "world"]);
        ed.document.update(0, |ev| ev.actor = "Bob".into()).unwrap();
        select_rows(&mut ed, &[0]);
        run_undoable(
            &mut engine,
            &mut ed,
            "sub-set --text '{actor}: {text} {unknown}' --comment --layer 2 -s +100ms -e 5s",
        );
        let ev = ed.document.get(0).unwrap();
        assert_eq!(ev.text, "Bob: hello {unknown}");
        assert!(ev.is_comment);
        assert_eq!(ev.layer, 2);
        assert_eq!((ev.start, ev.end), (100, 5000));
        assert_eq!(ed.document.get(1).map(|e| e.text.as_str()), Some("world"));

        run_undoable(&mut engine, &mut ed, "sub-set -t all --text \"\" --no-comment");
        assert_eq!(texts(&ed), ["", ""]);
        assert!(ed.document.events().all(|e| !e.is_comment));
    }

    #[test]
    fn shift_both_edges_or_one() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b"]);
        select_rows(&mut ed, &[0, 1]);
        run_undoable(&mut engine, &mut ed, "sub-shift -d 500ms");
        assert_eq!(times(&ed), [(500, 1500), (1500, 2500)]);
        run_undoable(&mut engine, &mut ed, "sub-shift -d -200ms --start-only");
        assert_eq!(times(&ed), [(300, 1500), (1300, 2500)]);
        run_undoable(&mut engine, &mut ed, "sub-shift -t 2 -d +1s --end-only");
        assert_eq!(times(&ed), [(300, 1500), (1300, 3500)]);
    }

    #[test]
    fn shift_and_set_scale_to_large_documents() {
        let mut engine = engine();
        let rows = vec!["x"; 5000];
        let mut ed = editor(&rows);
        select_rows(&mut ed, &[4999, 0]);
        assert!(run(&mut engine, &mut ed, "sub-shift -t all -d 250ms").is_completed());
        assert_eq!(times(&ed)[0], (250, 1250));
        assert_eq!(times(&ed)[4999], (4_999_250, 5_000_250));
        assert!(run(&mut engine, &mut ed, "sub-set -t all --text '{text}!'").is_completed());
        assert!(ed.document.events().all(|e| e.text == "x!"));
        assert_eq!(selected(&ed), [0, 4999]);
        ed.document.validate().unwrap();
    }

    #[test]
    fn shift_in_frames_and_by_prompt() {
        let mut engine = engine();
        let mut ed = editor(&["a", "b"])
            .with_playback(Box::new(FakePlayback::at_fps(25.0, 1000)))
            .with_prompt(Box::new(ScriptedPrompt::new().time(PromptTime::Relative(80))));
        select_rows(&mut ed, &[0]);
        run_undoable(&mut engine, &mut ed, "sub-shift -d 10f");
        assert_eq!(times(&ed)[0], (400, 1400));
        select_rows(&mut ed, &[0, 1]);
        run_undoable(&mut engine, &mut ed, "sub-shift -d ask");
        assert_eq!(times(&ed), [(480, 1480), (1080, 2080)]);
    }

    #[test]
    fn empty_target_is_disabled() {
        let mut engine = engine();
        let mut ed = editor(&["a"]);
        for cmd in ["sub-delete", "sub-merge", "sub-clone", "sub-move --above", "sub-shift -d 1s"] {
            assert_eq!(run(&mut engine, &mut ed, cmd), Outcome::Disabled, "{cmd}");
        }
    }

    #[test]
    fn expand_is_single_pass() {
        let ev = SubtitleEvent::new(0, 1).with_text("{note}").with_note("n");
        assert_eq!(expand("<{text}|{note}>{", &ev), "<{note}|n>{");
    }
}
