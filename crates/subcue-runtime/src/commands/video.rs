#![forbid(unsafe_code)]

//! Playback commands.

use crate::bool_op::BoolOp;
use crate::context::Editor;
use crate::error::{CommandError, CommandResult};
use crate::invocation::{Args, CommandDescriptor, ParamKind, ParamSpec};
use crate::registry::Flow;

use super::{Builtin, align, media_loaded, no_align_param, require_media, sorted_positions, targets};

pub(super) fn commands() -> Vec<Builtin> {
    vec![
        Builtin::new(
            CommandDescriptor::new("seek")
                .help("Seeks to a time and pauses. Signed values are relative to the current frame.")
                .param(
                    ParamSpec::option("pts", ParamKind::Time)
                        .short('p')
                        .short('d')
                        .alias("delta")
                        .required(),
                )
                .param(ParamSpec::flag("precise").help("Seek to the exact frame, not a keyframe."))
                .param(no_align_param()),
            seek,
        )
        .enabled_when(media_loaded),
        Builtin::new(
            CommandDescriptor::new("pause")
                .help("Pauses, resumes or toggles playback.")
                .param(ParamSpec::positional("op", ParamKind::Bool).default("toggle")),
            pause,
        )
        .enabled_when(media_loaded),
        Builtin::new(
            CommandDescriptor::new("play-region")
                .help("Plays a time range, by default the audio selection.")
                .param(
                    ParamSpec::option("start", ParamKind::Time)
                        .short('s')
                        .default("a.s"),
                )
                .param(ParamSpec::option("end", ParamKind::Time).short('e').default("a.e"))
                .param(no_align_param()),
            play_region,
        )
        .enabled_when(media_loaded),
        Builtin::new(
            CommandDescriptor::new("play-sub")
                .help("Plays from the first target's start to the last target's end.")
                .param(super::target_param()),
            play_sub,
        )
        .enabled_when(|editor, args| media_loaded(editor, args) && super::target_makes_sense(editor, args)),
    ]
}

fn seek(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    require_media(editor)?;
    let expr = args
        .time("pts")
        .ok_or_else(|| CommandError::Invariant("required parameter pts is missing".to_owned()))?;
    let origin = editor.playback().current_pts();
    let pts = expr
        .eval(editor, Some(origin), align(args))?
        .clamp(0, editor.playback().max_pts());
    let precise = args.flag("precise");
    let playback = editor.playback_mut();
    playback.seek(pts, precise);
    playback.set_paused(true);
    tracing::debug!(target: "subcue.engine", pts, precise, "seek");
    Ok(Flow::Done)
}

fn pause(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    require_media(editor)?;
    let op = args.bool_op("op").unwrap_or(BoolOp::Toggle);
    let playback = editor.playback_mut();
    let paused = op.apply(playback.is_paused());
    playback.set_paused(paused);
    Ok(Flow::Done)
}

fn play_region(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    require_media(editor)?;
    let align = align(args);
    let mut bound = |name: &str| match args.time(name) {
        Some(expr) => expr.eval(editor, None, align),
        None => Err(CommandError::Invariant(format!("required parameter {name} is missing"))),
    };
    let start = bound("start")?;
    let end = bound("end")?;
    if end <= start {
        return Err(CommandError::unavailable("the region is empty"));
    }
    editor.playback_mut().play(start, end);
    Ok(Flow::Done)
}

fn play_sub(editor: &mut Editor, args: &Args) -> CommandResult<Flow> {
    require_media(editor)?;
    let ids = targets(args)?;
    let positions = sorted_positions(editor, &ids);
    let doc = &editor.document;
    let (Some(first), Some(last)) = (
        positions.first().and_then(|&i| doc.get(i)),
        positions.last().and_then(|&i| doc.get(i)),
    ) else {
        return Err(CommandError::NoSelection);
    };
    let (start, end) = (first.start, last.end);
    editor.playback_mut().play(start, end);
    Ok(Flow::Done)
}
