#![forbid(unsafe_code)]

//! Audio selection commands. The audio view is not part of the undo state.

use crate::context::Editor;
use crate::error::CommandResult;
use crate::invocation::{Args, CommandDescriptor, ParamKind, ParamSpec};
use crate::pts::PtsExpr;
use crate::registry::Flow;

use super::{Builtin, align, media_loaded, no_align_param, require_media};

pub(super) fn commands() -> Vec<Builtin> {
    vec![
        Builtin::new(
            CommandDescriptor::new("audio-set-sel")
                .alias("spectrogram-set-sel")
                .help("Sets the audio selection. Signed values are relative to the current bounds.")
                .param(ParamSpec::option("start", ParamKind::Time).short('s'))
                .param(ParamSpec::option("end", ParamKind::Time).short('e'))
                .param(no_align_param()),
            |editor, args| move_selection(editor, args, false),
        )
        .enabled_when(media_loaded),
        Builtin::new(
            CommandDescriptor::new("audio-shift-sel")
                .alias("spectrogram-shift-sel")
                .help("Shifts the audio selection bounds by the given amounts.")
                .param(ParamSpec::option("start", ParamKind::Time).short('s'))
                .param(ParamSpec::option("end", ParamKind::Time).short('e'))
                .param(no_align_param()),
            |editor, args| move_selection(editor, args, true),
        )
        .enabled_when(media_loaded),
    ]
}

fn move_selection(editor: &mut Editor, args: &Args, offset: bool) -> CommandResult<Flow> {
    require_media(editor)?;
    let align = align(args);
    let bound = |editor: &mut Editor, expr: Option<&PtsExpr>, current: i64| match expr {
        None => Ok(current),
        Some(expr) if offset => expr.as_offset().eval(editor, Some(current), align),
        Some(expr) => expr.eval(editor, Some(current), align),
    };
    let (start, end) = (editor.audio.selection_start, editor.audio.selection_end);
    let start = bound(editor, args.time("start"), start)?;
    let end = bound(editor, args.time("end"), end)?;
    editor.audio.select(start, end);
    tracing::trace!(target: "subcue.engine", start, end, "audio selection");
    Ok(Flow::Done)
}
