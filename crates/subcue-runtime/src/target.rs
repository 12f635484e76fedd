#![forbid(unsafe_code)]

//! Target expressions: which events a command acts on.
//!
//! | Token | Resolves to |
//! |-------|-------------|
//! | `selected` | current selection, document order |
//! | `all` / `none` | every event / nothing |
//! | `first` / `last` | first / last event |
//! | `one-above` | event before the first selected one |
//! | `one-below` | event after the last selected one |
//! | `ask-number` | prompted 1-based line number |
//! | `ask-time` | event whose center is nearest a prompted time |
//! | `3`, `1,4`, `2..5`, `2...5` | 1-based lines; `0` and out-of-range lines dropped |
//!
//! With an empty selection `one-above`/`one-below` anchor on the playback
//! position when media is loaded and on the first line otherwise.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::Regex;
use subcue_core::EventId;

use crate::context::{Editor, PathMode, PromptTime};
use crate::error::{CommandError, CommandResult};

/// Parsed target expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetExpr {
    Selected,
    All,
    None,
    First,
    Last,
    OneAbove,
    OneBelow,
    AskNumber,
    AskTime,
    /// Inclusive 1-based ranges, in the order written.
    Indexes(Vec<(usize, usize)>),
}

const WORDS: &[(&str, TargetExpr)] = &[
    ("selected", TargetExpr::Selected),
    ("all", TargetExpr::All),
    ("none", TargetExpr::None),
    ("first", TargetExpr::First),
    ("last", TargetExpr::Last),
    ("one-above", TargetExpr::OneAbove),
    ("one-below", TargetExpr::OneBelow),
    ("ask-number", TargetExpr::AskNumber),
    ("ask-time", TargetExpr::AskTime),
];

fn index_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+((\.\.\.?|,)\d+)*$").expect("index regex"))
}

impl TargetExpr {
    pub fn parse(token: &str) -> Result<Self, String> {
        let token = token.trim();
        if let Some((_, expr)) = WORDS.iter().find(|(w, _)| w.eq_ignore_ascii_case(token)) {
            return Ok(expr.clone());
        }
        if !index_regex().is_match(token) {
            let words = WORDS.iter().map(|(w, _)| *w).collect::<Vec<_>>();
            return Err(format!("expected {} or line numbers", words.join(", ")));
        }
        let mut groups = Vec::new();
        for group in token.split(',') {
            let numbers = group
                .split("..")
                .map(|n| n.trim_start_matches('.'))
                .map(|n| n.parse::<usize>().map_err(|_| format!("line number \"{n}\" is too large")))
                .collect::<Result<Vec<_>, _>>()?;
            let (a, b) = match numbers.as_slice() {
                [n] => (*n, *n),
                [a, .., b] => (*a.min(b), *a.max(b)),
                [] => continue,
            };
            groups.push((a, b));
        }
        Ok(Self::Indexes(groups))
    }

    /// Whether resolving could yield something, without prompting.
    #[must_use]
    pub fn makes_sense(&self, editor: &Editor) -> bool {
        let len = editor.document.len();
        match self {
            Self::All | Self::None => true,
            Self::Selected => !editor.selection.is_empty(),
            Self::First | Self::Last | Self::OneAbove | Self::OneBelow => len > 0,
            Self::AskNumber | Self::AskTime => len > 0,
            Self::Indexes(groups) => groups
                .iter()
                .any(|&(a, b)| b >= 1 && a.max(1) <= len),
        }
    }

    /// Resolve to event ids in document order (indexes: written order).
    pub fn resolve(&self, editor: &mut Editor) -> CommandResult<Vec<EventId>> {
        editor.selection.revalidate(&editor.document);
        let doc = &editor.document;
        let len = doc.len();
        let at = |i: usize| doc.id_at(i).into_iter().collect::<Vec<_>>();
        Ok(match self {
            Self::Selected => doc.ids_at(&editor.selection.indexes(doc)),
            Self::All => doc.events().filter_map(|ev| ev.id()).collect(),
            Self::None => Vec::new(),
            Self::First => at(0),
            Self::Last => len.checked_sub(1).map(at).unwrap_or_default(),
            Self::OneAbove => at(one_above(editor)?),
            Self::OneBelow => at(one_below(editor)?),
            Self::AskNumber => {
                if len == 0 {
                    return Ok(Vec::new());
                }
                let number = editor
                    .prompt()
                    .ask_number("Line number", 1, len as i64)
                    .ok_or(CommandError::Cancelled)?;
                if number < 1 || number as usize > len {
                    return Err(CommandError::unavailable(format!("there is no line {number}")));
                }
                editor.document.id_at(number as usize - 1).into_iter().collect()
            }
            Self::AskTime => {
                if len == 0 {
                    return Ok(Vec::new());
                }
                let ms = match editor.prompt().ask_time("Time", None) {
                    None => return Err(CommandError::Cancelled),
                    Some(PromptTime::Absolute(ms) | PromptTime::Relative(ms)) => ms,
                };
                let doc = &editor.document;
                doc.events()
                    .enumerate()
                    .min_by_key(|(_, ev)| (ev.center() - ms).abs())
                    .and_then(|(i, _)| doc.id_at(i))
                    .into_iter()
                    .collect()
            }
            Self::Indexes(groups) => {
                let mut seen = ahash::AHashSet::new();
                let mut out = Vec::new();
                for &(a, b) in groups {
                    for n in a.max(1)..=b.min(len) {
                        if let Some(id) = doc.id_at(n - 1)
                            && seen.insert(id)
                        {
                            out.push(id);
                        }
                    }
                }
                out
            }
        })
    }
}

fn one_above(editor: &Editor) -> CommandResult<usize> {
    let doc = &editor.document;
    if doc.is_empty() {
        return Err(CommandError::NoSelection);
    }
    if let Some(first) = editor.selection.first_index(doc) {
        return Ok(first.saturating_sub(1));
    }
    let playback = editor.playback();
    if !playback.is_loaded() {
        return Ok(0);
    }
    let pts = playback.current_pts();
    Ok(doc
        .events()
        .enumerate()
        .filter(|(_, ev)| ev.start <= pts)
        .max_by_key(|(i, ev)| (ev.start, *i))
        .map_or(0, |(i, _)| i))
}

fn one_below(editor: &Editor) -> CommandResult<usize> {
    let doc = &editor.document;
    let len = doc.len();
    if len == 0 {
        return Err(CommandError::NoSelection);
    }
    if let Some(last) = editor.selection.last_index(doc) {
        return Ok((last + 1).min(len - 1));
    }
    let playback = editor.playback();
    if !playback.is_loaded() {
        return Ok(0);
    }
    let pts = playback.current_pts();
    Ok(doc
        .events()
        .enumerate()
        .filter(|(_, ev)| ev.start >= pts)
        .min_by_key(|(i, ev)| (ev.start, *i))
        .map_or(0, |(i, _)| i))
}

impl fmt::Display for TargetExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((word, _)) = WORDS.iter().find(|(_, e)| e == self) {
            return f.write_str(word);
        }
        let Self::Indexes(groups) = self else {
            return Ok(());
        };
        for (i, &(a, b)) in groups.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if a == b {
                write!(f, "{a}")?;
            } else {
                write!(f, "{a}..{b}")?;
            }
        }
        Ok(())
    }
}

/// A file path argument, or `ask` to prompt for one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathArg {
    Ask,
    Path(PathBuf),
}

impl PathArg {
    #[must_use]
    pub fn parse(raw: &Path) -> Self {
        if raw.as_os_str().is_empty() || raw == Path::new("ask") {
            Self::Ask
        } else {
            Self::Path(raw.to_owned())
        }
    }

    /// Path of a file to open. Prompts for `ask`; the file must exist.
    pub fn resolve_open(&self, editor: &mut Editor) -> CommandResult<PathBuf> {
        let path = self.resolve(editor, PathMode::Open)?;
        if !path.exists() {
            return Err(CommandError::unavailable(format!(
                "{} does not exist",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Path to save to. Prompts for `ask`.
    pub fn resolve_save(&self, editor: &mut Editor) -> CommandResult<PathBuf> {
        self.resolve(editor, PathMode::Save)
    }

    fn resolve(&self, editor: &mut Editor, mode: PathMode) -> CommandResult<PathBuf> {
        match self {
            Self::Path(path) => Ok(path.clone()),
            Self::Ask => editor
                .prompt()
                .ask_path("File", mode)
                .ok_or(CommandError::Cancelled),
        }
    }
}

impl fmt::Display for PathArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask => f.write_str("ask"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}
