#![forbid(unsafe_code)]

//! Time expressions.
//!
//! A [`PtsExpr`] is parsed when the command line is parsed and evaluated when
//! the command runs, so anchors such as `ns.s` see the document as left by
//! earlier statements of the same chain.
//!
//! # Grammar
//!
//! ```text
//! expr     := [sign] operand (sign operand)*
//! sign     := '+' | '-'
//! operand  := literal | anchor
//! literal  := N 'ms' | N 's' | N 'm' [N 's'] | [h ':'] mm ':' ss ['.' frac]
//!           | N 'f' | N 'kf'
//! anchor   := 's' N '.' bound | rel 's.' bound | rel 'f' | rel 'kf'
//!           | 'a.' bound | 'av.' bound
//!           | 'dsd' | 'default_duration' | 'min' | 'max' | 'ask'
//!           | long-name
//! rel      := 'c' | 'p' | 'n' | 'f' | 'l'
//! bound    := 'start' | 's' | 'end' | 'e'
//! ```
//!
//! Binary operators are left-associative. A leading sign makes the
//! expression relative to the origin the command supplies (for example the
//! current value of the field being edited); without an origin `-` negates.
//!
//! # Units
//!
//! Values carry a unit until they are needed as milliseconds. Frame and
//! keyframe literals are 1-based ordinals (`10f` is the tenth frame, clamped
//! into range). Added to a value of another unit they count boundaries
//! instead: `x + 10f` is ten frames after `x`.

use std::fmt;

use subcue_core::Timecodes;

use crate::context::{Editor, PromptTime};
use crate::error::{CommandError, CommandResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    fn apply(self, value: i64) -> i64 {
        match self {
            Self::Plus => value,
            Self::Minus => value.saturating_neg(),
        }
    }
}

/// Which end of an event or range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Position relative to the current subtitle, frame or keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rel {
    Current,
    Previous,
    Next,
    First,
    Last,
}

/// One operand of a time expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Ms(i64),
    Frames(i64),
    Keyframes(i64),
    /// `s3.start`: 1-based event number.
    Subtitle(i64, Bound),
    /// `cs.e`, `ns.s`: relative to the first selected event.
    RelSubtitle(Rel, Bound),
    RelFrame(Rel),
    RelKeyframe(Rel),
    /// `a.s` (selection) or `av.s` (view).
    Audio { view: bool, bound: Bound },
    DefaultDuration,
    Min,
    Max,
    Ask,
}

/// Parsed time expression.
#[derive(Debug, Clone, PartialEq)]
pub struct PtsExpr {
    source: String,
    leading: Option<Sign>,
    first: Operand,
    rest: Vec<(Sign, Operand)>,
}

impl fmt::Display for PtsExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ============================================================================
// Parsing
// ============================================================================

const LONG_NAMES: &[(&str, Operand)] = &[
    ("current-frame", Operand::RelFrame(Rel::Current)),
    ("previous-frame", Operand::RelFrame(Rel::Previous)),
    ("next-frame", Operand::RelFrame(Rel::Next)),
    ("previous-subtitle-end", Operand::RelSubtitle(Rel::Previous, Bound::End)),
    ("previous-sub-end", Operand::RelSubtitle(Rel::Previous, Bound::End)),
    ("next-subtitle-start", Operand::RelSubtitle(Rel::Next, Bound::Start)),
    ("next-sub-start", Operand::RelSubtitle(Rel::Next, Bound::Start)),
    ("default-sub-duration", Operand::DefaultDuration),
];

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    /// `123` or `1.5`.
    fn number(&mut self) -> &'a str {
        let start = self.pos;
        self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.rest()[1..].starts_with(|c: char| c.is_ascii_digit()) {
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }
        &self.src[start..self.pos]
    }

    fn word(&mut self) -> &'a str {
        self.take_while(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

fn ms_of(number: &str, scale: f64) -> Result<i64, String> {
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid number \"{number}\""))?;
    Ok((value * scale).round() as i64)
}

fn ordinal(number: &str) -> Result<i64, String> {
    number
        .parse()
        .map_err(|_| format!("frame counts must be whole numbers, got \"{number}\""))
}

fn bound(word: &str) -> Result<Bound, String> {
    match word {
        "start" | "s" => Ok(Bound::Start),
        "end" | "e" => Ok(Bound::End),
        other => Err(format!("expected start/s/end/e, got \"{other}\"")),
    }
}

fn rel(c: char) -> Option<Rel> {
    Some(match c {
        'c' => Rel::Current,
        'p' => Rel::Previous,
        'n' => Rel::Next,
        'f' => Rel::First,
        'l' => Rel::Last,
        _ => return None,
    })
}

impl Cursor<'_> {
    fn operand(&mut self) -> Result<Operand, String> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c.is_ascii_digit() || c == '.' => self.literal(),
            Some(c) if c.is_ascii_alphabetic() => self.anchor(),
            Some(c) => Err(format!("unexpected \"{c}\"")),
            None => Err("expected a time value".to_owned()),
        }
    }

    fn literal(&mut self) -> Result<Operand, String> {
        let number = self.number();
        if number.is_empty() {
            return Err("expected a number".to_owned());
        }
        if self.peek() == Some(':') {
            return self.colon_time(number);
        }
        // Units may be separated from the number: `2 m 3 s`.
        self.skip_ws();
        if self.eat("ms") {
            return Ok(Operand::Ms(ms_of(number, 1.0)?));
        }
        if self.eat("kf") {
            return Ok(Operand::Keyframes(ordinal(number)?));
        }
        match self.peek() {
            Some('f') => {
                self.bump();
                Ok(Operand::Frames(ordinal(number)?))
            }
            Some('s') => {
                self.bump();
                Ok(Operand::Ms(ms_of(number, 1000.0)?))
            }
            Some('m') => {
                self.bump();
                let ms = ms_of(number, 60_000.0)?;
                Ok(Operand::Ms(ms.saturating_add(self.trailing_seconds()?)))
            }
            _ => Err(format!("\"{number}\" needs a unit (ms, s, m, f, kf)")),
        }
    }

    /// Optional seconds part after minutes (`1m 30s`). Rewinds when absent.
    fn trailing_seconds(&mut self) -> Result<i64, String> {
        let save = self.pos;
        self.skip_ws();
        let secs = self.number();
        self.skip_ws();
        if !secs.is_empty() && self.peek() == Some('s') && !self.rest().starts_with("ms") {
            self.bump();
            return ms_of(secs, 1000.0);
        }
        self.pos = save;
        Ok(0)
    }

    /// `[h:]m:ss[.fraction]`; hours and minutes take one or two digits,
    /// seconds exactly two. The fraction is truncated to milliseconds.
    fn colon_time(&mut self, first: &str) -> Result<Operand, String> {
        const SHAPE: &str = "expected [h:]m:ss[.fraction]";
        let mut parts = vec![first];
        while self.eat(":") {
            let part = self.take_while(|c| c.is_ascii_digit());
            if part.is_empty() {
                return Err(SHAPE.to_owned());
            }
            parts.push(part);
        }
        let fraction = if self.peek() == Some('.')
            && self.rest()[1..].starts_with(|c: char| c.is_ascii_digit())
        {
            self.bump();
            self.take_while(|c| c.is_ascii_digit())
        } else {
            ""
        };
        let (hours, minutes, seconds) = match parts.as_slice() {
            [m, s] => (None, *m, *s),
            [h, m, s] => (Some(*h), *m, *s),
            _ => return Err(SHAPE.to_owned()),
        };
        let short = |p: &str| (1..=2).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit());
        if !hours.is_none_or(short) || !short(minutes) || seconds.len() != 2 {
            return Err(SHAPE.to_owned());
        }
        let int = |p: &str| p.parse::<i64>().map_err(|_| SHAPE.to_owned());
        let millis = format!("{:0<3}", &fraction[..fraction.len().min(3)]);
        Ok(Operand::Ms(
            hours.map_or(Ok(0), int)? * 3_600_000
                + int(minutes)? * 60_000
                + int(seconds)? * 1000
                + int(&millis)?,
        ))
    }

    fn anchor(&mut self) -> Result<Operand, String> {
        for (name, operand) in LONG_NAMES {
            let rest = self.rest();
            if rest.starts_with(name)
                && !rest[name.len()..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
            {
                self.pos += name.len();
                return Ok(operand.clone());
            }
        }

        let word = self.word();
        match word {
            "dsd" | "default_duration" => return Ok(Operand::DefaultDuration),
            "min" => return Ok(Operand::Min),
            "max" => return Ok(Operand::Max),
            "ask" => return Ok(Operand::Ask),
            _ => {}
        }

        if self.eat(".") {
            let bound = bound(self.word())?;
            if word == "a" || word == "av" {
                return Ok(Operand::Audio {
                    view: word == "av",
                    bound,
                });
            }
            if let Some(n) = word.strip_prefix('s')
                && !n.is_empty()
                && n.bytes().all(|b| b.is_ascii_digit())
            {
                return Ok(Operand::Subtitle(ordinal(n)?, bound));
            }
            let mut chars = word.chars();
            if let (Some(r), Some('s'), None) = (chars.next().and_then(rel), chars.next(), chars.next()) {
                return Ok(Operand::RelSubtitle(r, bound));
            }
            return Err(format!("unknown anchor \"{word}\""));
        }

        let mut chars = word.chars();
        let r = chars.next().and_then(rel);
        match (r, chars.as_str()) {
            (Some(r), "f") => Ok(Operand::RelFrame(r)),
            (Some(r), "kf") => Ok(Operand::RelKeyframe(r)),
            _ => Err(format!("unknown time anchor \"{word}\"")),
        }
    }

    fn sign(&mut self) -> Option<Sign> {
        self.skip_ws();
        match self.peek() {
            Some('+') => {
                self.bump();
                Some(Sign::Plus)
            }
            Some('-') => {
                self.bump();
                Some(Sign::Minus)
            }
            _ => None,
        }
    }
}

impl PtsExpr {
    /// Parse `source`. Errors describe the problem; callers add the token.
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut cur = Cursor { src: source, pos: 0 };
        let leading = cur.sign();
        let first = cur.operand()?;
        let mut rest = Vec::new();
        loop {
            cur.skip_ws();
            if cur.peek().is_none() {
                break;
            }
            let Some(sign) = cur.sign() else {
                return Err(format!("unexpected \"{}\"", cur.rest()));
            };
            rest.push((sign, cur.operand()?));
        }
        Ok(Self {
            source: source.trim().to_owned(),
            leading,
            first,
            rest,
        })
    }

    /// Whether the expression prompts when evaluated.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.first == Operand::Ask || self.rest.iter().any(|(_, op)| *op == Operand::Ask)
    }

    /// Whether a leading sign makes this relative to the origin.
    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.leading.is_some()
    }

    /// The same expression read as a delta: `10f` becomes `+10f`.
    /// Signed and interactive expressions are returned unchanged.
    #[must_use]
    pub fn as_offset(&self) -> Self {
        if self.is_relative() || self.is_interactive() {
            return self.clone();
        }
        Self {
            source: format!("+{}", self.source),
            leading: Some(Sign::Plus),
            ..self.clone()
        }
    }

    /// Evaluate against the current editor state.
    ///
    /// `origin` is the value a leading sign is relative to; `align` snaps the
    /// result to the nearest frame when timecodes are available.
    pub fn eval(&self, editor: &mut Editor, origin: Option<i64>, align: bool) -> CommandResult<i64> {
        let mut acc = eval_operand(editor, &self.first, origin)?;
        match (self.leading, origin) {
            (Some(sign), Some(origin)) => acc = combine(editor, Value::Ms(origin), sign, acc)?,
            (Some(Sign::Minus), None) => acc = acc.negated(),
            _ => {}
        }
        for (sign, operand) in &self.rest {
            let rhs = eval_operand(editor, operand, origin)?;
            acc = combine(editor, acc, *sign, rhs)?;
        }
        let ms = acc.unpack(editor.timecodes())?;
        Ok(if align { editor.align(ms) } else { ms })
    }
}

// ============================================================================
// Evaluation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value {
    Ms(i64),
    Frame(i64),
    Keyframe(i64),
}

impl Value {
    fn negated(self) -> Self {
        match self {
            Self::Ms(v) => Self::Ms(v.saturating_neg()),
            Self::Frame(v) => Self::Frame(v.saturating_neg()),
            Self::Keyframe(v) => Self::Keyframe(v.saturating_neg()),
        }
    }

    fn unpack(self, timecodes: Option<&Timecodes>) -> CommandResult<i64> {
        match self {
            Self::Ms(v) => Ok(v),
            Self::Frame(n) => Ok(need(timecodes)?.frame_number(n)?),
            Self::Keyframe(n) => Ok(need(timecodes)?.keyframe_number(n)?),
        }
    }
}

fn need(timecodes: Option<&Timecodes>) -> CommandResult<&Timecodes> {
    timecodes.ok_or(CommandError::Time(subcue_core::TimeError::NoTimecodes))
}

fn combine(editor: &Editor, lhs: Value, sign: Sign, rhs: Value) -> CommandResult<Value> {
    let timecodes = editor.timecodes();
    Ok(match (lhs, rhs) {
        (Value::Ms(a), Value::Ms(b)) => Value::Ms(a.saturating_add(sign.apply(b))),
        (Value::Frame(a), Value::Frame(b)) => Value::Frame(a.saturating_add(sign.apply(b))),
        (Value::Keyframe(a), Value::Keyframe(b)) => Value::Keyframe(a.saturating_add(sign.apply(b))),
        (lhs, Value::Ms(b)) => Value::Ms(lhs.unpack(timecodes)?.saturating_add(sign.apply(b))),
        (lhs, Value::Frame(n)) => {
            let base = lhs.unpack(timecodes)?;
            Value::Ms(need(timecodes)?.shift_frames(base, sign.apply(n))?)
        }
        (lhs, Value::Keyframe(n)) => {
            let base = lhs.unpack(timecodes)?;
            Value::Ms(need(timecodes)?.shift_keyframes(base, sign.apply(n))?)
        }
    })
}

fn eval_operand(editor: &mut Editor, operand: &Operand, origin: Option<i64>) -> CommandResult<Value> {
    Ok(match operand {
        Operand::Ms(v) => Value::Ms(*v),
        Operand::Frames(n) => Value::Frame(*n),
        Operand::Keyframes(n) => Value::Keyframe(*n),
        Operand::Subtitle(number, bound) => {
            let len = editor.document.len();
            if len == 0 {
                Value::Ms(0)
            } else {
                let idx = (*number).clamp(1, len as i64) as usize - 1;
                Value::Ms(event_bound(editor, Some(idx), *bound))
            }
        }
        Operand::RelSubtitle(rel, bound) => {
            let len = editor.document.len() as i64;
            let current = editor
                .selection
                .first_index(&editor.document)
                .map(|i| i as i64);
            let idx = match rel {
                Rel::First => Some(0),
                Rel::Last => Some(len - 1),
                Rel::Current => current,
                Rel::Previous => current.map(|i| i - 1),
                Rel::Next => current.map(|i| i + 1),
            };
            let idx = idx.filter(|i| (0..len).contains(i)).map(|i| i as usize);
            Value::Ms(event_bound(editor, idx, *bound))
        }
        Operand::RelFrame(rel) => {
            let pts = editor.playback().current_pts();
            if *rel == Rel::Current {
                return Ok(Value::Ms(pts));
            }
            let tc = need(editor.timecodes())?;
            match rel {
                Rel::First => Value::Frame(1),
                Rel::Last => Value::Frame(tc.len() as i64),
                Rel::Current => Value::Ms(pts),
                Rel::Previous => Value::Ms(tc.shift_frames(pts, -1)?),
                Rel::Next => Value::Ms(tc.shift_frames(pts, 1)?),
            }
        }
        Operand::RelKeyframe(rel) => {
            let pts = editor.playback().current_pts();
            let tc = need(editor.timecodes())?;
            match rel {
                Rel::First => Value::Keyframe(1),
                Rel::Last => Value::Keyframe(tc.keyframes().len() as i64),
                Rel::Current => Value::Ms(tc.shift_keyframes(pts, 0)?),
                Rel::Previous => Value::Ms(tc.shift_keyframes(pts, -1)?),
                Rel::Next => Value::Ms(tc.shift_keyframes(pts, 1)?),
            }
        }
        Operand::Audio { view, bound } => {
            let audio = &editor.audio;
            Value::Ms(match (view, bound) {
                (false, Bound::Start) => audio.selection_start,
                (false, Bound::End) => audio.selection_end,
                (true, Bound::Start) => audio.view_start,
                (true, Bound::End) => audio.view_end,
            })
        }
        Operand::DefaultDuration => Value::Ms(editor.options.subs.default_duration),
        Operand::Min => Value::Ms(0),
        Operand::Max => Value::Ms(editor.playback().max_pts()),
        Operand::Ask => match editor.prompt().ask_time("Time", origin) {
            None => return Err(CommandError::Cancelled),
            Some(PromptTime::Absolute(ms)) => Value::Ms(ms),
            Some(PromptTime::Relative(delta)) => {
                Value::Ms(origin.map_or(delta, |o| o.saturating_add(delta)))
            }
        },
    })
}

fn event_bound(editor: &Editor, index: Option<usize>, bound: Bound) -> i64 {
    index
        .and_then(|i| editor.document.get(i))
        .map_or(0, |ev| match bound {
            Bound::Start => ev.start,
            Bound::End => ev.end,
        })
}
