#![forbid(unsafe_code)]

//! Schema-driven conversion of raw tokens to typed arguments.
//!
//! Accepted spellings:
//!
//! | Form | Example |
//! |------|---------|
//! | long flag / selector | `--no-align`, `--after` |
//! | long option | `--text=abc`, `--text abc` |
//! | short option | `-p=cs.s`, `-p cs.s`, `-pcs.s` |
//! | positional | `toggle`, `-10f` |
//! | end of options | `--` |
//!
//! A token beginning with `-` followed by a digit, `+`, `.` or `:` is a value.
//! An option that takes a value consumes the next token whatever it looks like.

use std::collections::BTreeMap;
use std::path::Path;

use subcue_core::EventId;

use super::ParseError;
use super::schema::{CommandDescriptor, ParamKind, ParamSpec};
use crate::bool_op::BoolOp;
use crate::error::{CommandError, CommandResult};
use crate::pts::PtsExpr;
use crate::target::{PathArg, TargetExpr};

/// A converted argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Flag,
    /// Selector or choice value, canonical spelling.
    Choice(String),
    Bool(BoolOp),
    Int(i64),
    Real(f64),
    Text(String),
    Time(PtsExpr),
    Target(TargetExpr),
    Path(PathArg),
}

impl ArgValue {
    /// Token that converts back to this value.
    #[must_use]
    pub fn to_token(&self) -> String {
        match self {
            Self::Flag => String::new(),
            Self::Choice(s) | Self::Text(s) => s.clone(),
            Self::Bool(op) => op.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Real(x) => x.to_string(),
            Self::Time(expr) => expr.to_string(),
            Self::Target(expr) => expr.to_string(),
            Self::Path(path) => path.to_string(),
        }
    }
}

/// Typed arguments of one invocation.
///
/// Target arguments are resolved to event ids by the engine right before the
/// body runs; bodies read them with [`Args::targets`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: BTreeMap<String, ArgValue>,
    resolved: BTreeMap<String, Vec<EventId>>,
}

impl Args {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: ArgValue) {
        self.values.insert(name.to_owned(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(ArgValue::Flag))
    }

    /// Selected choice of a selector or choice parameter.
    #[must_use]
    pub fn choice(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Choice(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn bool_op(&self, name: &str) -> Option<BoolOp> {
        match self.values.get(name) {
            Some(ArgValue::Bool(op)) => Some(*op),
            _ => None,
        }
    }

    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn real(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ArgValue::Real(x)) => Some(*x),
            _ => None,
        }
    }

    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn time(&self, name: &str) -> Option<&PtsExpr> {
        match self.values.get(name) {
            Some(ArgValue::Time(expr)) => Some(expr),
            _ => None,
        }
    }

    #[must_use]
    pub fn target(&self, name: &str) -> Option<&TargetExpr> {
        match self.values.get(name) {
            Some(ArgValue::Target(expr)) => Some(expr),
            _ => None,
        }
    }

    #[must_use]
    pub fn path(&self, name: &str) -> Option<&PathArg> {
        match self.values.get(name) {
            Some(ArgValue::Path(path)) => Some(path),
            _ => None,
        }
    }

    /// Record the resolution of target parameter `name`.
    pub fn set_resolved(&mut self, name: &str, ids: Vec<EventId>) {
        self.resolved.insert(name.to_owned(), ids);
    }

    /// Resolved ids of target parameter `name`.
    pub fn targets(&self, name: &str) -> CommandResult<&[EventId]> {
        self.resolved
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CommandError::Invariant(format!("target \"{name}\" was not resolved")))
    }
}

pub(crate) fn looks_like_option(token: &str) -> bool {
    let mut chars = token.chars();
    if chars.next() != Some('-') {
        return false;
    }
    match chars.next() {
        None => false,
        Some(c) => !(c.is_ascii_digit() || matches!(c, '+' | '.' | ':')),
    }
}

/// Convert a raw token for a value-taking parameter.
pub fn convert(kind: &ParamKind, raw: &str) -> Result<ArgValue, String> {
    match kind {
        ParamKind::Flag | ParamKind::Selector(_) => Err("takes no value".to_owned()),
        ParamKind::Bool => raw.parse::<BoolOp>().map(ArgValue::Bool),
        ParamKind::Int => raw
            .parse::<i64>()
            .map(ArgValue::Int)
            .map_err(|_| "expected an integer".to_owned()),
        ParamKind::Real => match raw.parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(ArgValue::Real(x)),
            _ => Err("expected a number".to_owned()),
        },
        ParamKind::Text => Ok(ArgValue::Text(raw.to_owned())),
        ParamKind::Choice(choices) => choices
            .iter()
            .find(|c| c.eq_ignore_ascii_case(raw))
            .map(|c| ArgValue::Choice((*c).to_owned()))
            .ok_or_else(|| format!("expected one of {}", choices.join(", "))),
        ParamKind::Time => PtsExpr::parse(raw).map(ArgValue::Time),
        ParamKind::Target => TargetExpr::parse(raw).map(ArgValue::Target),
        ParamKind::Path => Ok(ArgValue::Path(PathArg::parse(Path::new(raw)))),
    }
}

enum Matched<'d> {
    Param(&'d ParamSpec),
    Selector(&'d ParamSpec, &'static str),
}

fn find_long<'d>(desc: &'d CommandDescriptor, name: &str) -> Option<Matched<'d>> {
    desc.params.iter().find_map(|spec| match &spec.kind {
        ParamKind::Selector(choices) => choices
            .iter()
            .find(|c| **c == name)
            .map(|c| Matched::Selector(spec, *c)),
        _ if spec.longs.iter().any(|l| l == name) => Some(Matched::Param(spec)),
        _ => None,
    })
}

fn find_short(desc: &CommandDescriptor, c: char) -> Option<&ParamSpec> {
    desc.params
        .iter()
        .find(|spec| !spec.positional && spec.shorts.contains(&c))
}

struct ArgParser<'d> {
    desc: &'d CommandDescriptor,
    args: Args,
}

impl ArgParser<'_> {
    fn error(&self, message: impl Into<String>, token: &str) -> ParseError {
        ParseError::new(message)
            .with_command(self.desc.name())
            .with_token(token)
    }

    fn store(&mut self, spec: &ParamSpec, raw: &str, token: &str) -> Result<(), ParseError> {
        let value = convert(&spec.kind, raw).map_err(|msg| {
            self.error(format!("invalid value for {}: {msg}", spec.name), token)
        })?;
        self.args.insert(&spec.name, value);
        Ok(())
    }

    fn select(&mut self, spec: &ParamSpec, choice: &str, token: &str) -> Result<(), ParseError> {
        if let Some(previous) = self.args.choice(&spec.name)
            && previous != choice
        {
            return Err(self.error(format!("conflicts with --{previous}"), token));
        }
        self.args.insert(&spec.name, ArgValue::Choice(choice.to_owned()));
        Ok(())
    }
}

/// Convert `tokens` (command name excluded) according to `desc`.
pub fn parse_args(desc: &CommandDescriptor, tokens: &[String]) -> Result<Args, ParseError> {
    let mut parser = ArgParser {
        desc,
        args: Args::new(),
    };
    let mut positionals = desc.params.iter().filter(|p| p.positional);
    let mut options_done = false;
    let mut rest = tokens.iter();

    while let Some(token) = rest.next() {
        if !options_done && token == "--" {
            options_done = true;
            continue;
        }
        if options_done || !looks_like_option(token) {
            let Some(spec) = positionals.next() else {
                return Err(parser.error("unexpected argument", token));
            };
            parser.store(spec, token, token)?;
            continue;
        }

        if let Some(body) = token.strip_prefix("--") {
            let (name, inline) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };
            match find_long(desc, name) {
                Some(Matched::Selector(spec, choice)) => {
                    if inline.is_some() {
                        return Err(parser.error("option takes no value", token));
                    }
                    parser.select(spec, choice, token)?;
                }
                Some(Matched::Param(spec)) if !spec.kind.takes_value() => {
                    if inline.is_some() {
                        return Err(parser.error("option takes no value", token));
                    }
                    parser.args.insert(&spec.name, ArgValue::Flag);
                }
                Some(Matched::Param(spec)) => {
                    let value = match inline {
                        Some(v) => v,
                        None => rest
                            .next()
                            .map(String::as_str)
                            .ok_or_else(|| parser.error("missing value", token))?,
                    };
                    parser.store(spec, value, token)?;
                }
                None => return Err(parser.error("unknown option", token)),
            }
            continue;
        }

        let body = &token[1..];
        let mut chars = body.chars();
        let Some(c) = chars.next() else {
            return Err(parser.error("unknown option", token));
        };
        let Some(spec) = find_short(desc, c) else {
            return Err(parser.error("unknown option", token));
        };
        let tail = chars.as_str();
        if !spec.kind.takes_value() {
            if !tail.is_empty() {
                return Err(parser.error("option takes no value", token));
            }
            parser.args.insert(&spec.name, ArgValue::Flag);
            continue;
        }
        let value = if let Some(v) = tail.strip_prefix('=') {
            v
        } else if !tail.is_empty() {
            tail
        } else {
            rest.next()
                .map(String::as_str)
                .ok_or_else(|| parser.error("missing value", token))?
        };
        parser.store(spec, value, token)?;
    }

    for spec in &desc.params {
        if parser.args.contains(&spec.name) {
            continue;
        }
        if let Some(default) = &spec.default {
            match &spec.kind {
                ParamKind::Selector(_) => {
                    parser.args.insert(&spec.name, ArgValue::Choice(default.clone()));
                }
                kind => {
                    let value = convert(kind, default).map_err(|msg| {
                        parser.error(format!("invalid default for {}: {msg}", spec.name), default)
                    })?;
                    parser.args.insert(&spec.name, value);
                }
            }
        } else if spec.required {
            let wanted = match &spec.kind {
                ParamKind::Selector(choices) => format!(
                    "one of {} is required",
                    choices.iter().map(|c| format!("--{c}")).collect::<Vec<_>>().join(", ")
                ),
                _ if spec.positional => format!("missing argument {}", spec.name),
                _ => format!("missing required option --{}", long_or_name(spec)),
            };
            return Err(ParseError::new(wanted).with_command(desc.name()));
        }
    }

    Ok(parser.args)
}

fn long_or_name(spec: &ParamSpec) -> &str {
    spec.canonical_long().unwrap_or(&spec.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_owned).collect()
    }

    fn seek() -> CommandDescriptor {
        CommandDescriptor::new("seek")
            .param(
                ParamSpec::option("pts", ParamKind::Time)
                    .short('p')
                    .short('d')
                    .alias("delta")
                    .required(),
            )
            .param(ParamSpec::flag("precise"))
    }

    fn insert() -> CommandDescriptor {
        CommandDescriptor::new("sub-insert")
            .param(
                ParamSpec::option("origin", ParamKind::Target)
                    .short('o')
                    .default("selected"),
            )
            .param(ParamSpec::selector("dir", &["before", "after"]).required())
            .param(ParamSpec::flag("no-align"))
    }

    #[test]
    fn short_option_spellings() {
        let desc = seek();
        for line in ["-p=cs.s", "-p cs.s", "-pcs.s", "-d=cs.s", "--pts=cs.s", "--delta cs.s"] {
            let args = parse_args(&desc, &toks(line)).unwrap();
            assert_eq!(args.time("pts").map(ToString::to_string).as_deref(), Some("cs.s"), "{line}");
            assert!(!args.flag("precise"));
        }
    }

    #[test]
    fn flags_and_selectors() {
        let args = parse_args(&insert(), &toks("--after --no-align")).unwrap();
        assert_eq!(args.choice("dir"), Some("after"));
        assert!(args.flag("no-align"));
        assert_eq!(args.target("origin"), Some(&TargetExpr::Selected));
    }

    #[test]
    fn selector_conflict_and_required() {
        let err = parse_args(&insert(), &toks("--after --before")).unwrap_err();
        assert_eq!(err.token.as_deref(), Some("--before"));
        assert!(err.message.contains("conflicts"));
        let err = parse_args(&insert(), &[]).unwrap_err();
        assert!(err.message.contains("--before"));
        assert!(parse_args(&insert(), &toks("--after --after")).is_ok());
    }

    #[test]
    fn unknown_option_is_named() {
        let err = parse_args(&seek(), &toks("-p 1s --bogus")).unwrap_err();
        assert_eq!(err.token.as_deref(), Some("--bogus"));
        assert_eq!(err.command.as_deref(), Some("seek"));
        assert!(parse_args(&seek(), &toks("-x 1s")).is_err());
        assert!(parse_args(&seek(), &toks("-p 1s extra")).is_err());
        assert!(parse_args(&seek(), &toks("--precise=1 -p 1s")).is_err());
    }

    #[test]
    fn missing_value() {
        let err = parse_args(&seek(), &toks("--pts")).unwrap_err();
        assert_eq!(err.message, "missing value");
    }

    #[test]
    fn option_value_may_look_like_an_option() {
        let args = parse_args(&seek(), &toks("-p -pf")).unwrap();
        assert_eq!(args.time("pts").map(ToString::to_string).as_deref(), Some("-pf"));
    }

    #[test]
    fn negative_positional_is_a_value() {
        let desc = CommandDescriptor::new("nudge")
            .param(ParamSpec::positional("delta", ParamKind::Time).required());
        let args = parse_args(&desc, &toks("-10f")).unwrap();
        assert!(args.time("delta").is_some());
        assert!(looks_like_option("-x"));
        assert!(!looks_like_option("-1"));
        assert!(!looks_like_option("-"));
        assert!(!looks_like_option("-:30"));
    }

    #[test]
    fn typed_conversion_errors() {
        let desc = CommandDescriptor::new("t")
            .param(ParamSpec::option("n", ParamKind::Int))
            .param(ParamSpec::option("x", ParamKind::Real))
            .param(ParamSpec::option("mode", ParamKind::Choice(&["fast", "slow"])))
            .param(ParamSpec::positional("op", ParamKind::Bool));
        let args = parse_args(&desc, &toks("--n=3 --x 0.5 --mode FAST toggle")).unwrap();
        assert_eq!(args.int("n"), Some(3));
        assert_eq!(args.real("x"), Some(0.5));
        assert_eq!(args.choice("mode"), Some("fast"));
        assert_eq!(args.bool_op("op"), Some(BoolOp::Toggle));
        assert!(parse_args(&desc, &toks("--n=three")).is_err());
        assert!(parse_args(&desc, &toks("--mode medium")).is_err());
        assert!(parse_args(&desc, &toks("maybe")).is_err());
    }

    #[test]
    fn targets_must_be_resolved() {
        let mut args = Args::new();
        assert!(args.targets("target").is_err());
        args.set_resolved("target", vec![EventId::new(1)]);
        assert_eq!(args.targets("target").unwrap(), &[EventId::new(1)]);
    }
}
