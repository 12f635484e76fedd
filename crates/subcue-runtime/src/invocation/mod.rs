#![forbid(unsafe_code)]

//! Invocation parser: raw command lines to typed invocations.
//!
//! ```text
//!  "seek -p=cs.s; pause off"
//!          │ tokenizer::split_statements
//!          ▼
//!  [ ["seek", "-p=cs.s"], ["pause", "off"] ]
//!          │ registry lookup + args::parse_args (per command schema)
//!          ▼
//!  [ Invocation(seek, {pts: Time(cs.s)}), Invocation(pause, {op: Bool(off)}) ]
//! ```
//!
//! Statements are parsed independently: one unknown command or bad argument
//! fails that statement only. Time and target expressions are parsed here but
//! evaluated at execution time.

pub mod args;
pub mod schema;
pub mod tokenizer;

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

pub use args::{ArgValue, Args, parse_args};
pub use schema::{CommandDescriptor, ParamKind, ParamSpec};
pub use tokenizer::{Statement, quote, split_statements, split_tokens};

use crate::error::CommandError;
use crate::registry::{Command, RegistryTable};

/// Malformed command line, unknown option, or invalid value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render(self))]
pub struct ParseError {
    /// Command whose schema rejected the input.
    pub command: Option<String>,
    /// Offending token, when one can be named.
    pub token: Option<String>,
    pub message: String,
    /// Full statement or command line, for diagnostics.
    pub text: Option<String>,
}

fn render(err: &ParseError) -> String {
    let mut out = String::new();
    if let Some(command) = &err.command {
        let _ = write!(out, "{command}: ");
    }
    out.push_str(&err.message);
    if let Some(token) = &err.token {
        let _ = write!(out, " near \"{token}\"");
    }
    if let Some(text) = &err.text {
        let _ = write!(out, " in \"{text}\"");
    }
    out
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            command: None,
            token: None,
            message: message.into(),
            text: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_owned());
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_owned());
        self
    }

    #[must_use]
    pub fn with_command(mut self, command: &str) -> Self {
        self.command = Some(command.to_owned());
        self
    }
}

/// A command bound to typed arguments, ready to execute.
///
/// Keeps its raw tokens and the registry generation it was parsed against so
/// the engine can re-parse it after a reload.
#[derive(Clone)]
pub struct Invocation {
    command: Arc<dyn Command>,
    args: Args,
    tokens: Vec<String>,
    text: String,
    generation: u64,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.name())
            .field("args", &self.args)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Invocation {
    /// Bind `command` to the already-split `tokens` (name first).
    pub fn new(
        command: Arc<dyn Command>,
        tokens: Vec<String>,
        text: &str,
        generation: u64,
    ) -> Result<Self, ParseError> {
        let args = parse_args(command.descriptor(), tokens.get(1..).unwrap_or_default())
            .map_err(|e| e.with_text(text))?;
        Ok(Self {
            command,
            args,
            tokens,
            text: text.to_owned(),
            generation,
        })
    }

    /// Canonical command name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.command.descriptor().name()
    }

    #[must_use]
    pub fn command(&self) -> &Arc<dyn Command> {
        &self.command
    }

    #[must_use]
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Tokens as written, command name first.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Statement as written.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Registry generation this invocation was bound against.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Re-serialize with the canonical name and long option spellings.
    #[must_use]
    pub fn to_cmdline(&self) -> String {
        let desc = self.command.descriptor();
        let mut out = desc.name().to_owned();
        let mut positionals = Vec::new();
        for spec in &desc.params {
            let Some(value) = self.args.get(&spec.name) else {
                continue;
            };
            if spec.positional {
                positionals.push(value.to_token());
                continue;
            }
            let token = match (&spec.kind, value) {
                (ParamKind::Flag, ArgValue::Flag) => format!("--{}", long_name(spec)),
                (ParamKind::Selector(_), ArgValue::Choice(choice)) => format!("--{choice}"),
                (_, value) => format!("--{}={}", long_name(spec), value.to_token()),
            };
            out.push(' ');
            out.push_str(&quote(&token));
        }
        if positionals.iter().any(|p| args::looks_like_option(p)) {
            out.push_str(" --");
        }
        for value in positionals {
            out.push(' ');
            out.push_str(&quote(&value));
        }
        out
    }
}

fn long_name(spec: &ParamSpec) -> &str {
    spec.canonical_long().unwrap_or(&spec.name)
}

/// Bind one statement against `table`.
pub fn parse_statement(
    table: &RegistryTable,
    statement: &Statement,
) -> Result<Invocation, CommandError> {
    let Some(name) = statement.tokens.first() else {
        return Err(ParseError::new("empty statement").into());
    };
    let command = table
        .get(name)
        .ok_or_else(|| CommandError::UnknownCommand(name.clone()))?;
    Ok(Invocation::new(
        command,
        statement.tokens.clone(),
        &statement.text,
        table.generation(),
    )?)
}

/// Split `cmdline` and bind every statement. Tokenizer failures reject the
/// whole line; per-statement failures are returned in place.
pub fn parse_cmdline(
    table: &RegistryTable,
    cmdline: &str,
) -> Result<Vec<Result<Invocation, CommandError>>, ParseError> {
    Ok(split_statements(cmdline)?
        .iter()
        .map(|statement| parse_statement(table, statement))
        .collect())
}
