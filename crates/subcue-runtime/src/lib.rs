#![forbid(unsafe_code)]

//! Subcue Runtime
//!
//! The command language, execution engine and undo log of the subcue
//! subtitle editor.
//!
//! # Key Components
//!
//! - [`Engine`] - Parses command lines and runs them against an [`Editor`]
//! - [`CommandRegistry`] - Lock-free name lookup with hot reload
//! - [`Editor`] - Document, selection, audio view and collaborators
//! - [`UndoLog`] / [`Transaction`] - Snapshot undo with nested captures
//! - [`PtsExpr`] / [`TargetExpr`] - Time and target expressions
//! - [`BackgroundTask`] - Work split between a worker and the editing thread
//!
//! # How it fits in the system
//! `subcue-core` owns the data model and keymap tables. This crate gives
//! them behaviour: hotkeys and menu entries resolve to command lines, the
//! engine turns command lines into invocations, and every built-in command
//! edits the document inside one undoable transaction.

pub mod bool_op;
pub mod commands;
pub mod context;
pub mod engine;
pub mod error;
pub mod invocation;
pub mod log;
pub mod options;
pub mod pts;
pub mod registry;
pub mod target;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod undo;
pub mod worker;

pub use bool_op::BoolOp;
pub use context::{
    AudioView, Editor, JsonPersistence, NoPlayback, NoPrompt, PathMode, Persistence, Playback,
    Prompt, PromptTime,
};
pub use engine::Engine;
pub use error::{CommandError, CommandResult, Outcome, PersistError};
pub use invocation::{
    ArgValue, Args, CommandDescriptor, Invocation, ParamKind, ParamSpec, ParseError,
    parse_cmdline,
};
pub use log::{Level, LogEntry, Notifier, NullNotifier, UserLog};
pub use options::{
    EngineOptions, LogOptions, Options, OptionsError, PathOptions, SubsOptions, UndoOptions,
};
pub use pts::PtsExpr;
pub use registry::{
    Command, CommandRegistry, CommandSource, DirectorySource, Discovery, Flow, RegistryError,
    RegistryTable, ReloadReport, SourceError,
};
pub use target::{PathArg, TargetExpr};
pub use undo::{Transaction, UndoEntry, UndoLog, UndoState};
pub use worker::{BackgroundTask, CancellationSource, CancellationToken, JobId};
