#![forbid(unsafe_code)]

//! Error taxonomy and execution outcomes.
//!
//! | Kind | When | Reported as |
//! |------|------|-------------|
//! | [`ParseError`] | tokenizing or schema conversion | error, before anything runs |
//! | [`CommandError::UnknownCommand`] | name not registered | error |
//! | [`Outcome::Disabled`] | enablement predicate false | debug log only |
//! | [`CommandError::Cancelled`] | user aborted a prompt | warning, transaction rolled back |
//! | [`CommandError::NothingToUndo`] / [`NothingToRedo`](CommandError::NothingToRedo) | empty log | info |
//! | [`CommandError::Unavailable`] | precondition unmet at run time | warning |
//! | anything else | body failed or panicked | error, transaction rolled back |
//!
//! Nothing here ever escapes [`Engine::execute`](crate::engine::Engine::execute):
//! failures become [`Outcome`]s plus a user log entry.

use subcue_core::{DocumentError, TimeError};

use crate::invocation::ParseError;
use crate::worker::JobId;

/// Result alias used by command bodies.
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Failure of a command, a time expression or a target resolution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),

    #[error("cancelled")]
    Cancelled,

    #[error("no subtitles selected")]
    NoSelection,

    /// A precondition does not hold right now (no media, file missing).
    #[error("{0}")]
    Unavailable(String),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error(transparent)]
    Time(#[from] TimeError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Load or save failed.
    #[error("{0}")]
    Persist(#[from] PersistError),

    /// A command left the document or log in a state that must not be
    /// committed. Indicates a bug in the command.
    #[error("internal error: {0}")]
    Invariant(String),

    #[error("command panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

impl CommandError {
    /// Shorthand for [`CommandError::Failed`].
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Shorthand for [`CommandError::Unavailable`].
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Whether this is a user-facing "can't do that now" condition rather
    /// than a failure.
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::NothingToUndo | Self::NothingToRedo | Self::Unavailable(_) | Self::Cancelled
        )
    }
}

/// Persistence collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    #[error("cannot read {path}: {message}")]
    Read { path: String, message: String },
    #[error("cannot write {path}: {message}")]
    Write { path: String, message: String },
    #[error("{path} is not a valid subtitle file: {message}")]
    Format { path: String, message: String },
}

/// How one invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Body ran to completion.
    Completed,
    /// Enablement predicate was false; nothing ran.
    Disabled,
    /// Background work was started; the continuation runs during a later
    /// [`Engine::pump`](crate::engine::Engine::pump).
    Pending(JobId),
    /// User aborted a prompt or the job was cancelled.
    Cancelled,
    /// A benign precondition failed (`nothing to undo`, no media loaded).
    Unavailable(String),
    /// Parse, lookup or run-time failure.
    Failed(CommandError),
}

impl Outcome {
    /// Map a body result onto an outcome.
    #[must_use]
    pub fn from_error(err: CommandError) -> Self {
        match err {
            CommandError::Cancelled => Self::Cancelled,
            CommandError::NothingToUndo
            | CommandError::NothingToRedo
            | CommandError::Unavailable(_) => Self::Unavailable(err.to_string()),
            other => Self::Failed(other),
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_errors_map_to_soft_outcomes() {
        assert_eq!(Outcome::from_error(CommandError::Cancelled), Outcome::Cancelled);
        assert_eq!(
            Outcome::from_error(CommandError::NothingToUndo),
            Outcome::Unavailable("nothing to undo".into())
        );
        assert!(Outcome::from_error(CommandError::failed("boom")).is_failed());
        assert!(CommandError::NothingToRedo.is_benign());
        assert!(!CommandError::NoSelection.is_benign());
    }

    #[test]
    fn time_errors_convert() {
        let err: CommandError = TimeError::NoTimecodes.into();
        assert_eq!(err.to_string(), "timecode information is not available");
    }
}
