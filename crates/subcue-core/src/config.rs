#![forbid(unsafe_code)]

//! Errors shared by the hotkey and menu table loaders.

use std::path::PathBuf;

/// A hotkey or menu table could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Section header names an unknown context.
    #[error("line {line}: \"{name}\" is not a valid {table} context")]
    UnknownContext {
        line: usize,
        name: String,
        table: &'static str,
    },
    /// A line could not be split into its parts.
    #[error("syntax error near line #{line} ({text})")]
    Syntax { line: usize, text: String },
    /// A shortcut did not parse.
    #[error("line {line}: invalid shortcut \"{shortcut}\": {reason}")]
    Shortcut {
        line: usize,
        shortcut: String,
        reason: String,
    },
    /// Indented continuation without a binding above it.
    #[error("line {line}: continuation line without a preceding binding")]
    OrphanContinuation { line: usize },
    /// Reading the file failed.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Parsing a file failed; wraps the line-level error.
    #[error("error loading {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

/// Read a table file, attaching the path to any error.
pub(crate) fn read_table<T>(
    path: &std::path::Path,
    parse: impl FnOnce(&str) -> Result<T, ConfigError>,
) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text).map_err(|e| e.in_file(path))
}
