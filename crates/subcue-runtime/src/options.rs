#![forbid(unsafe_code)]

//! Editor options loaded from TOML.
//!
//! ```toml
//! [subs]
//! default_duration = 2000
//! merge_separator = "\\N"
//!
//! [undo]
//! max_depth = 100
//!
//! [engine]
//! worker_threads = 2
//! max_chain_depth = 8
//!
//! [log]
//! history = 200
//!
//! [paths]
//! scripts_dir = "~/.config/subcue/scripts"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub subs: SubsOptions,
    pub undo: UndoOptions,
    pub engine: EngineOptions,
    pub log: LogOptions,
    pub paths: PathOptions,
}

/// Subtitle editing defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsOptions {
    /// Duration of newly inserted subtitles, in milliseconds.
    pub default_duration: i64,
    /// Joins texts of merged subtitles.
    pub merge_separator: String,
}

impl Default for SubsOptions {
    fn default() -> Self {
        Self {
            default_duration: 2000,
            merge_separator: "\\N".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoOptions {
    /// Oldest entries are evicted past this depth.
    pub max_depth: usize,
}

impl Default for UndoOptions {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Background worker threads.
    pub worker_threads: usize,
    /// How deeply script commands may expand into further chains.
    pub max_chain_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            max_chain_depth: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogOptions {
    /// User log entries kept in memory.
    pub history: usize,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self { history: 200 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathOptions {
    /// Directory scanned for user-defined commands.
    pub scripts_dir: Option<PathBuf>,
}

/// Failure to load options.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid options: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid options: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl Options {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, OptionsError> {
        let options: Self = toml::from_str(s)?;
        let errors = options.validate();
        if errors.is_empty() {
            Ok(options)
        } else {
            Err(OptionsError::Validation(errors))
        }
    }

    /// Load from a file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize back to TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Check that values are in range. An empty list means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.subs.default_duration <= 0 {
            errors.push(format!(
                "subs.default_duration must be positive, got {}",
                self.subs.default_duration
            ));
        }
        if self.undo.max_depth == 0 {
            errors.push("undo.max_depth must be at least 1".to_owned());
        }
        if self.engine.worker_threads == 0 {
            errors.push("engine.worker_threads must be at least 1".to_owned());
        }
        if self.engine.max_chain_depth == 0 {
            errors.push("engine.max_chain_depth must be at least 1".to_owned());
        }
        errors
    }
}
