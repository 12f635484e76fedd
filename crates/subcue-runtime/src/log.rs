#![forbid(unsafe_code)]

//! User-visible log.
//!
//! [`UserLog`] forwards every message to the [`Notifier`] collaborator (the
//! status bar or console of the host application), keeps a bounded history
//! for the log window, and mirrors each entry to `tracing` under the
//! `subcue.log` target.

use std::collections::VecDeque;
use std::fmt;

use web_time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warn => "warning",
            Self::Error => "error",
        })
    }
}

/// Non-blocking sink for user-visible messages.
pub trait Notifier {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Notifier that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub text: String,
    pub at: SystemTime,
}

pub struct UserLog {
    notifier: Box<dyn Notifier>,
    history: VecDeque<LogEntry>,
    capacity: usize,
}

impl fmt::Debug for UserLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLog")
            .field("entries", &self.history.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl UserLog {
    #[must_use]
    pub fn new(notifier: Box<dyn Notifier>, capacity: usize) -> Self {
        Self {
            notifier,
            history: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn set_notifier(&mut self, notifier: Box<dyn Notifier>) {
        self.notifier = notifier;
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.trim();
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.log(Level::Info, text.into());
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.log(Level::Warn, text.into());
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.log(Level::Error, text.into());
    }

    pub fn log(&mut self, level: Level, text: String) {
        match level {
            Level::Info => {
                tracing::info!(target: "subcue.log", "{text}");
                self.notifier.info(&text);
            }
            Level::Warn => {
                tracing::warn!(target: "subcue.log", "{text}");
                self.notifier.warn(&text);
            }
            Level::Error => {
                tracing::error!(target: "subcue.log", "{text}");
                self.notifier.error(&text);
            }
        }
        self.history.push_back(LogEntry {
            level,
            text,
            at: SystemTime::now(),
        });
        self.trim();
    }

    fn trim(&mut self) {
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + '_ {
        self.history.iter()
    }

    #[must_use]
    pub fn last(&self) -> Option<&LogEntry> {
        self.history.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for UserLog {
    fn default() -> Self {
        Self::new(Box::new(NullNotifier), 200)
    }
}
