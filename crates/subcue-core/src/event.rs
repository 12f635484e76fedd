#![forbid(unsafe_code)]

//! Subtitle events.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable reference to a subtitle event.
///
/// Ids are allocated by the owning [`Document`](crate::document::Document)
/// and are never reused within a document's lifetime, so they stay valid
/// across insertions, deletions and reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw id value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-event margin overrides, in script pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Margins {
    pub left: i32,
    pub right: i32,
    pub vertical: i32,
}

/// One subtitle line.
///
/// `start` and `end` are milliseconds. Nothing forces `start <= end` or any
/// ordering between events; commands that care normalize explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleEvent {
    #[serde(skip)]
    pub(crate) id: Option<EventId>,
    pub start: i64,
    pub end: i64,
    pub text: String,
    pub note: String,
    pub actor: String,
    pub style: String,
    pub effect: String,
    pub layer: i32,
    pub margins: Margins,
    pub is_comment: bool,
}

impl Default for SubtitleEvent {
    fn default() -> Self {
        Self {
            id: None,
            start: 0,
            end: 0,
            text: String::new(),
            note: String::new(),
            actor: String::new(),
            style: "Default".to_owned(),
            effect: String::new(),
            layer: 0,
            margins: Margins::default(),
            is_comment: false,
        }
    }
}

impl SubtitleEvent {
    /// Create a detached event spanning `start..end`.
    #[must_use]
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    /// Builder-style text setter.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder-style note setter.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Builder-style actor setter.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Id assigned by the owning document, `None` while detached.
    #[must_use]
    pub fn id(&self) -> Option<EventId> {
        self.id
    }

    /// `end - start`, which may be negative for malformed input.
    #[must_use]
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    /// Midpoint, used when picking the event nearest to a time.
    #[must_use]
    pub fn center(&self) -> i64 {
        self.start + self.duration() / 2
    }

    /// Copy of the event with the document identity stripped.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }

    /// Compare everything except identity.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.detached() == other.detached()
    }
}
