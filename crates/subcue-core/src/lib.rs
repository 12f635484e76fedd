#![forbid(unsafe_code)]

//! Core: subtitle document model, frame timing, selection, hotkey and menu
//! tables.
//!
//! # Role in subcue
//! `subcue-core` is the data layer. It owns the [`Document`] and its events,
//! the [`Selection`] that points into it, the [`Timecodes`] used for frame
//! alignment, and the declarative [`HotkeyTable`]/[`MenuTable`] configuration.
//! Nothing here does I/O beyond reading table files, spawns threads, or knows
//! about commands.
//!
//! # How it fits in the system
//! The runtime (`subcue-runtime`) parses command lines, runs commands against
//! these types and records undo snapshots of them. Because the document is
//! built on persistent `im` collections, those snapshots are O(1) clones.

pub mod config;
pub mod document;
pub mod event;
pub mod keybinding;
pub mod menu;
pub mod selection;
pub mod time;

pub use config::ConfigError;
pub use document::{Document, DocumentData, DocumentError, Style};
pub use event::{EventId, Margins, SubtitleEvent};
pub use keybinding::{Chord, HotkeyBinding, HotkeyChange, HotkeyContext, HotkeyTable, Key, Modifiers};
pub use menu::{MenuContext, MenuItem, MenuTable};
pub use selection::Selection;
pub use time::{TimeError, Timecodes, format_ms};
