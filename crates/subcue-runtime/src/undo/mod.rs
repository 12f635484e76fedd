#![forbid(unsafe_code)]

//! Undo/redo log with scoped edit capture.
//!
//! Commands that mutate the document open a [`Transaction`] with
//! [`Editor::begin_capture`](crate::context::Editor::begin_capture). The guard
//! snapshots `(document, selection)` on entry; `commit()` validates the result
//! and records a before/after pair, and dropping the guard without committing
//! restores the snapshot. Snapshots are persistent `im` structures, so
//! capturing costs O(1) regardless of document size.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         UndoLog                            │
//! │   Undo stack (oldest..newest)        Redo stack            │
//! │   [e1 e2 e3]        undo() ──────►   [e3]                  │
//! │   [e1 e2 e3]        ◄────── redo()   []                    │
//! │   [e1 e2 e4]        commit(e4) clears redo                 │
//! └────────────────────────────────────────────────────────────┘
//!        ▲ push(entry)
//!        │
//!   Transaction::commit ── validate ── diff before/after
//! ```
//!
//! # Invariants
//!
//! 1. Every entry on either stack holds two structurally valid states.
//! 2. A transaction is recorded whole or not at all.
//! 3. Nested captures reuse the outermost transaction; an inner guard dropped
//!    without commit poisons the outer one, which then rolls back.
//! 4. `undo_depth() <= max_depth` after every push.

mod log;
mod state;
mod transaction;

pub use log::{UndoEntry, UndoLog};
pub use state::UndoState;
pub use transaction::Transaction;

pub(crate) use transaction::Capture;
