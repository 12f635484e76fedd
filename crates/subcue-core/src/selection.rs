#![forbid(unsafe_code)]

//! Event selection.
//!
//! A [`Selection`] is a set of [`EventId`]s kept in document order and stamped
//! with the document generation it was last validated against. Positions are
//! never stored; they are recomputed on demand, so a selection cannot point
//! at the wrong line after an insertion shifts everything below it.

use crate::document::Document;
use crate::event::{EventId, SubtitleEvent};

/// Ordered set of selected events.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: Vec<EventId>,
    generation: u64,
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for Selection {}

impl Selection {
    /// Empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection of `ids`, validated against `doc`.
    #[must_use]
    pub fn of(doc: &Document, ids: &[EventId]) -> Self {
        let mut sel = Self::new();
        sel.set(doc, ids);
        sel
    }

    /// Selection of the events at `indexes`.
    #[must_use]
    pub fn of_indexes(doc: &Document, indexes: &[usize]) -> Self {
        Self::of(doc, &doc.ids_at(indexes))
    }

    /// Replace the selection. Unknown ids are dropped and order follows the
    /// document.
    pub fn set(&mut self, doc: &Document, ids: &[EventId]) {
        self.ids = doc
            .positions(ids)
            .into_iter()
            .filter_map(|i| doc.id_at(i))
            .collect();
        self.generation = doc.generation();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    #[must_use]
    pub fn ids(&self) -> &[EventId] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: EventId) -> bool {
        self.ids.contains(&id)
    }

    /// Whether the stamp matches the document's current generation.
    #[must_use]
    pub fn is_current(&self, doc: &Document) -> bool {
        self.generation == doc.generation()
    }

    /// Drop ids that no longer exist and restore document order. Returns
    /// `true` when the selection changed.
    pub fn revalidate(&mut self, doc: &Document) -> bool {
        if self.is_current(doc) {
            return false;
        }
        let before = self.ids.clone();
        let ids = std::mem::take(&mut self.ids);
        self.set(doc, &ids);
        before != self.ids
    }

    /// Selected positions in ascending order. Stale ids are skipped.
    #[must_use]
    pub fn indexes(&self, doc: &Document) -> Vec<usize> {
        doc.positions(&self.ids)
    }

    /// Selected events in document order.
    #[must_use]
    pub fn events<'d>(&self, doc: &'d Document) -> Vec<&'d SubtitleEvent> {
        self.indexes(doc)
            .into_iter()
            .filter_map(|i| doc.get(i))
            .collect()
    }

    #[must_use]
    pub fn first_index(&self, doc: &Document) -> Option<usize> {
        self.indexes(doc).first().copied()
    }

    #[must_use]
    pub fn last_index(&self, doc: &Document) -> Option<usize> {
        self.indexes(doc).last().copied()
    }
}
