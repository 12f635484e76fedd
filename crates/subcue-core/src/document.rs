#![forbid(unsafe_code)]

//! The subtitle document.
//!
//! A [`Document`] owns the ordered event list, style definitions and script
//! metadata. All collections are persistent (`im`) so cloning a document is
//! O(1) and snapshots for undo share structure with the live copy.
//!
//! # Identity
//!
//! Events are addressed two ways:
//!
//! - **position**: index in document order, what users see as line numbers
//!   (1-based in the UI, 0-based here);
//! - **[`EventId`]**: stable reference allocated on insertion, never reused.
//!
//! # Generation
//!
//! Every structural change (insert, remove, reorder, restore) bumps
//! [`generation`](Document::generation). Field edits do not. Holders of
//! positions or selections compare generations to know when to revalidate.
//!
//! # Invariants
//!
//! 1. Every stored event has an id, and ids are unique.
//! 2. Every id is below the allocator watermark.
//! 3. Equality compares content and ids; generation and watermark are
//!    bookkeeping and excluded.

use std::ops::Range;

use ahash::{AHashMap, AHashSet};
use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

use crate::event::{EventId, SubtitleEvent};

/// Errors raised by document mutations and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// A position is past the end of the event list.
    #[error("position {index} is out of range (document has {len} events)")]
    OutOfRange { index: usize, len: usize },
    /// No event carries this id.
    #[error("no event with id {0}")]
    UnknownId(EventId),
    /// Structural validation failed.
    #[error("document is structurally invalid: {0}")]
    Invalid(String),
}

/// A named style. Attributes are opaque to the editing core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Style {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
}

impl Style {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }
}

/// Serializable, identity-free form of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentData {
    pub events: Vec<SubtitleEvent>,
    pub styles: Vec<Style>,
    pub meta: Vec<(String, String)>,
}

/// Ordered subtitle events plus styles and metadata.
#[derive(Debug, Clone, Default)]
pub struct Document {
    events: Vector<SubtitleEvent>,
    styles: Vector<Style>,
    meta: OrdMap<String, String>,
    next_id: u64,
    generation: u64,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.events == other.events && self.styles == other.styles && self.meta == other.meta
    }
}

impl Eq for Document {}

impl Document {
    /// Empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from its serialized form, allocating fresh ids.
    #[must_use]
    pub fn from_data(data: DocumentData) -> Self {
        let mut doc = Self::new();
        for ev in data.events {
            doc.push(ev);
        }
        doc.styles = data.styles.into_iter().collect();
        doc.meta = data.meta.into_iter().collect();
        doc
    }

    /// Identity-free copy suitable for serialization.
    #[must_use]
    pub fn to_data(&self) -> DocumentData {
        DocumentData {
            events: self.events.iter().map(SubtitleEvent::detached).collect(),
            styles: self.styles.iter().cloned().collect(),
            meta: self
                .meta
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Structural generation counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Events in document order.
    pub fn events(&self) -> impl Iterator<Item = &SubtitleEvent> + '_ {
        self.events.iter()
    }

    /// Event at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SubtitleEvent> {
        self.events.get(index)
    }

    /// Event carrying `id`.
    #[must_use]
    pub fn by_id(&self, id: EventId) -> Option<&SubtitleEvent> {
        self.position(id).and_then(|idx| self.events.get(idx))
    }

    /// Current position of `id`.
    #[must_use]
    pub fn position(&self, id: EventId) -> Option<usize> {
        self.events.iter().position(|ev| ev.id == Some(id))
    }

    /// Id of the event at `index`.
    #[must_use]
    pub fn id_at(&self, index: usize) -> Option<EventId> {
        self.events.get(index).and_then(|ev| ev.id)
    }

    /// Ids of the events at `indexes`, skipping positions out of range.
    #[must_use]
    pub fn ids_at(&self, indexes: &[usize]) -> Vec<EventId> {
        indexes.iter().filter_map(|&i| self.id_at(i)).collect()
    }

    /// Positions of `ids` in ascending document order, skipping unknown ids.
    #[must_use]
    pub fn positions(&self, ids: &[EventId]) -> Vec<usize> {
        let wanted: AHashSet<EventId> = ids.iter().copied().collect();
        self.events
            .iter()
            .enumerate()
            .filter(|(_, ev)| ev.id.is_some_and(|id| wanted.contains(&id)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Map every id to its current position. Stays valid until the next
    /// structural change; field edits through [`update`](Self::update) keep
    /// it accurate.
    #[must_use]
    pub fn id_index(&self) -> AHashMap<EventId, usize> {
        self.events
            .iter()
            .enumerate()
            .filter_map(|(i, ev)| ev.id.map(|id| (id, i)))
            .collect()
    }

    // ========================================================================
    // Structural mutation
    // ========================================================================

    /// Append an event and return its id.
    pub fn push(&mut self, event: SubtitleEvent) -> EventId {
        let id = self.allocate();
        let mut event = event;
        event.id = Some(id);
        self.events.push_back(event);
        self.generation += 1;
        id
    }

    /// Insert an event at `index` (`index == len` appends).
    pub fn insert(&mut self, index: usize, event: SubtitleEvent) -> Result<EventId, DocumentError> {
        Ok(self.insert_many(index, vec![event])?[0])
    }

    /// Insert several events starting at `index`, preserving their order.
    pub fn insert_many(
        &mut self,
        index: usize,
        events: Vec<SubtitleEvent>,
    ) -> Result<Vec<EventId>, DocumentError> {
        if index > self.events.len() {
            return Err(DocumentError::OutOfRange {
                index,
                len: self.events.len(),
            });
        }
        let mut ids = Vec::with_capacity(events.len());
        for (offset, mut event) in events.into_iter().enumerate() {
            let id = self.allocate();
            event.id = Some(id);
            self.events.insert(index + offset, event);
            ids.push(id);
        }
        self.generation += 1;
        Ok(ids)
    }

    /// Remove `count` events starting at `index`.
    pub fn remove(&mut self, index: usize, count: usize) -> Result<Vec<SubtitleEvent>, DocumentError> {
        let end = index.checked_add(count).unwrap_or(usize::MAX);
        if end > self.events.len() {
            return Err(DocumentError::OutOfRange {
                index: end.saturating_sub(1),
                len: self.events.len(),
            });
        }
        let mut tail = self.events.split_off(index);
        let rest = tail.split_off(count);
        self.events.append(rest);
        self.generation += 1;
        Ok(tail.into_iter().collect())
    }

    /// Remove every event whose id is in `ids`; unknown ids are ignored.
    pub fn remove_ids(&mut self, ids: &[EventId]) -> Vec<SubtitleEvent> {
        let doomed: AHashSet<EventId> = ids.iter().copied().collect();
        let (removed, kept): (Vector<_>, Vector<_>) = self
            .events
            .iter()
            .cloned()
            .partition(|ev| ev.id.is_some_and(|id| doomed.contains(&id)));
        if !removed.is_empty() {
            self.events = kept;
            self.generation += 1;
        }
        removed.into_iter().collect()
    }

    /// Move the events in `range` so the block starts at `dest`, where `dest`
    /// is a position in the list with the block removed.
    pub fn move_range(&mut self, range: Range<usize>, dest: usize) -> Result<(), DocumentError> {
        let len = self.events.len();
        if range.start > range.end || range.end > len {
            return Err(DocumentError::OutOfRange {
                index: range.end.saturating_sub(1),
                len,
            });
        }
        let count = range.end - range.start;
        if dest > len - count {
            return Err(DocumentError::OutOfRange { index: dest, len });
        }
        let mut tail = self.events.split_off(range.start);
        let rest = tail.split_off(count);
        self.events.append(rest);
        let after = self.events.split_off(dest);
        self.events.append(tail);
        self.events.append(after);
        self.generation += 1;
        Ok(())
    }

    /// Stable-sort the events in `range` by start time.
    pub fn sort_range_by_start(&mut self, range: Range<usize>) -> Result<(), DocumentError> {
        let len = self.events.len();
        if range.start > range.end || range.end > len {
            return Err(DocumentError::OutOfRange {
                index: range.end.saturating_sub(1),
                len,
            });
        }
        let mut block = self
            .events
            .iter()
            .skip(range.start)
            .take(range.end - range.start)
            .cloned()
            .collect::<Vec<_>>();
        block.sort_by_key(|ev| ev.start);
        for (offset, ev) in block.into_iter().enumerate() {
            self.events.set(range.start + offset, ev);
        }
        self.generation += 1;
        Ok(())
    }

    /// Stable-sort the events at `positions` by start time among
    /// themselves; every other event keeps its slot.
    pub fn sort_by_start_at(&mut self, positions: &[usize]) -> Result<(), DocumentError> {
        let len = self.events.len();
        let mut slots = positions.to_vec();
        slots.sort_unstable();
        slots.dedup();
        if let Some(&last) = slots.last()
            && last >= len
        {
            return Err(DocumentError::OutOfRange { index: last, len });
        }
        let mut picked = slots
            .iter()
            .map(|&i| self.events[i].clone())
            .collect::<Vec<_>>();
        picked.sort_by_key(|ev| ev.start);
        for (slot, ev) in slots.into_iter().zip(picked) {
            self.events.set(slot, ev);
        }
        self.generation += 1;
        Ok(())
    }

    // ========================================================================
    // Field mutation
    // ========================================================================

    /// Edit the event at `index` in place. Identity is preserved whatever the
    /// closure does.
    pub fn update<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut SubtitleEvent) -> R,
    ) -> Result<R, DocumentError> {
        let len = self.events.len();
        let ev = self
            .events
            .get_mut(index)
            .ok_or(DocumentError::OutOfRange { index, len })?;
        let id = ev.id;
        let out = f(ev);
        ev.id = id;
        Ok(out)
    }

    /// Edit the event carrying `id`.
    pub fn update_by_id<R>(
        &mut self,
        id: EventId,
        f: impl FnOnce(&mut SubtitleEvent) -> R,
    ) -> Result<R, DocumentError> {
        let index = self.position(id).ok_or(DocumentError::UnknownId(id))?;
        self.update(index, f)
    }

    // ========================================================================
    // Styles and metadata
    // ========================================================================

    pub fn styles(&self) -> impl Iterator<Item = &Style> + '_ {
        self.styles.iter()
    }

    pub fn style(&self, name: &str) -> Option<&Style> {
        self.styles.iter().find(|s| s.name == name)
    }

    /// Add or replace a style by name.
    pub fn set_style(&mut self, style: Style) {
        match self.styles.iter().position(|s| s.name == style.name) {
            Some(idx) => {
                self.styles.set(idx, style);
            }
            None => self.styles.push_back(style),
        }
    }

    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Replace content with `snapshot`, keeping the id allocator ahead of
    /// every id either copy has handed out.
    pub fn restore(&mut self, snapshot: &Document) {
        self.events = snapshot.events.clone();
        self.styles = snapshot.styles.clone();
        self.meta = snapshot.meta.clone();
        self.next_id = self.next_id.max(snapshot.next_id);
        self.generation += 1;
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut seen = AHashSet::with_capacity(self.events.len());
        for (idx, ev) in self.events.iter().enumerate() {
            let Some(id) = ev.id else {
                return Err(DocumentError::Invalid(format!(
                    "event at position {idx} has no id"
                )));
            };
            if id.get() >= self.next_id {
                return Err(DocumentError::Invalid(format!(
                    "event id {id} is ahead of the allocator"
                )));
            }
            if !seen.insert(id) {
                return Err(DocumentError::Invalid(format!("duplicate event id {id}")));
            }
        }
        Ok(())
    }

    fn allocate(&mut self) -> EventId {
        let id = EventId::new(self.next_id);
        self.next_id += 1;
        id
    }
}
