//! Per-pass path index used while merging raw notifications

use crate::event::{ChangeKind, NormalizedEvent};
use ahash::RandomState;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Insertion-ordered mapping from path to the latest known event for it
///
/// Lookups are by path, but iteration follows the order in which entries
/// were first inserted. Updating an existing entry keeps its position and
/// removing one shifts the rest down without reordering them.
///
/// An index lives for exactly one normalization pass.
#[derive(Debug, Default)]
pub struct PathEventIndex {
    entries: IndexMap<PathBuf, NormalizedEvent, RandomState>,
}

impl PathEventIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for a path
    pub fn get(&self, path: &Path) -> Option<&NormalizedEvent> {
        self.entries.get(path)
    }

    /// Kind of the entry for a path, if any
    pub fn kind_of(&self, path: &Path) -> Option<ChangeKind> {
        self.get(path).map(|ev| ev.change_kind)
    }

    /// Change the kind of an existing entry in place
    ///
    /// Returns false when no entry exists for the path.
    pub fn set_kind(&mut self, path: &Path, kind: ChangeKind) -> bool {
        match self.entries.get_mut(path) {
            Some(entry) => {
                entry.change_kind = kind;
                if kind != ChangeKind::Renamed {
                    entry.old_full_path = None;
                }
                true
            }
            None => false,
        }
    }

    /// Insert a new entry or overwrite kind and old path of an existing one
    ///
    /// An overwritten entry keeps its original position.
    pub fn upsert(&mut self, event: NormalizedEvent) {
        match self.entries.get_mut(event.full_path.as_path()) {
            Some(existing) => {
                existing.change_kind = event.change_kind;
                existing.old_full_path = event.old_full_path;
            }
            None => {
                self.entries.insert(event.full_path.clone(), event);
            }
        }
    }

    /// Remove the entry for a path, preserving the order of the others
    pub fn remove(&mut self, path: &Path) -> Option<NormalizedEvent> {
        self.entries.shift_remove(path)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &NormalizedEvent> {
        self.entries.values()
    }

    /// Consume the index, yielding entries in insertion order
    pub fn into_events(self) -> Vec<NormalizedEvent> {
        self.entries.into_values().collect()
    }
}
