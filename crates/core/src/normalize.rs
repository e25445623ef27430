//! Event normalization
//!
//! Raw watch backends report bursts of duplicated, reordered and sometimes
//! contradictory notifications. A normalization pass reduces one ordered batch
//! to the minimal set of semantic events:
//!
//! 1. Per-path merging in arrival order (create+delete cancel, delete+create
//!    becomes a change, rename chains collapse, ...)
//! 2. Deleted-subtree suppression: a deletion below an already reported
//!    deleted directory is dropped
//!
//! Normalization is pure and total: any batch produces output, malformed
//! entries (such as a rename without an old path) simply match no prior entry.

use crate::event::{ChangeKind, NormalizedEvent, RawNotification};
use crate::index::PathEventIndex;
use smallvec::SmallVec;
use std::ffi::OsStr;
use std::path::{Path, MAIN_SEPARATOR};
use tracing::trace;

/// Normalize one batch of raw notifications
///
/// Convenience wrapper around [`Normalizer`] for a complete batch.
pub fn normalize(batch: &[RawNotification]) -> Vec<NormalizedEvent> {
    let mut normalizer = Normalizer::new();
    for notification in batch {
        normalizer.merge(notification);
    }
    normalizer.finish()
}

/// State of one normalization pass
///
/// Feed notifications with [`Normalizer::merge`] in arrival order, then call
/// [`Normalizer::finish`]. The index is owned by the pass and dropped with it.
#[derive(Debug, Default)]
pub struct Normalizer {
    index: PathEventIndex,
}

impl Normalizer {
    /// Start a new pass
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one notification into the pass
    ///
    /// Later notifications can overwrite or cancel earlier ones, never the
    /// other way round.
    pub fn merge(&mut self, new: &RawNotification) {
        let Some(kind) = new.kind.change_kind() else {
            trace!("ignoring log entry for {}", new.path.display());
            return;
        };

        let old = self.index.kind_of(&new.path);

        // Entry the rename started from, only looked up for renames
        let rename_from = match (kind, new.old_path.as_deref()) {
            (ChangeKind::Renamed, Some(from)) => self
                .index
                .get(from)
                .map(|ev| (from, ev.change_kind, ev.old_full_path.clone())),
            _ => None,
        };

        match (kind, old, rename_from) {
            // CREATED then CHANGED: the change is part of the creation
            (ChangeKind::Changed, Some(ChangeKind::Created), _) => {
                trace!("absorbing change into creation of {}", new.path.display());
            }

            // CREATED then DELETED: nothing visible happened
            (ChangeKind::Deleted, Some(ChangeKind::Created), _) => {
                trace!("create+delete cancel out for {}", new.path.display());
                self.index.remove(&new.path);
            }

            // DELETED then CREATED: the path was rewritten
            (ChangeKind::Created, Some(ChangeKind::Deleted), _) => {
                trace!("delete+create becomes change for {}", new.path.display());
                self.index.set_kind(&new.path, ChangeKind::Changed);
            }

            // A fresh file renamed onto a path deleted in the same batch
            (ChangeKind::Renamed, Some(ChangeKind::Deleted), Some((from, ChangeKind::Created, _))) => {
                self.collapse_rename(from, NormalizedEvent::changed(new.path.clone()));
            }

            // A fresh file renamed somewhere else: report the final creation only
            (ChangeKind::Renamed, _, Some((from, ChangeKind::Created, _))) => {
                self.collapse_rename(from, NormalizedEvent::created(new.path.clone()));
            }

            // Rename chain: keep the original source, drop the intermediate hop
            (ChangeKind::Renamed, _, Some((from, ChangeKind::Renamed, origin))) => {
                self.collapse_rename(
                    from,
                    NormalizedEvent::new(ChangeKind::Renamed, new.path.clone(), origin),
                );
            }

            // Newest data wins on plain duplicates
            _ => {
                self.index.upsert(NormalizedEvent::new(
                    kind,
                    new.path.clone(),
                    new.old_path.clone(),
                ));
            }
        }
    }

    /// Finish the pass and return the surviving events in insertion order
    pub fn finish(self) -> Vec<NormalizedEvent> {
        suppress_deleted_subtrees(self.index.into_events())
    }

    /// Record the merged event at its new path and forget the rename source
    fn collapse_rename(&mut self, from: &Path, event: NormalizedEvent) {
        trace!(
            "collapsing rename {} -> {} into {}",
            from.display(),
            event.full_path.display(),
            event.change_kind
        );

        // A rename onto its own source removes the entry it just wrote
        self.index.upsert(event);
        self.index.remove(from);
    }
}

/// Drop deletions nested below another deletion of the same pass
///
/// Entries are visited shortest path first so that a directory is seen
/// before its descendants; the surviving entries keep their input order.
pub fn suppress_deleted_subtrees(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut by_length: Vec<usize> = (0..events.len()).collect();
    // Stable sort: equal lengths keep their relative order
    by_length.sort_by_key(|&i| events[i].full_path.as_os_str().len());

    let mut keep = vec![true; events.len()];
    {
        // Borrows `events`, must end before the entries are moved out
        let mut deleted: SmallVec<[&OsStr; 8]> = SmallVec::new();

        for i in by_length {
            let event = &events[i];
            if event.change_kind != ChangeKind::Deleted {
                continue;
            }

            let path = event.full_path.as_os_str();
            if deleted.iter().any(|ancestor| is_descendant(path, ancestor)) {
                trace!("suppressing nested delete of {}", event.full_path.display());
                keep[i] = false;
            } else {
                deleted.push(path);
            }
        }
    }

    events
        .into_iter()
        .zip(keep)
        .filter_map(|(event, keep)| keep.then_some(event))
        .collect()
}

/// True when `path` starts with `ancestor` followed by a path separator
///
/// This is a plain, case-sensitive string test: `/a` is an ancestor of
/// `/a/b` but not of `/ab`.
pub fn is_descendant(path: &OsStr, ancestor: &OsStr) -> bool {
    let path = path.as_encoded_bytes();
    let ancestor = ancestor.as_encoded_bytes();

    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()] == MAIN_SEPARATOR as u8
}
