//! notify event -> raw notification translation

use crate::config::NotifyFilters;
use crate::filters::FilenameFilter;
use fsnorm_core::RawNotification;
use notify::event::{CreateKind, MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use std::path::Path;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    File,
    Dir,
    Unknown,
}

impl Entry {
    /// Look at the file system when the backend did not say
    fn probe(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Entry::Dir,
            Ok(_) => Entry::File,
            Err(_) => Entry::Unknown,
        }
    }

    fn name_changes_allowed(self, mask: NotifyFilters) -> bool {
        match self {
            Entry::File => mask.contains(NotifyFilters::FILE_NAME),
            Entry::Dir => mask.contains(NotifyFilters::DIRECTORY_NAME),
            Entry::Unknown => {
                mask.intersects(NotifyFilters::FILE_NAME | NotifyFilters::DIRECTORY_NAME)
            }
        }
    }
}

/// Translate one notify event into raw notifications
///
/// Notifications not covered by `mask` or whose file names fail `filters`
/// are dropped. Renames reported as separate halves with a tracker are skipped
/// because notify follows them up with a combined event.
pub fn translate(
    event: &Event,
    mask: NotifyFilters,
    filters: &FilenameFilter,
) -> Vec<RawNotification> {
    trace!("notify event: {:?}", event);

    let mut out = Vec::with_capacity(event.paths.len());

    match event.kind {
        EventKind::Create(kind) => {
            for path in &event.paths {
                let entry = match kind {
                    CreateKind::File => Entry::File,
                    CreateKind::Folder => Entry::Dir,
                    _ => Entry::probe(path),
                };
                if entry.name_changes_allowed(mask) {
                    out.push(RawNotification::created(path));
                }
            }
        }

        EventKind::Remove(kind) => {
            let entry = match kind {
                RemoveKind::File => Entry::File,
                RemoveKind::Folder => Entry::Dir,
                _ => Entry::Unknown,
            };
            if entry.name_changes_allowed(mask) {
                out.extend(event.paths.iter().map(RawNotification::deleted));
            }
        }

        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(event, mode, mask, &mut out),

        EventKind::Modify(modify) => {
            if content_change_allowed(modify, mask) {
                out.extend(event.paths.iter().map(RawNotification::changed));
            }
        }

        EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
    }

    out.retain(|n| filters.matches_any(&n.path, n.old_path.as_deref()));

    if !out.is_empty() {
        debug!("translated {:?} into {} notifications", event.kind, out.len());
    }
    out
}

fn translate_rename(event: &Event, mode: RenameMode, mask: NotifyFilters, out: &mut Vec<RawNotification>) {
    let tracked = event.attrs.tracker().is_some();

    match (mode, event.paths.as_slice()) {
        (RenameMode::Both, [from, to, ..]) => {
            if Entry::probe(to).name_changes_allowed(mask) {
                out.push(RawNotification::renamed(from, to));
            }
        }

        // Halves of a tracked rename are reported again as `Both`
        (RenameMode::From | RenameMode::To, _) if tracked => {}

        (RenameMode::From, paths) => {
            if Entry::Unknown.name_changes_allowed(mask) {
                out.extend(paths.iter().map(RawNotification::deleted));
            }
        }

        (RenameMode::To, paths) => {
            for path in paths {
                if Entry::probe(path).name_changes_allowed(mask) {
                    out.push(RawNotification::created(path));
                }
            }
        }

        // Direction unknown: whatever exists now was renamed in
        (_, paths) => {
            for path in paths {
                let entry = Entry::probe(path);
                if !entry.name_changes_allowed(mask) {
                    continue;
                }
                if path.exists() {
                    out.push(RawNotification::created(path));
                } else {
                    out.push(RawNotification::deleted(path));
                }
            }
        }
    }
}

fn content_change_allowed(modify: ModifyKind, mask: NotifyFilters) -> bool {
    match modify {
        ModifyKind::Data(_) => mask.intersects(NotifyFilters::LAST_WRITE | NotifyFilters::SIZE),
        ModifyKind::Metadata(MetadataKind::WriteTime) => mask.contains(NotifyFilters::LAST_WRITE),
        ModifyKind::Metadata(MetadataKind::AccessTime) => mask.contains(NotifyFilters::LAST_ACCESS),
        ModifyKind::Metadata(
            MetadataKind::Permissions | MetadataKind::Ownership | MetadataKind::Extended,
        ) => mask.intersects(NotifyFilters::ATTRIBUTES | NotifyFilters::SECURITY),
        ModifyKind::Metadata(_) => mask.intersects(
            NotifyFilters::ATTRIBUTES | NotifyFilters::LAST_WRITE | NotifyFilters::SECURITY,
        ),
        ModifyKind::Any | ModifyKind::Other => mask.intersects(
            NotifyFilters::LAST_WRITE | NotifyFilters::SIZE | NotifyFilters::ATTRIBUTES,
        ),
        ModifyKind::Name(_) => false,
    }
}
