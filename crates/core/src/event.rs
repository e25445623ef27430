//! Raw and normalized file system event types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of a raw notification as delivered by a watch backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawKind {
    /// Path appeared
    Created,
    /// Path content or attributes changed
    Changed,
    /// Path disappeared
    Deleted,
    /// Path was renamed (`old_path` -> `path`)
    Renamed,
    /// Diagnostic entry, never normalized
    Log,
}

impl RawKind {
    /// Semantic kind for this raw kind, `None` for log entries
    pub fn change_kind(self) -> Option<ChangeKind> {
        match self {
            RawKind::Created => Some(ChangeKind::Created),
            RawKind::Changed => Some(ChangeKind::Changed),
            RawKind::Deleted => Some(ChangeKind::Deleted),
            RawKind::Renamed => Some(ChangeKind::Renamed),
            RawKind::Log => None,
        }
    }
}

/// One unprocessed signal from a watch backend
///
/// Immutable once queued. For renames `path` is the new location and
/// `old_path` the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNotification {
    /// What happened
    pub kind: RawKind,
    /// Absolute path the notification is about
    pub path: PathBuf,
    /// Previous path, only meaningful for renames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<PathBuf>,
}

impl RawNotification {
    /// Build a notification of the given kind without an old path
    pub fn new(kind: RawKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            old_path: None,
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(RawKind::Created, path)
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self::new(RawKind::Changed, path)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(RawKind::Deleted, path)
    }

    /// Rename from `old_path` to `path`
    pub fn renamed(old_path: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RawKind::Renamed,
            path: path.into(),
            old_path: Some(old_path.into()),
        }
    }

    /// Attach an old path (builder style, mostly for tests and replays)
    pub fn with_old_path(mut self, old_path: impl Into<PathBuf>) -> Self {
        self.old_path = Some(old_path.into());
        self
    }
}

/// Kind of a normalized, externally visible event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
    Renamed,
}

impl ChangeKind {
    /// Lowercase name used in logs and CLI output
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Changed => "changed",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic event produced by one normalization pass
///
/// `old_full_path` is only ever populated for [`ChangeKind::Renamed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub change_kind: ChangeKind,
    pub full_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_full_path: Option<PathBuf>,
}

impl NormalizedEvent {
    /// Build an event, dropping the old path unless the kind is a rename
    pub fn new(change_kind: ChangeKind, full_path: PathBuf, old_full_path: Option<PathBuf>) -> Self {
        let old_full_path = match change_kind {
            ChangeKind::Renamed => old_full_path,
            _ => None,
        };
        Self {
            change_kind,
            full_path,
            old_full_path,
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Created, path.into(), None)
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Changed, path.into(), None)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Deleted, path.into(), None)
    }

    pub fn renamed(old_path: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Renamed, path.into(), Some(old_path.into()))
    }

    /// Current path of the event
    pub fn path(&self) -> &Path {
        &self.full_path
    }
}

impl fmt::Display for NormalizedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old_full_path {
            Some(old) => write!(
                f,
                "{} {} -> {}",
                self.change_kind,
                old.display(),
                self.full_path.display()
            ),
            None => write!(f, "{} {}", self.change_kind, self.full_path.display()),
        }
    }
}
