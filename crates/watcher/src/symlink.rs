//! Symlink-aware fan-out over raw watchers
//!
//! Native watchers do not descend into symlinked directories. The set keeps
//! one extra raw watcher per symlinked directory below the root and forwards
//! every member's notifications into a single sink.
//!
//! Registration happens at init (for existing links) and whenever a member
//! reports a Created symlinked directory. A Deleted notification for a
//! registered member retires its watcher: it stops receiving coverage at once
//! and is released by the next [`SymlinkWatcherSet::stop`]. Member callbacks
//! run on backend threads, and a backend cannot stop itself from its own
//! callback. The root is only ever released by `stop`.

use crate::error::{Result, WatchError};
use crate::raw::{RawSink, RawWatcher, RawWatcherFactory, WatchOptions};
use dashmap::DashMap;
use fsnorm_core::{RawKind, RawNotification};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File system queries needed for symlink discovery
pub trait FsProbe: Send + Sync {
    /// True when `path` is a symbolic link pointing at a directory
    fn is_symlink_dir(&self, path: &Path) -> bool;

    /// Every symlinked directory below `root`, following links
    fn symlinked_dirs(&self, root: &Path) -> Vec<PathBuf>;
}

/// [`FsProbe`] backed by the real file system
#[derive(Debug, Default, Clone, Copy)]
pub struct StdProbe;

impl FsProbe for StdProbe {
    fn is_symlink_dir(&self, path: &Path) -> bool {
        let is_link = std::fs::symlink_metadata(path)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        is_link && path.is_dir()
    }

    fn symlinked_dirs(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .follow_links(true)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    // Link loops and unreadable directories end up here
                    debug!("skipping during symlink scan: {}", e);
                    None
                }
            })
            .filter(|entry| entry.path_is_symlink() && entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect()
    }
}

struct SetInner {
    root: PathBuf,
    options: WatchOptions,
    factory: Arc<dyn RawWatcherFactory>,
    probe: Arc<dyn FsProbe>,
    downstream: Arc<dyn RawSink>,
    watchers: DashMap<PathBuf, Box<dyn RawWatcher>>,
    /// Removed from the registry by a callback, awaiting `stop`
    retired: Mutex<Vec<Box<dyn RawWatcher>>>,
    stopped: AtomicBool,
}

/// Raw watchers for a root and every symlinked directory below it
pub struct SymlinkWatcherSet {
    inner: Arc<SetInner>,
}

impl SymlinkWatcherSet {
    pub fn new(
        options: WatchOptions,
        factory: Arc<dyn RawWatcherFactory>,
        probe: Arc<dyn FsProbe>,
        downstream: Arc<dyn RawSink>,
    ) -> Self {
        Self {
            inner: Arc::new(SetInner {
                root: options.path.clone(),
                options,
                factory,
                probe,
                downstream,
                watchers: DashMap::new(),
                retired: Mutex::new(Vec::new()),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Register the root watcher and one watcher per existing symlinked directory
    ///
    /// Only a failure to watch the root is returned.
    pub fn init(&self) -> Result<()> {
        let root = self.inner.root.clone();
        SetInner::register(&self.inner, &root)?;

        if self.inner.options.recursive {
            for dir in self.inner.probe.symlinked_dirs(&root) {
                SetInner::try_register(&self.inner, &dir);
            }
        }
        Ok(())
    }

    /// Paths that currently have a raw watcher, sorted
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.inner.watchers.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.inner.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.watchers.is_empty()
    }

    /// Number of retired watchers not yet released
    pub fn retired_len(&self) -> usize {
        self.inner.retired.lock().len()
    }

    /// Stop and drop every raw watcher, retired ones included
    ///
    /// Must not be called from a member's callback.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);

        let paths: Vec<PathBuf> = self.inner.watchers.iter().map(|e| e.key().clone()).collect();
        for path in paths {
            self.inner.unregister(&path);
        }

        let retired = std::mem::take(&mut *self.inner.retired.lock());
        for mut watcher in retired {
            watcher.stop();
        }
    }
}

impl Drop for SymlinkWatcherSet {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SetInner {
    fn register(this: &Arc<Self>, path: &Path) -> Result<()> {
        if this.stopped.load(Ordering::SeqCst) {
            return Err(WatchError::Stopped);
        }

        info!("Registering raw watcher for {}", path.display());
        let sink = Arc::new(MemberSink {
            set: Arc::downgrade(this),
            root: path.to_path_buf(),
        });
        let watcher = this.factory.start(&this.options.for_path(path), sink)?;

        // Lost a race with another registration of the same path
        if let Some(mut previous) = this.watchers.insert(path.to_path_buf(), watcher) {
            previous.stop();
        }
        Ok(())
    }

    fn try_register(this: &Arc<Self>, path: &Path) {
        if !this.options.recursive || this.watchers.contains_key(path) {
            return;
        }
        if !this.probe.is_symlink_dir(path) {
            return;
        }

        debug!("{} is a symlinked directory, adding a watcher", path.display());
        if let Err(e) = Self::register(this, path) {
            warn!("Failed to register watcher for '{}': {}", path.display(), e);
        }
    }

    fn unregister(&self, path: &Path) {
        // Stop outside the map lock
        let removed = self.watchers.remove(path);
        if let Some((path, mut watcher)) = removed {
            debug!("Unregistering raw watcher for {}", path.display());
            watcher.stop();
        }
    }

    /// Take a member out of the registry without stopping it
    ///
    /// Safe from backend callbacks: the handle is neither stopped nor dropped here.
    fn retire(&self, path: &Path) {
        let removed = self.watchers.remove(path);
        if let Some((path, watcher)) = removed {
            debug!("Retiring raw watcher for {}", path.display());
            self.retired.lock().push(watcher);
        }
    }
}

/// Sink handed to each member watcher
struct MemberSink {
    set: Weak<SetInner>,
    /// Directory this member watches
    root: PathBuf,
}

impl RawSink for MemberSink {
    fn notify(&self, notification: RawNotification) {
        let Some(set) = self.set.upgrade() else {
            return;
        };

        let kind = notification.kind;
        let path = notification.path.clone();
        set.downstream.notify(notification);

        match kind {
            RawKind::Created => SetInner::try_register(&set, &path),
            RawKind::Deleted if path == set.root => {
                debug!("watch root {} deleted", path.display());
            }
            RawKind::Deleted if set.watchers.contains_key(&path) => {
                debug!(
                    "watched directory {} deleted (reported by {})",
                    path.display(),
                    self.root.display()
                );
                set.retire(&path);
            }
            _ => {}
        }
    }

    fn error(&self, error: WatchError) {
        if let Some(set) = self.set.upgrade() {
            set.downstream.error(error);
        }
    }
}
