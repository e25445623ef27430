//! Raw watchers backed by the platform's native notification API
//!
//! Uses `notify`'s recommended watcher (inotify, FSEvents, ReadDirectoryChangesW
//! or kqueue) and translates its events into
//! [`RawNotification`](fsnorm_core::RawNotification)s.

mod translate;

pub use translate::translate;

use crate::error::{Result, WatchError};
use crate::raw::{RawSink, RawWatcher, RawWatcherFactory, WatchOptions};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Factory for native raw watchers
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyWatcherFactory;

impl RawWatcherFactory for NotifyWatcherFactory {
    fn start(&self, options: &WatchOptions, sink: Arc<dyn RawSink>) -> Result<Box<dyn RawWatcher>> {
        let root = options.path.clone();
        let mask = options.notify_filters;
        let filters = Arc::clone(&options.filters);

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.need_rescan() {
                    sink.error(WatchError::Overflow(root.clone()));
                }
                for notification in translate(&event, mask, &filters) {
                    sink.notify(notification);
                }
            }
            Err(e) => sink.error(WatchError::Backend(e)),
        };

        let mut watcher = RecommendedWatcher::new(handler, notify::Config::default())?;
        let mode = if options.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&options.path, mode)?;

        info!(
            "Watching {} ({})",
            options.path.display(),
            if options.recursive { "recursive" } else { "non-recursive" }
        );

        Ok(Box::new(NotifyRawWatcher {
            path: options.path.clone(),
            watcher: Mutex::new(Some(watcher)),
        }))
    }
}

/// One native watcher for one directory
pub struct NotifyRawWatcher {
    path: PathBuf,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl RawWatcher for NotifyRawWatcher {
    fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.get_mut().take() {
            if let Err(e) = watcher.unwatch(&self.path) {
                debug!("unwatch {} failed: {}", self.path.display(), e);
            }
            info!("Stopped watching {}", self.path.display());
        }
    }
}

impl Drop for NotifyRawWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
