//! Raw watcher interface
//!
//! A raw watcher observes one directory and reports unprocessed notifications
//! into a [`RawSink`]. Sinks are called from backend threads and must never
//! block.

use crate::config::NotifyFilters;
use crate::error::{Result, WatchError};
use crate::filters::FilenameFilter;
use fsnorm_core::RawNotification;
use std::path::PathBuf;
use std::sync::Arc;

/// Receiver of raw notifications and backend errors
pub trait RawSink: Send + Sync {
    fn notify(&self, notification: RawNotification);

    fn error(&self, error: WatchError);
}

/// Handle to one running raw watcher
///
/// Dropping the handle releases OS resources as well.
pub trait RawWatcher: Send + Sync {
    /// Stop delivering notifications and release OS resources
    fn stop(&mut self);
}

/// Creates raw watchers for directory roots
pub trait RawWatcherFactory: Send + Sync {
    fn start(&self, options: &WatchOptions, sink: Arc<dyn RawSink>) -> Result<Box<dyn RawWatcher>>;
}

/// Parameters forwarded to a raw watcher
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub path: PathBuf,
    pub recursive: bool,
    pub notify_filters: NotifyFilters,
    pub filters: Arc<FilenameFilter>,
}

impl WatchOptions {
    /// Same options, different directory
    pub fn for_path(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }
}
