//! File system watching for fsnorm
//!
//! This crate turns raw, platform-specific watch notifications into
//! normalized events delivered to subscriber callbacks:
//! - Native raw watchers via `notify`, with filename filters and notify masks
//! - Extra raw watchers for symlinked directories
//! - Quiet-period debouncing with spam detection
//! - Per-kind dispatch, optionally marshaled onto another thread or runtime
//!
//! Start with [`WatchSession::start`].

pub mod config;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod filters;
pub mod platform;
pub mod queue;
pub mod raw;
pub mod session;
pub mod symlink;

// Re-exports
pub use config::{DebounceConfig, NotifyFilters, WatchConfig};
pub use dispatch::{DispatchContext, Dispatcher, Subscribers, ThreadContext, TokioContext};
pub use error::WatchError;
pub use filters::FilenameFilter;
pub use platform::NotifyWatcherFactory;
pub use raw::{RawSink, RawWatcher, RawWatcherFactory, WatchOptions};
pub use session::{WatchSession, WatchSessionBuilder};
pub use symlink::{FsProbe, StdProbe, SymlinkWatcherSet};

pub use fsnorm_core::{ChangeKind, NormalizedEvent, RawKind, RawNotification};
