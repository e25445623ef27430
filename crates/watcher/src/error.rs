//! Error types for watch sessions and raw backends

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while starting or running a watch
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch root does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("watch root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("invalid filename filter '{pattern}': {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("watch backend error: {0}")]
    Backend(#[from] notify::Error),

    /// The backend dropped notifications and the tree must be rescanned
    #[error("watch backend overflowed, notifications were lost for {0}")]
    Overflow(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watcher has been stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, WatchError>;
