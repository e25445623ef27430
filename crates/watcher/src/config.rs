//! Watch session configuration
//!
//! All fields have defaults so partial TOML files and bare `WatchConfig::new`
//! calls both work. The filename filters and notify mask are forwarded to the
//! raw backend as-is.

use crate::error::{Result, WatchError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

bitflags! {
    /// Attributes whose change triggers a notification
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct NotifyFilters: u32 {
        const FILE_NAME = 1;
        const DIRECTORY_NAME = 1 << 1;
        const ATTRIBUTES = 1 << 2;
        const SIZE = 1 << 3;
        const LAST_WRITE = 1 << 4;
        const LAST_ACCESS = 1 << 5;
        const CREATION_TIME = 1 << 6;
        const SECURITY = 1 << 8;
    }
}

impl Default for NotifyFilters {
    fn default() -> Self {
        NotifyFilters::LAST_WRITE | NotifyFilters::FILE_NAME | NotifyFilters::DIRECTORY_NAME
    }
}

/// Configuration of one watch session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory to watch
    #[serde(default)]
    pub root: PathBuf,

    /// Watch subdirectories too (default: false)
    #[serde(default)]
    pub recursive: bool,

    /// Glob-style filename filters (default: everything)
    #[serde(default)]
    pub filters: Vec<String>,

    /// Attributes that trigger notifications
    #[serde(default)]
    pub notify_filters: NotifyFilters,

    /// Quiet period and spam detection
    #[serde(default)]
    pub debounce: DebounceConfig,
}

impl WatchConfig {
    /// Configuration for `root` with every other field defaulted
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn filter(mut self, pattern: impl Into<String>) -> Self {
        self.filters.push(pattern.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.debounce.delay_ms = delay.as_millis() as u64;
        self
    }

    /// Check the configuration before starting a session
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(WatchError::InvalidConfig("root path is empty".to_string()));
        }
        self.debounce.validate()
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            recursive: false,
            filters: vec![],
            notify_filters: NotifyFilters::default(),
            debounce: DebounceConfig::default(),
        }
    }
}

/// Debounce configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Quiet period before a batch is flushed (default: 50)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Busy time before a spam warning is logged (default: 60)
    #[serde(default = "default_spam_threshold_secs")]
    pub spam_threshold_secs: u64,
}

impl DebounceConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn spam_threshold(&self) -> Duration {
        Duration::from_secs(self.spam_threshold_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.delay_ms == 0 {
            return Err(WatchError::InvalidConfig(
                "debounce delay must be at least 1ms".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            spam_threshold_secs: default_spam_threshold_secs(),
        }
    }
}

fn default_delay_ms() -> u64 {
    50
}

fn default_spam_threshold_secs() -> u64 {
    60
}
