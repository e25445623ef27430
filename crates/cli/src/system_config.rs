//! Configuration file loading
//!
//! The config file holds a `WatchConfig` in TOML. Every key is optional;
//! command-line flags override whatever the file sets.

use anyhow::{Context, Result};
use fsnorm_watcher::WatchConfig;
use std::path::{Path, PathBuf};

/// Default config file location: `<config dir>/fsnorm/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fsnorm").join("config.toml"))
}

/// Load configuration
///
/// An explicit path must exist. The default location is optional and falls
/// back to built-in defaults when missing.
pub fn load(explicit: Option<&Path>) -> Result<WatchConfig> {
    match explicit {
        Some(path) => load_file(path),
        None => match config_file_path() {
            Some(path) if path.exists() => load_file(&path),
            _ => Ok(WatchConfig::default()),
        },
    }
}

fn load_file(path: &Path) -> Result<WatchConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn parse(content: &str) -> Result<WatchConfig> {
    Ok(toml::from_str(content)?)
}

/// Annotated example configuration
pub fn example_config() -> &'static str {
    r#"# fsnorm configuration
#
# Every key is optional. Command-line flags take precedence.

# Directory to watch (usually given on the command line)
# root = "/path/to/watch"

# Watch subdirectories too
recursive = false

# Filename filters; empty, "*" or "*.*" match everything
filters = []

# Attributes that trigger notifications, any of:
# FILE_NAME | DIRECTORY_NAME | ATTRIBUTES | SIZE | LAST_WRITE |
# LAST_ACCESS | CREATION_TIME | SECURITY
notify_filters = "FILE_NAME | DIRECTORY_NAME | LAST_WRITE"

[debounce]
# Quiet period before a burst of changes is reported
delay_ms = 50

# Warn when changes keep arriving for this long without a quiet period
spam_threshold_secs = 60
"#
}
