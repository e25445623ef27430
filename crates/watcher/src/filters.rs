//! Filename filters applied at the raw watcher
//!
//! Filters are glob patterns matched against the final path component only,
//! like shell wildcards (`*.txt`, `report-??.csv`). A notification passes when
//! its file name matches any pattern. No patterns, `*` and `*.*` all match
//! everything, including names without an extension.

use crate::error::{Result, WatchError};
use ignore::overrides::{Override, OverrideBuilder};
use std::path::Path;

/// Compiled set of filename filters
#[derive(Debug, Clone)]
pub struct FilenameFilter {
    /// Original patterns, for logging and sub-watcher registration
    patterns: Vec<String>,

    /// Compiled whitelist, `None` when everything matches
    matcher: Option<Override>,
}

impl FilenameFilter {
    /// Filter that lets every notification through
    pub fn match_all() -> Self {
        Self {
            patterns: vec![],
            matcher: None,
        }
    }

    /// Compile filename patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();

        if patterns.is_empty() || patterns.iter().any(|p| is_wildcard(p)) {
            return Ok(Self {
                patterns,
                matcher: None,
            });
        }

        // Patterns without a slash match a bare file name at any depth
        let mut builder = OverrideBuilder::new("/");
        builder
            .case_insensitive(cfg!(windows))
            .map_err(|source| WatchError::InvalidFilter {
                pattern: patterns.join(", "),
                source,
            })?;

        for pattern in &patterns {
            builder
                .add(pattern)
                .map_err(|source| WatchError::InvalidFilter {
                    pattern: pattern.clone(),
                    source,
                })?;
        }

        let matcher = builder.build().map_err(|source| WatchError::InvalidFilter {
            pattern: patterns.join(", "),
            source,
        })?;

        Ok(Self {
            patterns,
            matcher: Some(matcher),
        })
    }

    /// Check if the file name of `path` passes the filters
    pub fn matches(&self, path: &Path) -> bool {
        let Some(matcher) = &self.matcher else {
            return true;
        };

        match path.file_name() {
            Some(name) => matcher.matched(Path::new(name), false).is_whitelist(),
            None => false,
        }
    }

    /// Check if any of a notification's paths passes the filters
    pub fn matches_any(&self, path: &Path, old_path: Option<&Path>) -> bool {
        self.matches(path) || old_path.is_some_and(|old| self.matches(old))
    }

    pub fn is_match_all(&self) -> bool {
        self.matcher.is_none()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for FilenameFilter {
    fn default() -> Self {
        Self::match_all()
    }
}

fn is_wildcard(pattern: &str) -> bool {
    matches!(pattern.trim(), "*" | "*.*")
}
