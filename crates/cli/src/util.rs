//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use fsnorm_core::{ChangeKind, NormalizedEvent};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Default filter when RUST_LOG is unset
const DEFAULT_LOG_FILTER: &str = "warn,fsnorm_watcher=info";

/// Install the global tracing subscriber
///
/// Logs go to stderr, or to `log_file` when given. The returned guard must be
/// kept alive until exit so buffered file output is flushed.
pub fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let Some(log_file) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .context("Log file path has no file name")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

/// One event as printed in `--json` mode
#[derive(Serialize)]
pub struct EventLine<'a> {
    pub time: String,
    #[serde(flatten)]
    pub event: &'a NormalizedEvent,
}

/// Format an event as a JSON line
pub fn format_json(event: &NormalizedEvent, at: DateTime<Local>) -> Result<String> {
    let line = EventLine {
        time: at.to_rfc3339(),
        event,
    };
    Ok(serde_json::to_string(&line)?)
}

/// Format an event as a colored text line
pub fn format_text(event: &NormalizedEvent, at: DateTime<Local>) -> String {
    let time = at.format("%H:%M:%S%.3f").to_string();
    let kind = format!("{:<8}", event.change_kind.as_str());
    let kind = match event.change_kind {
        ChangeKind::Created => kind.green().to_string(),
        ChangeKind::Changed => kind.yellow().to_string(),
        ChangeKind::Deleted => kind.red().to_string(),
        ChangeKind::Renamed => kind.cyan().to_string(),
    };

    match &event.old_full_path {
        Some(old) => format!(
            "{} {} {} {} {}",
            time.dimmed(),
            kind,
            old.display(),
            "->".dimmed(),
            event.full_path.display()
        ),
        None => format!("{} {} {}", time.dimmed(), kind, event.full_path.display()),
    }
}
