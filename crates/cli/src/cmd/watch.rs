//! Watch a directory and print normalized events

use crate::{system_config, util};
use anyhow::{Context, Result};
use chrono::Local;
use fsnorm_watcher::{Subscribers, TokioContext, WatchConfig, WatchSession};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Command-line overrides for the watch command
#[derive(Debug, Default)]
pub struct WatchArgs {
    pub root: PathBuf,
    pub recursive: bool,
    pub filters: Vec<String>,
    pub delay_ms: Option<u64>,
    pub spam_threshold_secs: Option<u64>,
    pub json: bool,
    pub exit_after_ms: Option<u64>,
}

impl WatchArgs {
    /// Apply flags on top of file configuration
    pub fn apply(&self, mut config: WatchConfig) -> WatchConfig {
        config.root = self.root.clone();
        if self.recursive {
            config.recursive = true;
        }
        if !self.filters.is_empty() {
            config.filters = self.filters.clone();
        }
        if let Some(delay_ms) = self.delay_ms {
            config.debounce.delay_ms = delay_ms;
        }
        if let Some(secs) = self.spam_threshold_secs {
            config.debounce.spam_threshold_secs = secs;
        }
        config
    }
}

pub async fn run(config_path: Option<&Path>, args: WatchArgs) -> Result<()> {
    let config = args.apply(system_config::load(config_path)?);
    let root = config.root.clone();

    let mut session = WatchSession::builder(config)
        .subscribers(printing_subscribers(args.json))
        .context(Arc::new(TokioContext::current()?))
        .start()
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    if !args.json {
        eprintln!(
            "{} {} {}",
            "Watching".bold(),
            root.display().to_string().cyan(),
            "(Ctrl-C to stop)".dimmed()
        );
    }

    wait_for_exit(&session, args.exit_after_ms.map(Duration::from_millis)).await;

    info!("Stopping watch of {}", root.display());
    tokio::task::spawn_blocking(move || session.stop())
        .await
        .context("Failed to join watch session")?
}

/// Subscribers that print every event to stdout
fn printing_subscribers(json: bool) -> Subscribers {
    Subscribers::new()
        .on_any(move |_, event| {
            let now = Local::now();
            if json {
                println!("{}", util::format_json(event, now)?);
            } else {
                println!("{}", util::format_text(event, now));
            }
            Ok(())
        })
        .on_error(|root, error| {
            eprintln!("{} {}: {}", "error".red().bold(), root.display(), error);
            Ok(())
        })
}

/// Wait for Ctrl-C, the optional deadline, or the session ending on its own
async fn wait_for_exit(session: &WatchSession, exit_after: Option<Duration>) {
    let deadline = async {
        match exit_after {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };

    let ended = async {
        let mut tick = tokio::time::interval(Duration::from_millis(100));
        while session.is_running() {
            tick.tick().await;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = deadline => info!("Exit timer elapsed"),
        _ = ended => info!("Watch session ended"),
    }
}
