//! fsnorm CLI - watch a directory and print normalized change events

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod system_config;
mod util;

/// fsnorm - Clean, debounced file system change events
#[derive(Parser)]
#[command(name = "fsnorm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/fsnorm/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and print one line per normalized event
    Watch {
        /// Directory to watch
        root: PathBuf,

        /// Watch subdirectories too
        #[arg(short, long)]
        recursive: bool,

        /// Filename filter glob (repeatable, e.g. -f '*.rs' -f '*.toml')
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Quiet period before a burst is reported (default: 50)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Busy time before a spam warning is logged (default: 60)
        #[arg(long)]
        spam_threshold_secs: Option<u64>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        /// Stop automatically after this many milliseconds
        #[arg(long)]
        exit_after_ms: Option<u64>,

        /// Write logs to this file instead of stderr
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Show the effective configuration as TOML
    Config {
        /// Print an annotated example configuration instead
        #[arg(long)]
        example: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            root,
            recursive,
            filters,
            delay_ms,
            spam_threshold_secs,
            json,
            exit_after_ms,
            log_file,
        } => {
            let _log_guard = util::init_logging(log_file.as_deref())?;
            let args = cmd::watch::WatchArgs {
                root,
                recursive,
                filters,
                delay_ms,
                spam_threshold_secs,
                json,
                exit_after_ms,
            };
            cmd::watch::run(cli.config.as_deref(), args).await
        }
        Commands::Config { example } => {
            util::init_logging(None)?;
            if example {
                cmd::config::run_example().await
            } else {
                cmd::config::run_show(cli.config.as_deref()).await
            }
        }
    }
}
