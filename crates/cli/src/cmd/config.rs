//! Configuration display command

use crate::system_config;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

/// Print the effective configuration as TOML
pub async fn run_show(config_path: Option<&Path>) -> Result<()> {
    let config = system_config::load(config_path)?;

    let source = match config_path {
        Some(path) => path.display().to_string(),
        None => match system_config::config_file_path() {
            Some(path) if path.exists() => path.display().to_string(),
            _ => "built-in defaults".to_string(),
        },
    };

    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    eprintln!("{} {}", "# Source:".dimmed(), source.dimmed());
    println!("{}", rendered.trim_end());
    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", system_config::example_config());
    Ok(())
}
