//! `telemon config` commands

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use telemon_core::{paths, Config};

use super::{load_config, BrokerArgs};

fn resolve(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf).unwrap_or_else(paths::config_file)
}

/// Print the effective configuration as JSON.
pub fn show(path: Option<&Path>) -> Result<()> {
    let config = load_config(path, &BrokerArgs::default())?;
    let file = resolve(path);
    let origin = if file.exists() { "" } else { " (not found, using defaults)" };

    println!("{} {}{}", "#".dimmed(), file.display(), origin.dimmed());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Write the default configuration.
pub fn init(path: Option<&Path>, force: bool) -> Result<()> {
    let file = resolve(path);
    if file.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", file.display());
    }

    Config::default().save_to(&file)?;
    println!("{} Wrote {}", "✓".green().bold(), file.display());
    Ok(())
}

pub fn path(path: Option<&Path>) {
    println!("{}", resolve(path).display());
}
