//! Log file setup for hosts embedding the overlay

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use simplelog::{Config, LevelFilter, WriteLogger};

/// Route the crate's `log` output to `path`, truncating it.
///
/// Fails if a global logger is already installed.
pub fn init_file_logger(path: &Path, level: LevelFilter) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create log file {path:?}"))?;
    WriteLogger::init(level, Config::default(), file)
        .context("A global logger is already installed")?;
    log::info!("Logging to {path:?} at {level}");
    Ok(())
}
