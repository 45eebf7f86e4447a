//! File logging
//!
//! Stdout belongs to the interactive UI, so diagnostics only ever go to a file.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::ConsoleConfig;

/// Install the global subscriber writing to `config.log_file`.
///
/// Returns `None` when no log file is configured. Keep the guard alive for the life of
/// the program; dropping it flushes and stops the writer.
pub fn init(config: &ConsoleConfig) -> Result<Option<WorkerGuard>> {
    let Some(path) = config.log_file.as_deref() else {
        return Ok(None);
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log file path has no file name: {}", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory '{}'", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(config.log_level)
        .try_init()
        .map_err(|err| anyhow!("cannot install log subscriber: {}", err))?;

    tracing::info!(level = %config.log_level, file = %path.display(), "logging started");
    Ok(Some(guard))
}
