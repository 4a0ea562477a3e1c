// src/logging.rs

//! Logging setup for `procexec` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `PROCEXEC_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that a child's inherited stdout stays clean.
//!
//! This module also owns [`log_command`], which emits the per-invocation
//! command line configured through the `logger` / `log_level` / `log_cmd`
//! behaviour options.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;
use crate::types::LogLevelSetting;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => std::env::var("PROCEXEC_LOG")
            .ok()
            .and_then(|s| parse_level_str(&s))
            .unwrap_or(Level::INFO),
    };

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

pub(crate) fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Log the command line of an invocation on the named logger channel.
///
/// `tracing` needs the level at compile time, hence the dispatch.
pub(crate) fn log_command(logger: &str, level: LogLevelSetting, cmd: &str) {
    let LogLevelSetting::Level(level) = level else {
        return;
    };

    match level {
        Level::ERROR => tracing::error!(logger = %logger, "{}", cmd),
        Level::WARN => tracing::warn!(logger = %logger, "{}", cmd),
        Level::INFO => tracing::info!(logger = %logger, "{}", cmd),
        Level::DEBUG => tracing::debug!(logger = %logger, "{}", cmd),
        _ => tracing::trace!(logger = %logger, "{}", cmd),
    }
}
