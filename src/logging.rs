// src/logging.rs

//! Logging setup for `symwatch` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `SYMWATCH_LOG` environment variable, either a bare level ("debug") or
//!    a full filter directive ("symwatch::watch=trace,info")
//! 3. default to `info`
//!
//! Logs are sent to STDERR; stdout carries one line per change.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "SYMWATCH_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup. Later calls are ignored.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => level_filter(level_from_log_level(lvl)),
        None => filter_from_env(),
    };

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}

fn filter_from_env() -> EnvFilter {
    let Ok(raw) = std::env::var(LOG_ENV_VAR) else {
        return level_filter(tracing::Level::INFO);
    };
    if let Some(level) = parse_level_str(&raw) {
        return level_filter(level);
    }
    EnvFilter::try_new(raw.trim()).unwrap_or_else(|err| {
        eprintln!("ignoring invalid {LOG_ENV_VAR}={raw:?}: {err}");
        level_filter(tracing::Level::INFO)
    })
}

fn level_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
}

pub fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
