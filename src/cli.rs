// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `symwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "symwatch",
    version,
    about = "Watch files (including through symlink chains) and print each change.",
    long_about = None
)]
pub struct CliArgs {
    /// Files to watch, in addition to any listed in the config file.
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Path to a config file (TOML).
    ///
    /// If omitted, `Symwatch.toml` in the current directory is used when it
    /// exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of callback worker threads. Overrides the config file.
    #[arg(long, value_name = "N")]
    pub callback_threads: Option<usize>,

    /// Seconds `close()` waits for each thread pool. Overrides the config file.
    #[arg(long, value_name = "SECS")]
    pub shutdown_timeout: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SYMWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
