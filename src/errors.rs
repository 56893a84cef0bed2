// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    /// A caller passed an argument the watcher cannot work with.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A registration call was made after `close()`.
    #[error("Illegal state: {operation} on closed file watcher")]
    IllegalState { operation: &'static str },

    /// A path component could not be inspected for a reason other than
    /// not existing (e.g. permission denied).
    #[error("Failed to resolve {path:?}: {source}")]
    Resolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Too many levels of symbolic links resolving {0:?}")]
    SymlinkLoop(PathBuf),

    #[error("Native event source is closed")]
    SourceClosed,

    #[error("Native watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchError>;

/// Why an executor could not confirm it terminated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TerminationError {
    /// Waiting was cut short, e.g. a worker thread died instead of
    /// finishing its queue.
    #[error("termination interrupted: {0}")]
    Interrupted(String),
}
