// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{DEFAULT_CALLBACK_THREADS, WatcherOptions};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// paths = ["/etc/app/config.yaml", "secrets/token"]
///
/// [watcher]
/// callback_threads = 4
/// shutdown_timeout_secs = 10
/// poll_interval_ms = 100
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Files to watch at startup.
    #[serde(default)]
    pub paths: Vec<String>,

    #[serde(default)]
    pub watcher: WatcherSection,
}

/// `[watcher]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherSection {
    #[serde(default = "default_callback_threads")]
    pub callback_threads: usize,

    /// Upper bound, per thread pool, on how long `close()` waits.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_callback_threads() -> usize {
    DEFAULT_CALLBACK_THREADS
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for WatcherSection {
    fn default() -> Self {
        Self {
            callback_threads: default_callback_threads(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl From<&WatcherSection> for WatcherOptions {
    fn from(section: &WatcherSection) -> Self {
        WatcherOptions {
            callback_threads: section.callback_threads,
            shutdown_timeout: Duration::from_secs(section.shutdown_timeout_secs),
            poll_interval: Duration::from_millis(section.poll_interval_ms),
        }
    }
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watcher: WatcherSection,
    pub paths: Vec<PathBuf>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watcher: WatcherSection, paths: Vec<PathBuf>) -> Self {
        Self { watcher, paths }
    }

    pub fn options(&self) -> WatcherOptions {
        WatcherOptions::from(&self.watcher)
    }
}
