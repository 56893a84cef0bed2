// src/types.rs

use std::time::Duration;

use crate::lifecycle::DEFAULT_SHUTDOWN_TIMEOUT;

/// Default number of callback worker threads.
pub const DEFAULT_CALLBACK_THREADS: usize = 4;

/// How long the watch loop blocks on the native source before re-checking
/// whether it should stop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runtime knobs for a [`crate::FileWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherOptions {
    /// Size of the callback worker pool.
    pub callback_threads: usize,
    /// Bound on each executor's termination wait in `close()`, and on how
    /// long the watch loop keeps draining an already-read batch.
    pub shutdown_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        WatcherOptions {
            callback_threads: DEFAULT_CALLBACK_THREADS,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
