// src/lifecycle.rs

//! Ordered, timeout-bounded teardown of a watcher instance.
//!
//! The controller only talks to the native source and to two
//! [`ExecutorService`]s (the watch loop and the callback pool), so tests can
//! swap in fakes that hang, time out or fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::errors::TerminationError;
use crate::watch::source::NativeEventSource;

/// Bound on how long each executor gets to finish during `close()`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A pool of threads that can be asked to stop and waited on.
pub trait ExecutorService: Send + Sync {
    fn is_shutdown(&self) -> bool;

    /// Stop accepting new work. Already queued work is still finished.
    fn shutdown(&self);

    /// Wait up to `timeout` for every thread to finish.
    ///
    /// `Ok(false)` means the timeout elapsed first.
    fn await_termination(&self, timeout: Duration) -> Result<bool, TerminationError>;
}

pub struct ShutdownController {
    source: Arc<dyn NativeEventSource>,
    watch_executor: Arc<dyn ExecutorService>,
    callback_executor: Arc<dyn ExecutorService>,
    timeout: Duration,
    closed: AtomicBool,
}

impl std::fmt::Debug for ShutdownController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownController")
            .field("timeout", &self.timeout)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ShutdownController {
    pub fn new(
        source: Arc<dyn NativeEventSource>,
        watch_executor: Arc<dyn ExecutorService>,
        callback_executor: Arc<dyn ExecutorService>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            watch_executor,
            callback_executor,
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear everything down. Idempotent; failures are logged, never returned.
    ///
    /// 1. close the native source
    /// 2. stop the watch loop and wait for it
    /// 3. stop the callback pool and wait for it, whatever happened in 2
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("close() called on already closed watcher");
            return;
        }

        if let Err(err) = self.source.close() {
            error!("native event source did not close: {err}");
        }

        if self.watch_executor.is_shutdown() {
            debug!("watch loop already shut down");
        } else {
            self.watch_executor.shutdown();
            self.await_executor("watch loop", self.watch_executor.as_ref());
        }

        if self.callback_executor.is_shutdown() {
            debug!("callback dispatcher already shut down");
        } else {
            self.callback_executor.shutdown();
            self.await_executor("callback dispatcher", self.callback_executor.as_ref());
        }

        info!("file watcher closed");
    }

    fn await_executor(&self, name: &str, executor: &dyn ExecutorService) {
        match executor.await_termination(self.timeout) {
            Ok(true) => debug!("{name} terminated"),
            Ok(false) => warn!("{name} failed to terminate in {:?}", self.timeout),
            Err(err) => error!("{name} {err}"),
        }
    }
}
