use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use symwatch::SharedListener;

#[derive(Default)]
struct Log {
    paths: Mutex<Vec<PathBuf>>,
    changed: Condvar,
}

/// Shared log of listener invocations.
///
/// Listeners handed out by [`Recorder::listener`] all append to the same
/// log, and the log outlives them, so tests can drop a weakly registered
/// listener and still inspect what it received.
#[derive(Clone, Default)]
pub struct Recorder {
    log: Arc<Log>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh listener (its own identity) that records into this log.
    pub fn listener(&self) -> SharedListener {
        let log = Arc::clone(&self.log);
        Arc::new(move |path: &Path| {
            log.paths.lock().push(path.to_path_buf());
            log.changed.notify_all();
        })
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.log.paths.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.log.paths.lock().len()
    }

    pub fn count_of(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.log.paths.lock().iter().filter(|p| *p == path).count()
    }

    pub fn clear(&self) {
        self.log.paths.lock().clear();
    }

    /// Block until at least `n` invocations were recorded.
    pub fn wait_for_count(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut paths = self.log.paths.lock();
        while paths.len() < n {
            if self.log.changed.wait_until(&mut paths, deadline).timed_out() {
                return paths.len() >= n;
            }
        }
        true
    }

    /// Block until `path` was recorded at least once.
    pub fn wait_for_path(&self, path: impl AsRef<Path>, timeout: Duration) -> bool {
        let path = path.as_ref();
        let deadline = Instant::now() + timeout;
        let mut paths = self.log.paths.lock();
        while !paths.iter().any(|p| p == path) {
            if self.log.changed.wait_until(&mut paths, deadline).timed_out() {
                return paths.iter().any(|p| p == path);
            }
        }
        true
    }
}
