use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use symwatch::errors::{Result, WatchError};
use symwatch::watch::{EventKind, NativeEvent, NativeEventSource};

#[derive(Debug, Default)]
struct State {
    batches: VecDeque<Vec<NativeEvent>>,
    /// directory → number of times currently registered
    watched: BTreeMap<PathBuf, usize>,
    watch_calls: Vec<PathBuf>,
    unwatch_calls: Vec<PathBuf>,
    failing_dirs: HashSet<PathBuf>,
    fail_close: bool,
    hold_watches: bool,
    closed: bool,
    close_calls: usize,
}

/// Scripted [`NativeEventSource`].
///
/// Tests push batches with [`FakeEventSource::push`]; the watch loop picks
/// them up in order. Registrations are recorded so directory bookkeeping
/// can be asserted on.
#[derive(Debug, Default)]
pub struct FakeEventSource {
    state: Mutex<State>,
    wake: Condvar,
}

impl FakeEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// `close()` will report an error (after marking itself closed).
    pub fn failing_close() -> Self {
        let source = Self::default();
        source.state.lock().fail_close = true;
        source
    }

    /// `watch_dir(dir)` will fail for this directory.
    pub fn fail_watch(&self, dir: impl Into<PathBuf>) {
        self.state.lock().failing_dirs.insert(dir.into());
    }

    pub fn allow_watch(&self, dir: impl AsRef<Path>) {
        self.state.lock().failing_dirs.remove(dir.as_ref());
    }

    /// Park every subsequent `watch_dir` call until
    /// [`FakeEventSource::release_watches`]. The call is recorded before it
    /// parks.
    pub fn hold_watches(&self) {
        self.state.lock().hold_watches = true;
    }

    pub fn release_watches(&self) {
        self.state.lock().hold_watches = false;
        self.wake.notify_all();
    }

    pub fn push(&self, batch: Vec<NativeEvent>) {
        self.state.lock().batches.push_back(batch);
        self.wake.notify_all();
    }

    /// Push a single-event batch for the entry at `path`.
    pub fn touch(&self, path: impl AsRef<Path>) {
        if let Some(event) = NativeEvent::from_path(path.as_ref(), EventKind::Modify) {
            self.push(vec![event]);
        }
    }

    pub fn watched_dirs(&self) -> BTreeSet<PathBuf> {
        self.state.lock().watched.keys().cloned().collect()
    }

    pub fn is_watching(&self, dir: impl AsRef<Path>) -> bool {
        self.state.lock().watched.contains_key(dir.as_ref())
    }

    pub fn watch_calls(&self) -> Vec<PathBuf> {
        self.state.lock().watch_calls.clone()
    }

    pub fn unwatch_calls(&self) -> Vec<PathBuf> {
        self.state.lock().unwatch_calls.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    pub fn pending_batches(&self) -> usize {
        self.state.lock().batches.len()
    }
}

impl NativeEventSource for FakeEventSource {
    fn watch_dir(&self, dir: &Path) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(WatchError::SourceClosed);
        }
        state.watch_calls.push(dir.to_path_buf());
        while state.hold_watches && !state.closed {
            self.wake.wait(&mut state);
        }
        if state.failing_dirs.contains(dir) {
            return Err(WatchError::IoError(io::Error::other(format!(
                "cannot watch {}",
                dir.display()
            ))));
        }
        *state.watched.entry(dir.to_path_buf()).or_insert(0) += 1;
        Ok(())
    }

    fn unwatch_dir(&self, dir: &Path) -> Result<()> {
        let mut state = self.state.lock();
        state.unwatch_calls.push(dir.to_path_buf());
        match state.watched.get_mut(dir) {
            Some(n) if *n > 1 => *n -= 1,
            Some(_) => {
                state.watched.remove(dir);
            }
            None => {
                return Err(WatchError::IoError(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} is not watched", dir.display()),
                )));
            }
        }
        Ok(())
    }

    fn next_batch(&self, timeout: Duration) -> Result<Option<Vec<NativeEvent>>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(batch) = state.batches.pop_front() {
                return Ok(Some(batch));
            }
            if state.closed {
                return Err(WatchError::SourceClosed);
            }
            if self.wake.wait_until(&mut state, deadline).timed_out() {
                return match state.batches.pop_front() {
                    Some(batch) => Ok(Some(batch)),
                    None => Ok(None),
                };
            }
        }
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.close_calls += 1;
        state.closed = true;
        state.hold_watches = false;
        self.wake.notify_all();
        if state.fail_close {
            return Err(WatchError::IoError(io::Error::other("close failed")));
        }
        Ok(())
    }
}
