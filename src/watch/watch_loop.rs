// src/watch/watch_loop.rs

//! The single thread consuming native events.
//!
//! For each `(directory, name)` in a batch the loop looks up the targets
//! indexed under that name, lets each target classify the event once
//! ([`Match`]) and acts on it:
//! - `Leaf`: the file itself changed; notify.
//! - `Hop` / `Pending`: something in the resolution chain changed;
//!   re-resolve and, if a symlink now points elsewhere, repoint and notify.
//! - `None`: stale or unrelated name; ignore.
//!
//! Scoped listeners are told the requested path, global listeners the
//! resolved one.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use crate::dispatch::{CallbackDispatcher, Notification};
use crate::errors::{Result, TerminationError, WatchError};
use crate::lifecycle::ExecutorService;
use crate::watch::resolver::{Match, PathResolver};
use crate::watch::source::{NativeEvent, NativeEventSource};
use crate::watch::table::{WatchTable, WatchTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    Running = 0,
    Draining = 1,
    Stopped = 2,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LoopState::Running,
            1 => LoopState::Draining,
            _ => LoopState::Stopped,
        }
    }
}

/// State shared between the loop thread and its handle.
#[derive(Debug)]
struct LoopControl {
    state: AtomicU8,
    drain_deadline: Mutex<Option<Instant>>,
    stopped: Mutex<bool>,
    stopped_cv: Condvar,
}

impl LoopControl {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(LoopState::Running as u8),
            drain_deadline: Mutex::new(None),
            stopped: Mutex::new(false),
            stopped_cv: Condvar::new(),
        }
    }

    fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// RUNNING → DRAINING. Returns `false` if the loop was not running.
    fn request_drain(&self, deadline: Instant) -> bool {
        *self.drain_deadline.lock() = Some(deadline);
        self.state
            .compare_exchange(
                LoopState::Running as u8,
                LoopState::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    fn drain_expired(&self) -> bool {
        self.state() == LoopState::Draining
            && self
                .drain_deadline
                .lock()
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn mark_stopped(&self) {
        self.state.store(LoopState::Stopped as u8, Ordering::SeqCst);
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.stopped_cv.notify_all();
    }
}

/// Marks the loop stopped when its thread ends, including by panic.
struct StopGuard(Arc<LoopControl>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

pub struct WatchLoop {
    table: Arc<WatchTable>,
    source: Arc<dyn NativeEventSource>,
    resolver: PathResolver,
    dispatcher: Arc<CallbackDispatcher>,
    poll_interval: Duration,
    drain_timeout: Duration,
    control: Arc<LoopControl>,
}

impl std::fmt::Debug for WatchLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchLoop")
            .field("state", &self.control.state())
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl WatchLoop {
    pub fn new(
        table: Arc<WatchTable>,
        source: Arc<dyn NativeEventSource>,
        resolver: PathResolver,
        dispatcher: Arc<CallbackDispatcher>,
        poll_interval: Duration,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            table,
            source,
            resolver,
            dispatcher,
            poll_interval,
            drain_timeout,
            control: Arc::new(LoopControl::new()),
        }
    }

    pub fn state(&self) -> LoopState {
        self.control.state()
    }

    /// Stop taking new batches; events still being handled after `timeout`
    /// are dropped. Returns `false` if the loop was not running.
    pub fn begin_drain(&self, timeout: Duration) -> bool {
        self.control.request_drain(Instant::now() + timeout)
    }

    /// Start the loop on its own named thread.
    pub fn spawn(self) -> Result<WatchLoopHandle> {
        let control = Arc::clone(&self.control);
        let drain_timeout = self.drain_timeout;
        let guard = StopGuard(Arc::clone(&self.control));
        let thread = thread::Builder::new()
            .name("symwatch-loop".to_string())
            .spawn(move || {
                let _guard = guard;
                self.run();
            })?;

        Ok(WatchLoopHandle {
            control,
            drain_timeout,
            shutdown_requested: AtomicBool::new(false),
            thread: Mutex::new(Some(thread)),
        })
    }

    fn run(self) {
        info!("watch loop started");

        while self.control.state() == LoopState::Running {
            match self.source.next_batch(self.poll_interval) {
                Ok(Some(batch)) => self.process_batch(&batch),
                Ok(None) => {}
                Err(WatchError::SourceClosed) => {
                    debug!("native event source closed; leaving watch loop");
                    break;
                }
                Err(err) => {
                    warn!("failed to read native events: {err}");
                    thread::sleep(self.poll_interval);
                }
            }
        }

        info!("watch loop stopped");
    }

    /// Handle one batch of native events.
    ///
    /// Each target is notified at most once per batch; a single write often
    /// shows up as several native events.
    pub fn process_batch(&self, batch: &[NativeEvent]) {
        let mut notified: HashSet<PathBuf> = HashSet::new();

        for (i, event) in batch.iter().enumerate() {
            if self.control.drain_expired() {
                warn!(
                    remaining = batch.len() - i,
                    "drain deadline passed; dropping rest of event batch"
                );
                break;
            }
            trace!(dir = ?event.dir, name = ?event.name, kind = ?event.kind, "native event");

            for target in self.table.targets_for(&event.dir, &event.name) {
                let decision = target.classify(&event.dir, &event.name);
                if decision == Match::None {
                    continue;
                }
                self.handle_match(&target, decision, &mut notified);
            }
        }
    }

    fn handle_match(&self, target: &WatchTarget, decision: Match, notified: &mut HashSet<PathBuf>) {
        let requested = target.requested();

        let previous = match self.resolver.resolve(requested) {
            Ok(resolution) => self.table.repoint(target, resolution),
            Err(err) => {
                warn!(?requested, error = %err, "re-resolution failed; keeping previous state");
                None
            }
        };

        if let Some(previous) = &previous {
            info!(
                ?requested,
                from = ?previous.resolved,
                to = ?target.resolved(),
                "watch target re-resolved"
            );
        }

        let should_notify = match decision {
            Match::Leaf => true,
            Match::Hop => previous.is_some(),
            Match::Pending | Match::None => false,
        };
        if should_notify && notified.insert(requested.to_path_buf()) {
            self.enqueue(target);
        }
    }

    fn enqueue(&self, target: &WatchTarget) {
        let requested = target.requested();
        let resolved = target.resolved();
        debug!(?requested, ?resolved, "path updated");

        for (key, listener) in target.listeners() {
            self.dispatcher.submit(Notification {
                key,
                listener,
                path: requested.to_path_buf(),
            });
        }
        for (key, listener) in self.table.global_listeners() {
            self.dispatcher.submit(Notification {
                key,
                listener,
                path: resolved.clone(),
            });
        }
    }
}

/// Control handle for a spawned [`WatchLoop`].
pub struct WatchLoopHandle {
    control: Arc<LoopControl>,
    drain_timeout: Duration,
    /// Set by `shutdown()`. A loop that stopped on its own still reports
    /// not shut down, so `close()` goes on to join its thread.
    shutdown_requested: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for WatchLoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchLoopHandle")
            .field("state", &self.control.state())
            .finish_non_exhaustive()
    }
}

impl WatchLoopHandle {
    pub fn state(&self) -> LoopState {
        self.control.state()
    }
}

impl ExecutorService for WatchLoopHandle {
    fn is_shutdown(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        if self.control.request_drain(Instant::now() + self.drain_timeout) {
            debug!("watch loop draining");
        }
    }

    fn await_termination(&self, timeout: Duration) -> std::result::Result<bool, TerminationError> {
        let deadline = Instant::now() + timeout;
        {
            let mut stopped = self.control.stopped.lock();
            while !*stopped {
                if self
                    .control
                    .stopped_cv
                    .wait_until(&mut stopped, deadline)
                    .timed_out()
                {
                    if !*stopped {
                        return Ok(false);
                    }
                }
            }
        }

        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                return Err(TerminationError::Interrupted(
                    "watch loop thread panicked".to_string(),
                ));
            }
        }
        Ok(true)
    }
}
