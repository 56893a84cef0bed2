// src/dispatch.rs

//! Callback worker pool.
//!
//! Listener code runs here, never on the watch loop thread, so a slow or
//! panicking listener cannot stall event detection.
//!
//! Each worker owns its own FIFO queue and a notification is routed by
//! listener identity. A single listener therefore always runs on the same
//! worker and sees its notifications in the order the watch loop queued
//! them; different listeners run in parallel with no ordering between them.

use std::any::Any;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use crate::errors::{Result, TerminationError};
use crate::lifecycle::ExecutorService;
use crate::watch::listener::{ListenerKey, SharedListener};

/// One pending listener invocation.
pub struct Notification {
    pub key: ListenerKey,
    pub listener: SharedListener,
    pub path: PathBuf,
}

impl std::fmt::Debug for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notification")
            .field("key", &self.key)
            .field("path", &self.path)
            .finish()
    }
}

/// Number of worker threads still running, plus a condvar signalled each
/// time one exits.
#[derive(Default)]
struct Liveness {
    alive: Mutex<usize>,
    exited: Condvar,
}

/// Decrements the live-worker count when a worker thread ends, however it
/// ends.
struct ExitGuard(Arc<Liveness>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let mut alive = self.0.alive.lock();
        *alive -= 1;
        self.0.exited.notify_all();
    }
}

pub struct CallbackDispatcher {
    queues: Mutex<Option<Vec<Sender<Notification>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    liveness: Arc<Liveness>,
    threads: usize,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("alive", &*self.liveness.alive.lock())
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish()
    }
}

impl CallbackDispatcher {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let liveness = Arc::new(Liveness::default());
        let mut queues = Vec::with_capacity(threads);
        let mut workers = Vec::with_capacity(threads);

        for i in 0..threads {
            let (tx, rx) = mpsc::channel::<Notification>();
            *liveness.alive.lock() += 1;
            let guard = ExitGuard(Arc::clone(&liveness));
            let handle = thread::Builder::new()
                .name(format!("symwatch-callback-{i}"))
                .spawn(move || {
                    let _guard = guard;
                    worker_loop(rx);
                });
            match handle {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    // The closure (and its guard) was dropped, so the count
                    // is already back down; stop the workers we did start.
                    drop(queues);
                    return Err(err.into());
                }
            }
            queues.push(tx);
        }

        debug!(threads, "callback dispatcher started");
        Ok(Self {
            queues: Mutex::new(Some(queues)),
            workers: Mutex::new(workers),
            liveness,
            threads,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Queue a notification. Returns `false` once the pool is shut down.
    pub fn submit(&self, notification: Notification) -> bool {
        let guard = self.queues.lock();
        let Some(queues) = guard.as_ref() else {
            debug!(path = ?notification.path, "dispatcher shut down; dropping notification");
            return false;
        };
        queues[self.worker_for(notification.key)]
            .send(notification)
            .is_ok()
    }

    /// Index of the worker that runs every notification for `key`.
    ///
    /// The key is an allocation address, so its low bits are mostly zero;
    /// it is hashed before being reduced to a worker index.
    pub fn worker_for(&self, key: ListenerKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.threads as u64) as usize
    }
}

impl ExecutorService for CallbackDispatcher {
    fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        // Dropping the senders lets each worker drain its queue and exit.
        if self.queues.lock().take().is_some() {
            debug!("callback dispatcher shutting down");
        }
    }

    fn await_termination(&self, timeout: Duration) -> std::result::Result<bool, TerminationError> {
        let deadline = Instant::now() + timeout;
        {
            let mut alive = self.liveness.alive.lock();
            while *alive > 0 {
                if self
                    .liveness
                    .exited
                    .wait_until(&mut alive, deadline)
                    .timed_out()
                {
                    return Ok(*alive == 0);
                }
            }
        }

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let panicked = workers
            .into_iter()
            .map(JoinHandle::join)
            .filter(|res| res.is_err())
            .count();
        if panicked > 0 {
            return Err(TerminationError::Interrupted(format!(
                "{panicked} callback worker(s) died"
            )));
        }
        Ok(true)
    }
}

impl Drop for CallbackDispatcher {
    fn drop(&mut self) {
        self.queues.lock().take();
    }
}

fn worker_loop(rx: Receiver<Notification>) {
    while let Ok(notification) = rx.recv() {
        invoke(notification);
    }
    trace!("callback worker exiting");
}

fn invoke(notification: Notification) {
    let Notification { key, listener, path } = notification;
    let result = panic::catch_unwind(AssertUnwindSafe(|| listener.on_path_update(&path)));
    if let Err(payload) = result {
        error!(?key, ?path, "listener panicked: {}", panic_message(payload.as_ref()));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
