use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use symwatch::{ExecutorService, TerminationError};

/// What [`FakeExecutor::await_termination`] reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Terminated,
    TimedOut,
    Interrupted(String),
}

/// An executor that:
/// - records how often it was shut down and awaited
/// - answers `await_termination` with a scripted outcome.
#[derive(Debug)]
pub struct FakeExecutor {
    outcome: Termination,
    shut_down: AtomicBool,
    shutdown_calls: AtomicUsize,
    await_calls: AtomicUsize,
    last_timeout: Mutex<Option<Duration>>,
}

impl FakeExecutor {
    pub fn new(outcome: Termination) -> Self {
        Self {
            outcome,
            shut_down: AtomicBool::new(false),
            shutdown_calls: AtomicUsize::new(0),
            await_calls: AtomicUsize::new(0),
            last_timeout: Mutex::new(None),
        }
    }

    pub fn terminating() -> Self {
        Self::new(Termination::Terminated)
    }

    /// Starts out already shut down.
    pub fn already_shut_down() -> Self {
        let exec = Self::terminating();
        exec.shut_down.store(true, Ordering::SeqCst);
        exec
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    pub fn await_calls(&self) -> usize {
        self.await_calls.load(Ordering::SeqCst)
    }

    pub fn last_timeout(&self) -> Option<Duration> {
        *self.last_timeout.lock()
    }
}

impl ExecutorService for FakeExecutor {
    fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        self.shut_down.store(true, Ordering::SeqCst);
    }

    fn await_termination(&self, timeout: Duration) -> Result<bool, TerminationError> {
        self.await_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_timeout.lock() = Some(timeout);
        match &self.outcome {
            Termination::Terminated => Ok(true),
            Termination::TimedOut => Ok(false),
            Termination::Interrupted(why) => Err(TerminationError::Interrupted(why.clone())),
        }
    }
}
