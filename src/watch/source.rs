// src/watch/source.rs

//! Native, directory-granular event source.
//!
//! The rest of the crate only sees [`NativeEventSource`]: register a
//! directory, unregister it, block for the next batch of
//! `(directory, file name, kind)` events, close. Production code uses
//! [`NotifyEventSource`], a thin wrapper around a non-recursive `notify`
//! watcher; tests drive the watch loop with a scripted fake instead.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::errors::{Result, WatchError};

/// Kind of change reported for a directory entry.
///
/// The watch loop treats every kind the same way ("recheck this name"); the
/// kind is kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Create,
    Modify,
    Remove,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeEvent {
    pub dir: PathBuf,
    pub name: OsString,
    pub kind: EventKind,
}

impl NativeEvent {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<OsString>, kind: EventKind) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            kind,
        }
    }

    /// Split a full entry path into its directory and file name.
    pub fn from_path(path: &Path, kind: EventKind) -> Option<Self> {
        let dir = path.parent()?;
        let name = path.file_name()?;
        Some(Self::new(dir, name, kind))
    }
}

/// The OS primitive the engine is built on.
pub trait NativeEventSource: Send + Sync {
    /// Start reporting events for entries directly inside `dir`.
    fn watch_dir(&self, dir: &Path) -> Result<()>;

    fn unwatch_dir(&self, dir: &Path) -> Result<()>;

    /// Block for up to `timeout` waiting for events.
    ///
    /// Returns `Ok(None)` when the timeout elapsed without events and
    /// `Err(WatchError::SourceClosed)` once the source has been closed.
    fn next_batch(&self, timeout: Duration) -> Result<Option<Vec<NativeEvent>>>;

    fn close(&self) -> Result<()>;
}

/// [`NativeEventSource`] backed by `notify`'s recommended platform watcher.
pub struct NotifyEventSource {
    watcher: Mutex<Option<RecommendedWatcher>>,
    events: Mutex<Receiver<notify::Result<Event>>>,
}

impl std::fmt::Debug for NotifyEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyEventSource")
            .field("open", &self.watcher.lock().is_some())
            .finish()
    }
}

impl NotifyEventSource {
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();

        // Called synchronously by notify on its own thread.
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver only goes away when the source is dropped.
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        Ok(Self {
            watcher: Mutex::new(Some(watcher)),
            events: Mutex::new(rx),
        })
    }
}

impl NativeEventSource for NotifyEventSource {
    fn watch_dir(&self, dir: &Path) -> Result<()> {
        let mut guard = self.watcher.lock();
        let watcher = guard.as_mut().ok_or(WatchError::SourceClosed)?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        debug!(?dir, "native watch registered");
        Ok(())
    }

    fn unwatch_dir(&self, dir: &Path) -> Result<()> {
        let mut guard = self.watcher.lock();
        let watcher = guard.as_mut().ok_or(WatchError::SourceClosed)?;
        watcher.unwatch(dir)?;
        debug!(?dir, "native watch released");
        Ok(())
    }

    fn next_batch(&self, timeout: Duration) -> Result<Option<Vec<NativeEvent>>> {
        let rx = self.events.lock();
        let first = match rx.recv_timeout(timeout) {
            Ok(res) => res,
            Err(RecvTimeoutError::Timeout) => {
                if self.watcher.lock().is_none() {
                    return Err(WatchError::SourceClosed);
                }
                return Ok(None);
            }
            Err(RecvTimeoutError::Disconnected) => return Err(WatchError::SourceClosed),
        };

        let mut batch = Vec::new();
        for res in std::iter::once(first).chain(rx.try_iter()) {
            match res {
                Ok(event) => batch.extend(convert_event(&event)),
                Err(err) => warn!("file watch error: {err}"),
            }
        }
        Ok(Some(batch))
    }

    fn close(&self) -> Result<()> {
        // Dropping the watcher stops its thread, which drops the sender and
        // wakes up a blocked `next_batch`.
        if self.watcher.lock().take().is_some() {
            debug!("native event source closed");
        }
        Ok(())
    }
}

/// Flatten a `notify` event into per-entry events.
///
/// Pure access events (open/close/read) are dropped: they never change
/// what a path resolves to or what it contains.
fn convert_event(event: &Event) -> Vec<NativeEvent> {
    let kind = match event.kind {
        notify::EventKind::Access(_) => return Vec::new(),
        notify::EventKind::Create(_) => EventKind::Create,
        notify::EventKind::Modify(_) => EventKind::Modify,
        notify::EventKind::Remove(_) => EventKind::Remove,
        notify::EventKind::Any | notify::EventKind::Other => EventKind::Other,
    };
    event
        .paths
        .iter()
        .filter_map(|p| NativeEvent::from_path(p, kind))
        .collect()
}
