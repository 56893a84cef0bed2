// src/watcher.rs

//! Public entry point: [`FileWatcher`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::dispatch::CallbackDispatcher;
use crate::errors::{Result, WatchError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::lifecycle::ShutdownController;
use crate::types::WatcherOptions;
use crate::watch::{
    ListenerKey, NativeEventSource, NotifyEventSource, PathResolver, SharedListener, WatchLoop,
    WatchTable, WatchTarget,
};

/// Watches individual files and notifies listeners when they change.
///
/// Listeners come in two flavours:
/// - global (`add_watcher`, `weak_add_watcher`): told the *resolved* path of
///   every change on any watched file;
/// - scoped (`add_watcher_for`, `weak_add_watcher_for`): told the path
///   exactly as requested, for that one file.
///
/// Weak registrations do not keep the listener alive; once the caller drops
/// its last `Arc` the listener is silently forgotten.
///
/// Delivery is at-least-once per logical change: one update may arrive as
/// several calls.
pub struct FileWatcher {
    table: Arc<WatchTable>,
    resolver: PathResolver,
    lifecycle: ShutdownController,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("table", &self.table)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

impl FileWatcher {
    pub fn new() -> Result<Self> {
        Self::with_options(WatcherOptions::default())
    }

    pub fn with_options(options: WatcherOptions) -> Result<Self> {
        let source: Arc<dyn NativeEventSource> = Arc::new(NotifyEventSource::new()?);
        Self::with_source(source, Arc::new(RealFileSystem), options)
    }

    /// Build a watcher on top of an arbitrary event source and filesystem.
    pub fn with_source(
        source: Arc<dyn NativeEventSource>,
        fs: Arc<dyn FileSystem>,
        options: WatcherOptions,
    ) -> Result<Self> {
        let table = Arc::new(WatchTable::new(Arc::clone(&source)));
        let resolver = PathResolver::new(fs);
        let dispatcher = Arc::new(CallbackDispatcher::new(options.callback_threads)?);

        let handle = WatchLoop::new(
            Arc::clone(&table),
            Arc::clone(&source),
            resolver.clone(),
            Arc::clone(&dispatcher),
            options.poll_interval,
            options.shutdown_timeout,
        )
        .spawn()?;

        let lifecycle = ShutdownController::new(
            source,
            Arc::new(handle),
            dispatcher,
            options.shutdown_timeout,
        );

        Ok(Self {
            table,
            resolver,
            lifecycle,
        })
    }

    /// Watch `path` for global listeners.
    pub fn start_watching(&self, path: impl AsRef<Path>) -> Result<()> {
        self.ensure_open("start watching")?;
        self.target_for(path.as_ref())?;
        Ok(())
    }

    /// Stop watching `path`, dropping every listener scoped to it.
    pub fn stop_watching(&self, path: impl AsRef<Path>) -> Result<()> {
        let requested = self.requested(path.as_ref())?;
        if self.table.remove(&requested).is_none() {
            debug!(?requested, "stop_watching on path that was not watched");
        }
        Ok(())
    }

    pub fn add_watcher(&self, listener: SharedListener) -> Result<()> {
        self.ensure_open("add watcher")?;
        self.table.add_global_strong(listener);
        Ok(())
    }

    /// Watch `path` and notify `listener` with `path` whenever it changes.
    pub fn add_watcher_for(&self, path: impl AsRef<Path>, listener: SharedListener) -> Result<()> {
        self.ensure_open("add watcher")?;
        self.target_for(path.as_ref())?.add_strong(listener);
        Ok(())
    }

    pub fn weak_add_watcher(&self, listener: &SharedListener) -> Result<()> {
        self.ensure_open("weak add watcher")?;
        self.table.add_global_weak(listener);
        Ok(())
    }

    pub fn weak_add_watcher_for(
        &self,
        path: impl AsRef<Path>,
        listener: &SharedListener,
    ) -> Result<()> {
        self.ensure_open("weak add watcher")?;
        self.target_for(path.as_ref())?.add_weak(listener);
        Ok(())
    }

    /// Remove `listener` wherever it is registered, strong or weak.
    ///
    /// Returns `false` if it was not registered (including a weak listener
    /// that has already been dropped).
    pub fn remove_watcher(&self, listener: &SharedListener) -> bool {
        self.remove_watcher_key(ListenerKey::of(listener))
    }

    /// Like [`FileWatcher::remove_watcher`], by identity. Lets a caller that
    /// only kept a key (or a `Weak`) unregister after the listener is gone.
    pub fn remove_watcher_key(&self, key: ListenerKey) -> bool {
        self.table.remove_listener(key)
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// Stop watching and shut down both thread pools.
    ///
    /// Idempotent and never fails; problems are logged.
    pub fn close(&self) {
        self.lifecycle.close();
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.lifecycle.is_closed() {
            return Err(WatchError::IllegalState { operation });
        }
        Ok(())
    }

    fn requested(&self, path: &Path) -> Result<PathBuf> {
        if path.as_os_str().is_empty() {
            return Err(WatchError::InvalidArgument("empty file argument".to_string()));
        }
        self.resolver.absolutize(path)
    }

    fn target_for(&self, path: &Path) -> Result<Arc<WatchTarget>> {
        let requested = self.requested(path)?;
        if let Some(target) = self.table.target(&requested) {
            return Ok(target);
        }
        let resolution = self.resolver.resolve(&requested)?;
        let (target, _) = self.table.register(&requested, resolution);
        Ok(target)
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.close();
    }
}
