// src/watch/table.rs

//! Concurrent registry of watch targets, monitored directories and
//! listeners.
//!
//! Two maps, both sharded `DashMap`s:
//! - `targets`: requested path → [`WatchTarget`]
//! - `directories`: monitored directory → [`DirectoryRegistration`], which
//!   indexes `file name → targets` and counts the targets holding it.
//!
//! Lock order is always target state first, directory shard second. The
//! watch loop never holds a directory shard while touching a target.
//! Native watch and unwatch calls run after both are released, serialized
//! by the `native` set alone.

use std::collections::{BTreeSet, HashMap};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::watch::listener::{ListenerKey, ListenerSet, SharedListener};
use crate::watch::resolver::{Match, Resolution};
use crate::watch::source::NativeEventSource;

#[derive(Debug)]
struct TargetState {
    resolution: Resolution,
    /// Set once the target is removed from the table; no interests may be
    /// added for it afterwards.
    retired: bool,
}

/// One file a caller asked to watch.
#[derive(Debug)]
pub struct WatchTarget {
    requested: PathBuf,
    state: RwLock<TargetState>,
    listeners: Mutex<ListenerSet>,
}

impl WatchTarget {
    fn new(requested: PathBuf, resolution: Resolution) -> Self {
        Self {
            requested,
            state: RwLock::new(TargetState {
                resolution,
                retired: false,
            }),
            listeners: Mutex::new(ListenerSet::new()),
        }
    }

    /// The path as requested; this is what scoped listeners are told.
    pub fn requested(&self) -> &Path {
        &self.requested
    }

    pub fn resolution(&self) -> Resolution {
        self.state.read().resolution.clone()
    }

    pub fn resolved(&self) -> PathBuf {
        self.state.read().resolution.resolved.clone()
    }

    pub fn classify(&self, dir: &Path, name: &OsStr) -> Match {
        self.state.read().resolution.classify(dir, name)
    }

    pub fn add_strong(&self, listener: SharedListener) -> bool {
        self.listeners.lock().add_strong(listener)
    }

    pub fn add_weak(&self, listener: &SharedListener) -> bool {
        self.listeners.lock().add_weak(listener)
    }

    pub fn remove_listener(&self, key: ListenerKey) -> bool {
        self.listeners.lock().remove(key)
    }

    /// Live scoped listeners; reclaimed weak entries are pruned.
    pub fn listeners(&self) -> Vec<(ListenerKey, SharedListener)> {
        self.listeners.lock().live()
    }
}

/// Index entry for one monitored directory, shared by every target whose
/// resolution passes through it.
///
/// The entry exists exactly while some target holds the directory; that is
/// the desired native state. Whether the native source actually watches it
/// is tracked separately in `WatchTable::native`.
#[derive(Debug, Default)]
struct DirectoryRegistration {
    names: HashMap<OsString, BTreeSet<PathBuf>>,
    /// target → number of names it holds in this directory
    holders: HashMap<PathBuf, usize>,
}

pub struct WatchTable {
    source: Arc<dyn NativeEventSource>,
    targets: DashMap<PathBuf, Arc<WatchTarget>>,
    directories: DashMap<PathBuf, DirectoryRegistration>,
    /// Directories the native source currently watches. Held only around
    /// native calls, never together with a target or shard lock.
    native: Mutex<BTreeSet<PathBuf>>,
    global: Mutex<ListenerSet>,
}

impl std::fmt::Debug for WatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchTable")
            .field("targets", &self.targets.len())
            .field("directories", &self.directories.len())
            .finish_non_exhaustive()
    }
}

impl WatchTable {
    pub fn new(source: Arc<dyn NativeEventSource>) -> Self {
        Self {
            source,
            targets: DashMap::new(),
            directories: DashMap::new(),
            native: Mutex::new(BTreeSet::new()),
            global: Mutex::new(ListenerSet::new()),
        }
    }

    /// Get or create the target for `requested`.
    ///
    /// `resolution` is only used when the target is new. Returns whether the
    /// target was created by this call.
    pub fn register(&self, requested: &Path, resolution: Resolution) -> (Arc<WatchTarget>, bool) {
        let target = match self.targets.entry(requested.to_path_buf()) {
            Entry::Occupied(occupied) => return (Arc::clone(occupied.get()), false),
            Entry::Vacant(vacant) => {
                let target = Arc::new(WatchTarget::new(requested.to_path_buf(), resolution));
                vacant.insert(Arc::clone(&target));
                target
            }
        };

        let touched = {
            let state = target.state.write();
            if state.retired {
                BTreeSet::new()
            } else {
                for (dir, name) in state.resolution.interests() {
                    self.add_interest(dir, name, &target.requested);
                }
                state.resolution.directories()
            }
        };
        self.sync_native(touched);

        debug!(requested = ?target.requested, "watch target registered");
        (target, true)
    }

    pub fn target(&self, requested: &Path) -> Option<Arc<WatchTarget>> {
        self.targets.get(requested).map(|t| Arc::clone(t.value()))
    }

    /// Remove a target and release every directory it was holding.
    pub fn remove(&self, requested: &Path) -> Option<Arc<WatchTarget>> {
        let (_, target) = self.targets.remove(requested)?;

        let touched = {
            let mut state = target.state.write();
            state.retired = true;
            for (dir, name) in state.resolution.interests() {
                self.remove_interest(dir, &name, &target.requested);
            }
            state.resolution.directories()
        };
        self.sync_native(touched);

        debug!(requested = ?target.requested, "watch target removed");
        Some(target)
    }

    /// Targets with an interest in `name` inside `dir`.
    pub fn targets_for(&self, dir: &Path, name: &OsStr) -> Vec<Arc<WatchTarget>> {
        let keys: Vec<PathBuf> = match self.directories.get(dir) {
            Some(reg) => match reg.names.get(name) {
                Some(set) => set.iter().cloned().collect(),
                None => return Vec::new(),
            },
            None => return Vec::new(),
        };

        keys.iter()
            .filter_map(|key| self.target(key))
            .collect()
    }

    /// Swap in a new resolution for `target`, moving its directory
    /// interests along.
    ///
    /// New interests are registered before stale ones are released so a
    /// directory shared by both never drops to zero in between. Directories
    /// the native source refused earlier are retried. Returns the previous
    /// resolution, or `None` if nothing changed.
    pub fn repoint(&self, target: &WatchTarget, resolution: Resolution) -> Option<Resolution> {
        let (previous, touched) = {
            let mut state = target.state.write();
            if state.retired || state.resolution == resolution {
                return None;
            }

            let before = state.resolution.interests();
            let after = resolution.interests();

            for (dir, name) in after.difference(&before) {
                self.add_interest(dir.clone(), name.clone(), &target.requested);
            }
            for (dir, name) in before.difference(&after) {
                self.remove_interest(dir.clone(), name, &target.requested);
            }

            let touched: BTreeSet<PathBuf> = before
                .into_iter()
                .chain(after)
                .map(|(dir, _)| dir)
                .collect();
            (std::mem::replace(&mut state.resolution, resolution), touched)
        };
        self.sync_native(touched);

        Some(previous)
    }

    pub fn add_global_strong(&self, listener: SharedListener) -> bool {
        self.global.lock().add_strong(listener)
    }

    pub fn add_global_weak(&self, listener: &SharedListener) -> bool {
        self.global.lock().add_weak(listener)
    }

    pub fn global_listeners(&self) -> Vec<(ListenerKey, SharedListener)> {
        self.global.lock().live()
    }

    /// Remove a listener from the global set and from every target.
    pub fn remove_listener(&self, key: ListenerKey) -> bool {
        let mut found = self.global.lock().remove(key);
        for target in self.targets.iter() {
            found |= target.remove_listener(key);
        }
        found
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Number of targets currently holding `dir`.
    pub fn refcount(&self, dir: &Path) -> usize {
        self.directories
            .get(dir)
            .map(|reg| reg.holders.len())
            .unwrap_or(0)
    }

    pub fn watched_directories(&self) -> BTreeSet<PathBuf> {
        self.directories.iter().map(|e| e.key().clone()).collect()
    }

    /// Whether the native source is currently observing `dir`.
    pub fn is_armed(&self, dir: &Path) -> bool {
        self.native.lock().contains(dir)
    }

    /// Index bookkeeping only; no native calls.
    fn add_interest(&self, dir: PathBuf, name: OsString, requested: &Path) {
        let mut reg = self.directories.entry(dir).or_default();
        reg.names
            .entry(name)
            .or_default()
            .insert(requested.to_path_buf());
        *reg.holders.entry(requested.to_path_buf()).or_insert(0) += 1;
    }

    /// Index bookkeeping only; the entry goes away with its last holder.
    fn remove_interest(&self, dir: PathBuf, name: &OsStr, requested: &Path) {
        let Entry::Occupied(mut occupied) = self.directories.entry(dir) else {
            return;
        };
        let reg = occupied.get_mut();

        let mut held = false;
        if let Some(set) = reg.names.get_mut(name) {
            held = set.remove(requested);
            if set.is_empty() {
                reg.names.remove(name);
            }
        }
        if !held {
            return;
        }

        if let Some(count) = reg.holders.get_mut(requested) {
            *count -= 1;
            if *count == 0 {
                reg.holders.remove(requested);
            }
        }

        if reg.holders.is_empty() {
            occupied.remove();
        }
    }

    /// Bring the native source in line with the index for `dirs`.
    ///
    /// Runs with no target or shard lock held. The desired state is re-read
    /// under `native`, so concurrent callers converge whatever order they
    /// run in.
    fn sync_native(&self, dirs: BTreeSet<PathBuf>) {
        let mut native = self.native.lock();
        for dir in dirs {
            let wanted = self.directories.contains_key(&dir);
            let watched = native.contains(&dir);
            if wanted && !watched {
                match self.source.watch_dir(&dir) {
                    Ok(()) => {
                        native.insert(dir);
                    }
                    Err(err) => {
                        // Retried on the next repoint touching it.
                        warn!(?dir, error = %err, "failed to register directory watch");
                    }
                }
            } else if !wanted && watched {
                if let Err(err) = self.source.unwatch_dir(&dir) {
                    // inotify drops watches on deleted directories by itself.
                    debug!(?dir, error = %err, "failed to release directory watch");
                }
                native.remove(&dir);
            }
        }
    }
}
