// src/watch/listener.rs

//! Listener capability and the strong/weak registries built on it.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};

use tracing::trace;

/// Callback invoked when a watched path changes.
///
/// Scoped listeners receive the path exactly as it was requested; global
/// listeners receive the resolved, symlink-free path.
pub trait Listener: Send + Sync {
    fn on_path_update(&self, path: &Path);
}

impl<F> Listener for F
where
    F: Fn(&Path) + Send + Sync,
{
    fn on_path_update(&self, path: &Path) {
        self(path)
    }
}

pub type SharedListener = Arc<dyn Listener>;

/// Allocation identity of a listener.
///
/// Stable for as long as any strong or weak reference to the allocation
/// exists, so it can be used to find weak entries too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerKey(usize);

impl ListenerKey {
    pub fn of(listener: &SharedListener) -> Self {
        Self(Arc::as_ptr(listener) as *const () as usize)
    }

    pub fn of_weak(listener: &Weak<dyn Listener>) -> Self {
        Self(Weak::as_ptr(listener) as *const () as usize)
    }

    pub fn as_usize(self) -> usize {
        self.0
    }
}

enum ListenerRef {
    Strong(SharedListener),
    Weak(Weak<dyn Listener>),
}

impl ListenerRef {
    fn upgrade(&self) -> Option<SharedListener> {
        match self {
            ListenerRef::Strong(l) => Some(Arc::clone(l)),
            ListenerRef::Weak(w) => w.upgrade(),
        }
    }
}

/// Ordered set of listeners, mixing owned and non-owning registrations.
///
/// Weak entries whose listener has been dropped are pruned whenever the set
/// is accessed; they are never invoked and never reported as present.
#[derive(Default)]
pub struct ListenerSet {
    entries: Vec<(ListenerKey, ListenerRef)>,
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strong = self
            .entries
            .iter()
            .filter(|(_, r)| matches!(r, ListenerRef::Strong(_)))
            .count();
        f.debug_struct("ListenerSet")
            .field("strong", &strong)
            .field("weak", &(self.entries.len() - strong))
            .finish()
    }
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the listener was already registered here.
    pub fn add_strong(&mut self, listener: SharedListener) -> bool {
        let key = ListenerKey::of(&listener);
        self.prune();
        if self.contains(key) {
            return false;
        }
        self.entries.push((key, ListenerRef::Strong(listener)));
        true
    }

    /// Returns `false` if the listener was already registered here.
    pub fn add_weak(&mut self, listener: &SharedListener) -> bool {
        let weak = Arc::downgrade(listener);
        let key = ListenerKey::of_weak(&weak);
        self.prune();
        if self.contains(key) {
            return false;
        }
        self.entries.push((key, ListenerRef::Weak(weak)));
        true
    }

    /// Remove the listener with the given identity.
    ///
    /// A weak entry whose listener is already gone counts as not found.
    pub fn remove(&mut self, key: ListenerKey) -> bool {
        self.prune();
        let before = self.entries.len();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.len() != before
    }

    /// Live listeners in registration order.
    pub fn live(&mut self) -> Vec<(ListenerKey, SharedListener)> {
        let mut out = Vec::with_capacity(self.entries.len());
        self.entries.retain(|(key, r)| match r.upgrade() {
            Some(listener) => {
                out.push((*key, listener));
                true
            }
            None => {
                trace!(?key, "pruning reclaimed weak listener");
                false
            }
        });
        out
    }

    pub fn len(&mut self) -> usize {
        self.prune();
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    fn contains(&self, key: ListenerKey) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    fn prune(&mut self) {
        self.entries.retain(|(_, r)| match r {
            ListenerRef::Strong(_) => true,
            ListenerRef::Weak(w) => w.strong_count() > 0,
        });
    }
}
