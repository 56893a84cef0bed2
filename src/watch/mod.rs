// src/watch/mod.rs

//! File watching on top of a directory-granular event source.
//!
//! This module is responsible for:
//! - Resolving requested paths through their symlink chains (`resolver`).
//! - Keeping the registry of targets, monitored directories and listeners
//!   (`table`, `listener`).
//! - Wrapping the native event source (`source`, backed by `notify`).
//! - Running the single event-consuming thread (`watch_loop`).
//!
//! It does **not** run listener code; that happens on the callback pool in
//! [`crate::dispatch`].

pub mod listener;
pub mod resolver;
pub mod source;
pub mod table;
pub mod watch_loop;

pub use listener::{Listener, ListenerKey, ListenerSet, SharedListener};
pub use resolver::{Hop, Match, PathResolver, Resolution};
pub use source::{EventKind, NativeEvent, NativeEventSource, NotifyEventSource};
pub use table::{WatchTable, WatchTarget};
pub use watch_loop::{LoopState, WatchLoop, WatchLoopHandle};
