// src/watch/resolver.rs

//! Symlink-chain resolution for watch targets.
//!
//! The native event source only reports events per directory, so for every
//! requested path we need two things:
//! - the real, symlink-free location of the file (where content changes
//!   happen), and
//! - every symlink crossed on the way there, together with the directory
//!   holding it, so that re-pointing any of those links is noticed too.
//!
//! Resolution walks the path one component at a time, the same way the
//! kernel does, splicing link targets in front of the remaining components.
//! A missing component ends the walk: the rest of the path is appended as-is
//! and the target waits in its parent directory for the file to appear.

use std::collections::{BTreeSet, VecDeque};
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::errors::{Result, WatchError};
use crate::fs::{EntryKind, FileSystem, RealFileSystem};

/// Same limit Linux uses before failing with `ELOOP`.
pub const MAX_SYMLINK_HOPS: usize = 40;

/// One symlink met while resolving a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    /// Full (symlink-free up to the last component) path of the link.
    pub link: PathBuf,
    /// Directory containing the link; this is what gets watched.
    pub dir: PathBuf,
    /// File name of the link inside `dir`.
    pub name: OsString,
    /// Raw link target as stored on disk.
    pub target: PathBuf,
}

/// Result of resolving a requested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub resolved: PathBuf,
    pub hops: Vec<Hop>,
    /// First missing component when it is not the leaf itself, as
    /// `(existing parent, name)`. Creating it changes the resolution.
    pub pending: Option<(PathBuf, OsString)>,
}

/// What an event on `(directory, name)` means for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// The resolved file itself was created, changed or removed.
    Leaf,
    /// A symlink in the resolution chain was touched and may point
    /// somewhere else now.
    Hop,
    /// A missing ancestor directory of the leaf appeared or changed.
    Pending,
    /// Unrelated name, e.g. a stale former resolution target.
    None,
}

impl Resolution {
    /// Resolution of a path that involves no symlinks at all.
    pub fn plain(path: impl Into<PathBuf>) -> Self {
        Self {
            resolved: path.into(),
            hops: Vec::new(),
            pending: None,
        }
    }

    pub fn is_indirect(&self) -> bool {
        !self.hops.is_empty()
    }

    /// Every `(directory, file name)` pair that must be observed to keep this
    /// resolution current.
    pub fn interests(&self) -> BTreeSet<(PathBuf, OsString)> {
        let mut out: BTreeSet<(PathBuf, OsString)> = self
            .hops
            .iter()
            .map(|hop| (hop.dir.clone(), hop.name.clone()))
            .collect();
        if let Some(pending) = &self.pending {
            out.insert(pending.clone());
        }
        if let (Some(dir), Some(name)) = (self.resolved.parent(), self.resolved.file_name()) {
            out.insert((dir.to_path_buf(), name.to_os_string()));
        }
        out
    }

    /// Directories named by [`Resolution::interests`].
    pub fn directories(&self) -> BTreeSet<PathBuf> {
        self.interests().into_iter().map(|(dir, _)| dir).collect()
    }

    /// Decide once, per event, whether `(dir, name)` hits this resolution.
    ///
    /// Hops win over the leaf: re-resolving also covers a leaf that was
    /// replaced by a symlink.
    pub fn classify(&self, dir: &Path, name: &OsStr) -> Match {
        if self
            .hops
            .iter()
            .any(|hop| hop.dir.as_path() == dir && hop.name.as_os_str() == name)
        {
            return Match::Hop;
        }
        if let Some((pdir, pname)) = &self.pending {
            if pdir.as_path() == dir && pname.as_os_str() == name {
                return Match::Pending;
            }
        }
        let leaf_hit = self.resolved.parent() == Some(dir)
            && self.resolved.file_name() == Some(name);
        if leaf_hit { Match::Leaf } else { Match::None }
    }
}

#[derive(Debug, Clone)]
enum Part {
    Prefix(OsString),
    Root,
    Parent,
    Normal(OsString),
}

fn parts(path: &Path) -> VecDeque<Part> {
    path.components()
        .filter_map(|c| match c {
            Component::Prefix(p) => Some(Part::Prefix(p.as_os_str().to_os_string())),
            Component::RootDir => Some(Part::Root),
            Component::CurDir => None,
            Component::ParentDir => Some(Part::Parent),
            Component::Normal(n) => Some(Part::Normal(n.to_os_string())),
        })
        .collect()
}

/// Resolves requested paths through their full symlink chain.
///
/// Only reads through the [`FileSystem`] seam, so it is safe to call again at
/// any time and always returns the same answer for the same on-disk state.
#[derive(Debug, Clone)]
pub struct PathResolver {
    fs: Arc<dyn FileSystem>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl PathResolver {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Make `path` absolute against the current directory and drop `.`
    /// components and trailing separators. `..` is kept: it can only be
    /// interpreted correctly after symlinks are substituted.
    pub fn absolutize(&self, path: &Path) -> Result<PathBuf> {
        let joined = if path.has_root() {
            path.to_path_buf()
        } else {
            self.fs.current_dir()?.join(path)
        };
        Ok(joined.components().collect())
    }

    pub fn resolve(&self, requested: &Path) -> Result<Resolution> {
        let requested = self.absolutize(requested)?;

        let mut pending = parts(&requested);
        let mut current = PathBuf::new();
        let mut hops: Vec<Hop> = Vec::new();
        let mut missing: Option<(PathBuf, OsString)> = None;

        while let Some(part) = pending.pop_front() {
            match part {
                Part::Prefix(prefix) => current = PathBuf::from(prefix),
                Part::Root => current.push(Component::RootDir),
                Part::Parent => {
                    current.pop();
                }
                Part::Normal(name) => {
                    let candidate = current.join(&name);
                    if missing.is_some() {
                        current = candidate;
                        continue;
                    }

                    match self.fs.entry_kind(&candidate) {
                        Ok(EntryKind::Symlink) => {
                            if hops.len() >= MAX_SYMLINK_HOPS {
                                return Err(WatchError::SymlinkLoop(requested));
                            }
                            let target = self.fs.read_link(&candidate).map_err(|source| {
                                WatchError::Resolution {
                                    path: candidate.clone(),
                                    source,
                                }
                            })?;
                            trace!(link = ?candidate, ?target, "following symlink");

                            let mut spliced = parts(&target);
                            spliced.extend(pending.drain(..));
                            pending = spliced;

                            hops.push(Hop {
                                link: candidate,
                                dir: current.clone(),
                                name,
                                target: target.clone(),
                            });
                            if target.has_root() {
                                current = PathBuf::new();
                            }
                        }
                        Ok(_) => current = candidate,
                        Err(err) if is_missing(&err) => {
                            trace!(path = ?candidate, "component does not exist yet");
                            missing = Some((current.clone(), name));
                            current = candidate;
                        }
                        Err(source) => {
                            return Err(WatchError::Resolution {
                                path: candidate,
                                source,
                            });
                        }
                    }
                }
            }
        }

        // A missing leaf is already covered by the leaf interest.
        let pending = missing.filter(|(dir, name)| {
            current.parent() != Some(dir.as_path())
                || current.file_name() != Some(name.as_os_str())
        });

        Ok(Resolution {
            resolved: current,
            hops,
            pending,
        })
    }
}

fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
