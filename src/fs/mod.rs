// src/fs/mod.rs

//! Filesystem seam used by the path resolver.
//!
//! Resolution only ever needs to inspect a single component without
//! following it, read a link target, and know the current directory. Keeping
//! that behind a trait lets resolver tests run against [`mock::MockFileSystem`]
//! instead of a real tree of symlinks.

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod mock;

/// What a single path component is, without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

/// Abstract filesystem interface.
///
/// Errors are plain `io::Error`s so the resolver can tell `NotFound` apart
/// from everything else.
pub trait FileSystem: Send + Sync + Debug {
    /// `lstat`-style lookup: symlinks are reported as [`EntryKind::Symlink`].
    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind>;

    /// Raw target of the symlink at `path`, exactly as stored.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    fn current_dir(&self) -> io::Result<PathBuf>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = fs::symlink_metadata(path)?;
        let ft = meta.file_type();
        if ft.is_symlink() {
            Ok(EntryKind::Symlink)
        } else if ft.is_dir() {
            Ok(EntryKind::Dir)
        } else {
            Ok(EntryKind::File)
        }
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }
}
