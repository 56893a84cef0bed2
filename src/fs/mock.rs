// src/fs/mock.rs

use super::{EntryKind, FileSystem};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File,
    Dir,
    Symlink(PathBuf),
    /// Any lookup of this path fails with `PermissionDenied`.
    Denied,
}

/// In-memory tree of files, directories and symlinks.
///
/// Paths are expected to be absolute. Parent directories are created
/// implicitly, the same way `mkdir -p` would.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    cwd: PathBuf,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Ensure root exists
        entries.insert(PathBuf::from("/"), MockEntry::Dir);

        Self {
            entries: Arc::new(Mutex::new(entries)),
            cwd: PathBuf::from("/"),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn add_file(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MockEntry::File);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MockEntry::Dir);
    }

    /// Create or replace a symlink, like an atomic `rename` of a fresh link
    /// over the old one.
    pub fn set_symlink(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
        self.insert(path.as_ref(), MockEntry::Symlink(target.into()));
    }

    pub fn deny(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), MockEntry::Denied);
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.entries.lock().remove(path.as_ref());
    }

    fn insert(&self, path: &Path, entry: MockEntry) {
        let mut entries = self.entries.lock();
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir.as_os_str().is_empty() {
                break;
            }
            entries
                .entry(dir.to_path_buf())
                .or_insert(MockEntry::Dir);
            parent = dir.parent();
        }
        entries.insert(path.to_path_buf(), entry);
    }

    fn lookup(&self, path: &Path) -> io::Result<MockEntry> {
        match self.entries.lock().get(path) {
            Some(MockEntry::Denied) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {:?}", path),
            )),
            Some(entry) => Ok(entry.clone()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not found: {:?}", path),
            )),
        }
    }
}

impl FileSystem for MockFileSystem {
    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
        Ok(match self.lookup(path)? {
            MockEntry::File => EntryKind::File,
            MockEntry::Dir => EntryKind::Dir,
            MockEntry::Symlink(_) => EntryKind::Symlink,
            MockEntry::Denied => {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
        })
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        match self.lookup(path)? {
            MockEntry::Symlink(target) => Ok(target),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a symlink: {:?}", path),
            )),
        }
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        Ok(self.cwd.clone())
    }
}
