#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use symwatch_test_utils::init_tracing;

use symwatch::FileWatcher;
use symwatch::WatcherOptions;
use symwatch::fs::mock::MockFileSystem;
use symwatch_test_utils::FakeEventSource;

/// Upper bound for anything that is expected to happen.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait before concluding that something did *not* happen.
pub const QUIET: Duration = Duration::from_millis(300);

pub fn fast_options() -> WatcherOptions {
    WatcherOptions {
        callback_threads: 2,
        shutdown_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
    }
}

/// A watcher wired to an in-memory filesystem and a scripted event source.
pub fn scripted_watcher(fs: &MockFileSystem, source: &Arc<FakeEventSource>) -> FileWatcher {
    FileWatcher::with_source(source.clone(), Arc::new(fs.clone()), fast_options())
        .expect("watcher should start")
}

/// Kubernetes-style projected volume:
///
/// ```text
/// /config/..v1/config.yaml
/// /config/..v2/config.yaml
/// /config/..data -> ..v1
/// /config/config.yaml -> ..data/config.yaml
/// ```
pub fn configmap_fs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/config/..v1/config.yaml");
    fs.add_file("/config/..v2/config.yaml");
    fs.set_symlink("/config/..data", "..v1");
    fs.set_symlink("/config/config.yaml", "..data/config.yaml");
    fs
}

pub fn write(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write file");
}

/// Atomically re-point `link` at `target`, the way `ln -sfn` via rename does.
#[cfg(unix)]
pub fn replace_symlink(link: &Path, target: &Path) {
    let tmp = link.with_file_name(format!(
        ".{}.tmp",
        link.file_name().unwrap().to_string_lossy()
    ));
    let _ = fs::remove_file(&tmp);
    std::os::unix::fs::symlink(target, &tmp).expect("create temp symlink");
    fs::rename(&tmp, link).expect("rename symlink into place");
}

/// Give the OS a moment to deliver events for setup work before the part
/// of a test that counts notifications.
pub fn settle() {
    std::thread::sleep(Duration::from_millis(200));
}
