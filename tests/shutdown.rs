// tests/shutdown.rs

mod common;
use crate::common::{init_tracing, scripted_watcher};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use symwatch::WatchError;
use symwatch::fs::mock::MockFileSystem;
use symwatch::lifecycle::ShutdownController;
use symwatch_test_utils::{FakeEventSource, FakeExecutor, LogCapture, Recorder, Termination};

const TIMEOUT: Duration = Duration::from_secs(2);

struct Rig {
    source: Arc<FakeEventSource>,
    watch: Arc<FakeExecutor>,
    callbacks: Arc<FakeExecutor>,
    controller: ShutdownController,
}

fn rig(source: FakeEventSource, watch: FakeExecutor, callbacks: FakeExecutor) -> Rig {
    let source = Arc::new(source);
    let watch = Arc::new(watch);
    let callbacks = Arc::new(callbacks);
    let controller = ShutdownController::new(
        source.clone(),
        watch.clone(),
        callbacks.clone(),
        TIMEOUT,
    );
    Rig {
        source,
        watch,
        callbacks,
        controller,
    }
}

#[test]
fn close_stops_source_then_both_executors() {
    init_tracing();
    let rig = rig(
        FakeEventSource::new(),
        FakeExecutor::terminating(),
        FakeExecutor::terminating(),
    );

    rig.controller.close();

    assert!(rig.controller.is_closed());
    assert!(rig.source.is_closed());
    assert_eq!(rig.watch.shutdown_calls(), 1);
    assert_eq!(rig.watch.await_calls(), 1);
    assert_eq!(rig.watch.last_timeout(), Some(TIMEOUT));
    assert_eq!(rig.callbacks.shutdown_calls(), 1);
    assert_eq!(rig.callbacks.await_calls(), 1);
    assert_eq!(rig.callbacks.last_timeout(), Some(TIMEOUT));
}

#[test]
fn second_close_does_nothing() {
    init_tracing();
    let rig = rig(
        FakeEventSource::new(),
        FakeExecutor::terminating(),
        FakeExecutor::terminating(),
    );

    rig.controller.close();
    rig.controller.close();

    assert_eq!(rig.source.close_calls(), 1);
    assert_eq!(rig.watch.shutdown_calls(), 1);
    assert_eq!(rig.callbacks.await_calls(), 1);
}

#[test]
fn already_stopped_watch_loop_is_not_awaited() {
    init_tracing();
    let rig = rig(
        FakeEventSource::new(),
        FakeExecutor::already_shut_down(),
        FakeExecutor::terminating(),
    );

    rig.controller.close();

    assert_eq!(rig.watch.shutdown_calls(), 0);
    assert_eq!(rig.watch.await_calls(), 0);
    assert_eq!(rig.callbacks.shutdown_calls(), 1);
}

#[test]
fn already_stopped_callback_pool_is_not_awaited() {
    let logs = LogCapture::new();
    let rig = rig(
        FakeEventSource::new(),
        FakeExecutor::terminating(),
        FakeExecutor::already_shut_down(),
    );

    logs.capture(|| rig.controller.close());

    assert_eq!(rig.callbacks.shutdown_calls(), 0);
    assert_eq!(rig.callbacks.await_calls(), 0);
    assert_eq!(rig.watch.await_calls(), 1);
    assert!(logs.contains("callback dispatcher already shut down"));
}

#[test]
fn source_close_failure_is_logged_and_shutdown_continues() {
    let logs = LogCapture::new();
    let rig = rig(
        FakeEventSource::failing_close(),
        FakeExecutor::terminating(),
        FakeExecutor::terminating(),
    );

    logs.capture(|| rig.controller.close());

    assert_eq!(logs.lines_with("ERROR", "native event source did not close").len(), 1);
    assert_eq!(rig.watch.await_calls(), 1);
    assert_eq!(rig.callbacks.await_calls(), 1);
}

#[test]
fn watch_loop_timeout_is_logged_and_callbacks_still_stop() {
    let logs = LogCapture::new();
    let rig = rig(
        FakeEventSource::new(),
        FakeExecutor::new(Termination::TimedOut),
        FakeExecutor::terminating(),
    );

    logs.capture(|| rig.controller.close());

    assert_eq!(
        logs.lines_with("WARN", "watch loop failed to terminate in 2s").len(),
        1,
        "logs were:\n{}",
        logs.contents()
    );
    assert_eq!(rig.callbacks.shutdown_calls(), 1);
    assert_eq!(rig.callbacks.await_calls(), 1);
}

#[test]
fn interrupted_termination_is_logged_as_error() {
    let logs = LogCapture::new();
    let rig = rig(
        FakeEventSource::new(),
        FakeExecutor::new(Termination::Interrupted("worker died".to_string())),
        FakeExecutor::new(Termination::TimedOut),
    );

    logs.capture(|| rig.controller.close());

    assert_eq!(
        logs.lines_with("ERROR", "watch loop termination interrupted: worker died")
            .len(),
        1
    );
    assert_eq!(
        logs.lines_with("WARN", "callback dispatcher failed to terminate in 2s")
            .len(),
        1
    );
}

#[test]
fn registration_after_close_is_rejected() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/etc/a");
    let source = Arc::new(FakeEventSource::new());
    let watcher = scripted_watcher(&fs, &source);
    let recorder = Recorder::new();
    let listener = recorder.listener();
    watcher.add_watcher_for("/etc/a", Arc::clone(&listener)).unwrap();

    watcher.close();
    assert!(watcher.is_closed());
    assert!(source.is_closed());

    for err in [
        watcher.start_watching("/etc/a").unwrap_err(),
        watcher.add_watcher(recorder.listener()).unwrap_err(),
        watcher.add_watcher_for("/etc/a", recorder.listener()).unwrap_err(),
        watcher.weak_add_watcher(&listener).unwrap_err(),
        watcher.weak_add_watcher_for("/etc/a", &listener).unwrap_err(),
    ] {
        assert!(
            matches!(err, WatchError::IllegalState { .. }),
            "unexpected error: {err:?}"
        );
    }

    // Removal stays allowed.
    watcher.stop_watching("/etc/a").unwrap();
    assert!(!watcher.remove_watcher(&listener));

    // And closing again is harmless.
    watcher.close();
    assert_eq!(source.close_calls(), 1);
}

#[test]
fn illegal_state_names_the_operation() {
    init_tracing();
    let fs = MockFileSystem::new();
    let source = Arc::new(FakeEventSource::new());
    let watcher = scripted_watcher(&fs, &source);
    watcher.close();

    let err = watcher.start_watching("/etc/a").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Illegal state: start watching on closed file watcher"
    );
}

#[test]
fn dropping_the_watcher_closes_it() {
    init_tracing();
    let fs = MockFileSystem::new();
    let source = Arc::new(FakeEventSource::new());
    let watcher = scripted_watcher(&fs, &source);

    drop(watcher);

    assert!(source.is_closed());
    assert_eq!(source.close_calls(), 1);
}

#[test]
fn bad_arguments_are_rejected() {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.deny("/secret");
    let source = Arc::new(FakeEventSource::new());
    let watcher = scripted_watcher(&fs, &source);

    let err = watcher.start_watching("").unwrap_err();
    assert!(matches!(err, WatchError::InvalidArgument(_)));

    let err = watcher.stop_watching(Path::new("")).unwrap_err();
    assert!(matches!(err, WatchError::InvalidArgument(_)));

    let err = watcher.start_watching("/secret/key").unwrap_err();
    assert!(matches!(err, WatchError::Resolution { .. }));
}
