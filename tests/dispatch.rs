// tests/dispatch.rs

mod common;
use crate::common::{TIMEOUT, init_tracing};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use symwatch::SharedListener;
use symwatch::dispatch::{CallbackDispatcher, Notification};
use symwatch::lifecycle::ExecutorService;
use symwatch::watch::ListenerKey;
use symwatch_test_utils::Recorder;

fn notification(listener: &SharedListener, path: &str) -> Notification {
    Notification {
        key: ListenerKey::of(listener),
        listener: Arc::clone(listener),
        path: PathBuf::from(path),
    }
}

#[test]
fn each_listener_sees_its_notifications_in_order() {
    init_tracing();
    let dispatcher = CallbackDispatcher::new(4).unwrap();
    let a = Recorder::new();
    let b = Recorder::new();
    let la = a.listener();
    let lb = b.listener();

    for i in 0..50 {
        assert!(dispatcher.submit(notification(&la, &format!("/a/{i}"))));
        assert!(dispatcher.submit(notification(&lb, &format!("/b/{i}"))));
    }

    assert!(a.wait_for_count(50, TIMEOUT));
    assert!(b.wait_for_count(50, TIMEOUT));
    let expected_a: Vec<PathBuf> = (0..50).map(|i| PathBuf::from(format!("/a/{i}"))).collect();
    assert_eq!(a.paths(), expected_a);
}

#[test]
fn panicking_listener_is_isolated() {
    init_tracing();
    let dispatcher = CallbackDispatcher::new(1).unwrap();
    let bomb: SharedListener = Arc::new(|_: &Path| -> () { panic!("boom") });
    let recorder = Recorder::new();
    let ok = recorder.listener();

    dispatcher.submit(notification(&bomb, "/x"));
    dispatcher.submit(notification(&ok, "/y"));
    dispatcher.submit(notification(&bomb, "/x"));
    dispatcher.submit(notification(&ok, "/z"));

    assert!(recorder.wait_for_count(2, TIMEOUT));
    dispatcher.shutdown();
    assert_eq!(dispatcher.await_termination(TIMEOUT), Ok(true));
}

#[test]
fn shutdown_finishes_queued_work_and_refuses_new_work() {
    init_tracing();
    let dispatcher = CallbackDispatcher::new(2).unwrap();
    let recorder = Recorder::new();
    let inner = recorder.listener();
    let slow: SharedListener = Arc::new(move |path: &Path| {
        thread::sleep(Duration::from_millis(20));
        inner.on_path_update(path);
    });

    for i in 0..5 {
        dispatcher.submit(notification(&slow, &format!("/s/{i}")));
    }
    dispatcher.shutdown();
    assert!(dispatcher.is_shutdown());
    assert!(!dispatcher.submit(notification(&slow, "/late")));

    assert_eq!(dispatcher.await_termination(TIMEOUT), Ok(true));
    assert_eq!(recorder.count(), 5);
}

#[test]
fn await_termination_times_out_on_a_stuck_listener() {
    init_tracing();
    let dispatcher = CallbackDispatcher::new(1).unwrap();
    let stuck: SharedListener = Arc::new(|_: &Path| thread::sleep(Duration::from_millis(500)));

    dispatcher.submit(notification(&stuck, "/x"));
    thread::sleep(Duration::from_millis(20));
    dispatcher.shutdown();

    assert_eq!(
        dispatcher.await_termination(Duration::from_millis(50)),
        Ok(false)
    );
    assert_eq!(dispatcher.await_termination(TIMEOUT), Ok(true));
}

#[test]
fn zero_threads_still_runs_callbacks() {
    init_tracing();
    let dispatcher = CallbackDispatcher::new(0).unwrap();
    let recorder = Recorder::new();

    dispatcher.submit(notification(&recorder.listener(), "/x"));

    assert!(recorder.wait_for_count(1, TIMEOUT));
}

#[test]
fn blocked_listener_does_not_delay_other_workers() {
    init_tracing();
    let dispatcher = CallbackDispatcher::new(4).unwrap();
    let released = Arc::new(AtomicBool::new(false));
    let gate = Arc::clone(&released);
    let blocked: SharedListener = Arc::new(move |_: &Path| {
        while !gate.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
    });
    let blocked_worker = dispatcher.worker_for(ListenerKey::of(&blocked));

    // Listeners stay alive so their keys are distinct.
    let candidates: Vec<(Recorder, SharedListener)> = (0..64)
        .map(|_| {
            let recorder = Recorder::new();
            let listener = recorder.listener();
            (recorder, listener)
        })
        .collect();
    let (recorder, other) = candidates
        .iter()
        .find(|(_, l)| dispatcher.worker_for(ListenerKey::of(l)) != blocked_worker)
        .expect("some listener routed to another worker");

    assert!(dispatcher.submit(notification(&blocked, "/blocked")));
    assert!(dispatcher.submit(notification(other, "/free")));

    assert!(recorder.wait_for_count(1, TIMEOUT));
    released.store(true, Ordering::SeqCst);
    dispatcher.shutdown();
    assert_eq!(dispatcher.await_termination(TIMEOUT), Ok(true));
}

#[test]
fn listeners_are_spread_across_workers() {
    let dispatcher = CallbackDispatcher::new(4).unwrap();
    let listeners: Vec<SharedListener> = (0..64)
        .map(|_| -> SharedListener { Arc::new(|_: &Path| {}) })
        .collect();

    let used: HashSet<usize> = listeners
        .iter()
        .map(|l| dispatcher.worker_for(ListenerKey::of(l)))
        .collect();

    assert!(used.len() > 1, "all listeners routed to {used:?}");
    assert!(used.iter().all(|&w| w < 4));
}
