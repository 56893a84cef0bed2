// tests/listener_set.rs

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use symwatch::SharedListener;
use symwatch::watch::{ListenerKey, ListenerSet};

fn counting() -> (SharedListener, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let listener: SharedListener = Arc::new(move |_: &Path| {
        h.fetch_add(1, Ordering::SeqCst);
    });
    (listener, hits)
}

#[test]
fn strong_listener_is_registered_once() {
    let (listener, _) = counting();
    let mut set = ListenerSet::new();

    assert!(set.add_strong(Arc::clone(&listener)));
    assert!(!set.add_strong(Arc::clone(&listener)));
    assert!(!set.add_weak(&listener));
    assert_eq!(set.len(), 1);
}

#[test]
fn remove_reports_whether_anything_was_removed() {
    let (listener, _) = counting();
    let key = ListenerKey::of(&listener);
    let mut set = ListenerSet::new();
    set.add_strong(listener);

    assert!(set.remove(key));
    assert!(!set.remove(key));
    assert!(set.is_empty());
}

#[test]
fn weak_listener_disappears_with_its_last_owner() {
    let (listener, hits) = counting();
    let key = ListenerKey::of(&listener);
    let mut set = ListenerSet::new();
    assert!(set.add_weak(&listener));

    for (_, l) in set.live() {
        l.on_path_update(Path::new("/x"));
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    drop(listener);

    assert!(set.live().is_empty());
    assert!(!set.remove(key));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn strong_registration_keeps_listener_alive() {
    let (listener, hits) = counting();
    let mut set = ListenerSet::new();
    set.add_strong(listener);

    for (_, l) in set.live() {
        l.on_path_update(Path::new("/x"));
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(set.len(), 1);
}

#[test]
fn live_listeners_keep_registration_order() {
    let a = counting().0;
    let b = counting().0;
    let c = counting().0;
    let mut set = ListenerSet::new();
    set.add_strong(Arc::clone(&a));
    set.add_weak(&b);
    set.add_strong(Arc::clone(&c));

    let keys: Vec<ListenerKey> = set.live().into_iter().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        vec![ListenerKey::of(&a), ListenerKey::of(&b), ListenerKey::of(&c)]
    );
}
