//! Cell-level behavior: notification rounds, reentrancy, sessions, and
//! handle lifetimes.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use signal_flow::{Cell, ListenerToken, ReactError};

#[test]
fn test_each_set_produces_one_round_in_order() {
    let cell = Cell::new(0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    cell.react({
        let seen = seen.clone();
        move |value| seen.lock().unwrap().push(*value)
    });

    for value in 1..=3 {
        cell.set(value).unwrap();
    }
    // Three writes, three rounds, each listener invocation seeing the value
    // of its own round.
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_reentrant_write_is_rejected_and_dropped() {
    let cell = Cell::new(1);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let handle = cell.handle();
    cell.react({
        let errors = errors.clone();
        move |value| {
            if *value == 2 {
                if let Err(error) = handle.set(99) {
                    errors.lock().unwrap().push(error);
                }
            }
        }
    });

    cell.set(2).unwrap();

    assert_eq!(cell.get(), 2);
    assert_eq!(*errors.lock().unwrap(), vec![ReactError::ReentrantMutation]);
}

#[test]
fn test_is_notifying_visible_to_listeners() {
    let cell = Cell::new(0);
    let inside = Arc::new(AtomicBool::new(false));
    let handle = cell.handle();
    cell.react({
        let inside = inside.clone();
        move |_| {
            let notifying = handle.lock().is_some_and(|cell| cell.is_notifying());
            inside.store(notifying, Ordering::SeqCst);
        }
    });
    assert!(!cell.is_notifying());
    cell.set(1).unwrap();
    assert!(inside.load(Ordering::SeqCst));
    assert!(!cell.is_notifying());
}

#[test]
fn test_session_coalesces_edits_into_final_value() {
    let cell = Cell::new(0);
    let rounds = Arc::new(AtomicU32::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    cell.react({
        let rounds = rounds.clone();
        let seen = seen.clone();
        move |value| {
            rounds.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(*value);
        }
    });

    {
        let mut session = cell.session().unwrap();
        for next in [10, 20, 30, 40, 50] {
            *session = next;
        }
    }

    assert_eq!(rounds.load(Ordering::SeqCst), 1);
    assert_eq!(*seen.lock().unwrap(), vec![50]);
    assert_eq!(cell.get(), 50);
}

#[test]
fn test_direct_write_under_open_session_is_rejected() {
    let cell = Cell::new(0);
    let session = cell.session().unwrap();
    assert_eq!(cell.set(7), Err(ReactError::ReentrantMutation));
    drop(session);
    // The guard is released with the session.
    cell.set(7).unwrap();
    assert_eq!(cell.get(), 7);
}

#[test]
fn test_dead_cell_reports_absence_everywhere() {
    let cell = Cell::new(1);
    let handle = cell.handle();
    let token = handle.react(|_| {}).unwrap();
    drop(cell);

    assert_eq!(handle.get(), None);
    assert_eq!(handle.set(2), Err(ReactError::CellDropped));
    assert!(handle.react(|_| {}).is_none());
    handle.unreact(token); // must not panic
    assert_eq!(handle.session().err(), Some(ReactError::CellDropped));
    assert!(handle.lock().is_none());
}

#[test]
fn test_cloned_handle_starts_without_subscriptions() {
    let cell = Cell::new(0);
    let fired = Arc::new(AtomicU32::new(0));
    let original = cell.handle();
    original
        .react({
            let fired = fired.clone();
            move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

    let clone = original.clone();
    drop(clone);
    // Dropping the clone must not release the original's listener.
    cell.set(1).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    drop(original);
    cell.set(2).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_listener_added_mid_round_waits_for_next_round() {
    let cell = Cell::new(0);
    let late_fires = Arc::new(AtomicU32::new(0));
    let registered = Arc::new(AtomicBool::new(false));
    let handle = cell.handle();
    cell.react({
        let late_fires = late_fires.clone();
        let registered = registered.clone();
        move |_| {
            if !registered.swap(true, Ordering::SeqCst) {
                let cell = handle.lock().expect("cell alive during its own round");
                let late_fires = late_fires.clone();
                cell.react(move |_| {
                    late_fires.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
    });

    cell.set(1).unwrap();
    assert_eq!(late_fires.load(Ordering::SeqCst), 0);
    cell.set(2).unwrap();
    assert_eq!(late_fires.load(Ordering::SeqCst), 1);
}

#[test]
fn test_listener_removed_mid_round_still_fires_that_round() {
    let cell = Cell::new(0);
    let second_fires = Arc::new(AtomicU32::new(0));
    let second_token: Arc<Mutex<Option<ListenerToken>>> = Arc::new(Mutex::new(None));

    let handle = cell.handle();
    cell.react({
        let second_token = second_token.clone();
        move |_| {
            if let (Some(cell), Some(token)) = (handle.lock(), *second_token.lock().unwrap()) {
                cell.unreact(token);
            }
        }
    });
    let token = cell.react({
        let second_fires = second_fires.clone();
        move |_| {
            second_fires.fetch_add(1, Ordering::SeqCst);
        }
    });
    *second_token.lock().unwrap() = Some(token);

    // The first listener removes the second during the round, but the
    // round runs against its snapshot.
    cell.set(1).unwrap();
    assert_eq!(second_fires.load(Ordering::SeqCst), 1);

    cell.set(2).unwrap();
    assert_eq!(second_fires.load(Ordering::SeqCst), 1);
}

#[test]
fn test_handle_drop_releases_its_listeners() {
    let cell = Cell::new(0);
    let fired = Arc::new(AtomicU32::new(0));
    let handle = cell.handle();
    handle
        .react({
            let fired = fired.clone();
            move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

    cell.set(1).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    drop(handle);
    cell.set(2).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}
