//! Admission contracts of the readers-writers gate.

mod common;

use common::{wait_until, PROGRESS_TIMEOUT};
use libris::error::LibraryError;
use libris::events::EventBus;
use libris::gate::AccessGate;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A writer that starts waiting is admitted before any reader that arrives
/// afterwards, however many readers keep coming.
#[test]
fn waiting_writer_is_not_overtaken_by_later_readers() {
    let gate = Arc::new(AccessGate::new(EventBus::disabled()));
    let admissions: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let first_reader = gate.acquire_read(1).unwrap();

    let writer_gate = Arc::clone(&gate);
    let writer_log = Arc::clone(&admissions);
    let writer = thread::spawn(move || {
        let ticket = writer_gate.acquire_write().unwrap();
        writer_log.lock().push("writer");
        drop(ticket);
    });
    assert!(wait_until(PROGRESS_TIMEOUT, || gate.snapshot().writer_waiting));

    // A whole generation of readers arrives while the writer waits.
    let mut late_readers = Vec::new();
    for id in 2..6 {
        let reader_gate = Arc::clone(&gate);
        let reader_log = Arc::clone(&admissions);
        late_readers.push(thread::spawn(move || {
            let ticket = reader_gate.acquire_read(id).unwrap();
            reader_log.lock().push("reader");
            drop(ticket);
        }));
    }

    // None of them get in ahead of the writer.
    thread::sleep(Duration::from_millis(50));
    assert!(admissions.lock().is_empty());
    assert_eq!(gate.snapshot().active_readers, 1);

    drop(first_reader);
    writer.join().unwrap();
    for reader in late_readers {
        reader.join().unwrap();
    }

    let order = admissions.lock();
    assert_eq!(order[0], "writer");
    assert_eq!(order.len(), 5);
}

/// The exclusion invariant holds at every sampled instant under load.
#[test]
fn exclusion_invariant_holds_under_contention() {
    let gate = Arc::new(AccessGate::new(EventBus::disabled()));
    let running = Arc::new(AtomicBool::new(true));

    let mut units = Vec::new();
    for id in 0..4 {
        let gate = Arc::clone(&gate);
        let running = Arc::clone(&running);
        units.push(thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                if let Ok(ticket) = gate.acquire_read(id) {
                    thread::yield_now();
                    drop(ticket);
                }
            }
        }));
    }
    let writer_gate = Arc::clone(&gate);
    let writer_running = Arc::clone(&running);
    units.push(thread::spawn(move || {
        while writer_running.load(Ordering::Relaxed) {
            if let Ok(ticket) = writer_gate.acquire_write() {
                thread::yield_now();
                drop(ticket);
            }
        }
    }));

    let deadline = std::time::Instant::now() + Duration::from_millis(200);
    while std::time::Instant::now() < deadline {
        let snapshot = gate.snapshot();
        assert!(
            !(snapshot.active_readers > 0 && snapshot.writer_active),
            "readers and writer admitted simultaneously: {snapshot:?}"
        );
    }

    running.store(false, Ordering::Relaxed);
    for unit in units {
        unit.join().unwrap();
    }
}

/// Shutdown releases every parked caller with `Cancelled`; nobody hangs.
#[test]
fn close_cancels_all_parked_callers() {
    let gate = Arc::new(AccessGate::new(EventBus::disabled()));
    let blocker = gate.acquire_write().unwrap();

    let mut parked = Vec::new();
    for id in 0..3 {
        let gate = Arc::clone(&gate);
        parked.push(thread::spawn(move || gate.acquire_read(id).map(|_| ())));
    }
    let writer_gate = Arc::clone(&gate);
    parked.push(thread::spawn(move || writer_gate.acquire_write().map(|_| ())));

    assert!(wait_until(PROGRESS_TIMEOUT, || gate.snapshot().writer_waiting));
    gate.close();

    for caller in parked {
        assert!(matches!(
            caller.join().unwrap(),
            Err(LibraryError::Cancelled)
        ));
    }

    // Held access is unaffected by the close and releases normally.
    drop(blocker);
    assert!(!gate.snapshot().writer_active);
}

/// New admissions after close fail immediately instead of blocking.
#[test]
fn close_rejects_new_callers() {
    let gate = AccessGate::new(EventBus::disabled());
    gate.close();
    assert!(matches!(gate.acquire_read(1), Err(LibraryError::Cancelled)));
    assert!(matches!(gate.acquire_write(), Err(LibraryError::Cancelled)));
}
