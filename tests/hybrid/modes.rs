//! Queue and execution mode behaviour of `run` and `wait_and_acquire`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use hybrid_lock::{Lock, LockMode};

use crate::support::{Fixture, Store};

// ============================================================================
// Queue mode
// ============================================================================

fn queue_waits_for_release(store: Store) {
    let fixture = Arc::new(Fixture::new(store));
    let holder = fixture.lock("reports", LockMode::Queue, 30);
    assert!(holder.acquire());

    let counter = Arc::new(AtomicUsize::new(0));
    let events = Arc::new(Mutex::new(Vec::new()));

    let waiter = {
        let fixture = Arc::clone(&fixture);
        let counter = Arc::clone(&counter);
        let events = Arc::clone(&events);
        thread::spawn(move || {
            let lock = fixture.lock("reports", LockMode::Queue, 30);
            lock.run(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                events.lock().unwrap().push("waiter ran");
            })
            .unwrap()
        })
    };

    thread::sleep(Duration::from_millis(150));
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    events.lock().unwrap().push("holder released");
    assert!(holder.release().is_released());

    assert_eq!(waiter.join().unwrap(), Some(()));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(*events.lock().unwrap(), vec!["holder released", "waiter ran"]);
    assert!(!holder.is_locked());
}

#[test]
fn remote_queue_waits_for_release() {
    queue_waits_for_release(Store::Remote);
}

#[test]
fn local_queue_waits_for_release() {
    queue_waits_for_release(Store::Local);
}

fn queue_serialises_workers(store: Store) {
    let fixture = Arc::new(Fixture::new(store));
    let inside = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let fixture = Arc::clone(&fixture);
            let inside = Arc::clone(&inside);
            let overlaps = Arc::clone(&overlaps);
            let completed = Arc::clone(&completed);
            thread::spawn(move || {
                let lock = fixture.lock("reports", LockMode::Queue, 30);
                lock.run(|| {
                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(20));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    completed.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(completed.load(Ordering::SeqCst), 4);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

#[test]
fn remote_queue_serialises_workers() {
    queue_serialises_workers(Store::Remote);
}

#[test]
fn local_queue_serialises_workers() {
    queue_serialises_workers(Store::Local);
}

fn wait_and_acquire_blocks_until_release(store: Store) {
    let fixture = Fixture::new(store);
    let holder = Arc::new(fixture.lock("reports", LockMode::Queue, 30));
    let waiter = fixture.lock("reports", LockMode::Queue, 30);
    assert!(holder.acquire());

    let releaser = {
        let holder = Arc::clone(&holder);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            holder.release()
        })
    };

    waiter.wait_and_acquire(Duration::from_millis(10));
    assert!(releaser.join().unwrap().is_released());
    assert!(waiter.is_locked());
    assert!(waiter.stats().retries > 0);
    assert_eq!(waiter.stats().acquired, 1);
    assert!(waiter.release().is_released());
}

#[test]
fn remote_wait_and_acquire_blocks_until_release() {
    wait_and_acquire_blocks_until_release(Store::Remote);
}

#[test]
fn local_wait_and_acquire_blocks_until_release() {
    wait_and_acquire_blocks_until_release(Store::Local);
}

// ============================================================================
// Execution mode
// ============================================================================

fn execution_skips_when_held(store: Store) {
    let fixture = Fixture::new(store);
    let holder = fixture.lock("reports", LockMode::Execution, 30);
    let lock = fixture.lock("reports", LockMode::Execution, 30);
    assert!(holder.acquire());

    let counter = AtomicUsize::new(0);
    let result = lock.run(|| counter.fetch_add(1, Ordering::SeqCst));

    assert_eq!(result, Ok(None));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(lock.stats().skipped, 1);
    assert!(holder.is_locked());
}

#[test]
fn remote_execution_skips_when_held() {
    execution_skips_when_held(Store::Remote);
}

#[test]
fn local_execution_skips_when_held() {
    execution_skips_when_held(Store::Local);
}

fn execution_runs_and_releases(store: Store) {
    let fixture = Fixture::new(store);
    let lock = fixture.lock("reports", LockMode::Execution, 30);

    assert_eq!(lock.run(|| "done"), Ok(Some("done")));
    assert!(!lock.is_locked());
    assert_eq!(lock.run(|| "again"), Ok(Some("again")));

    let stats = lock.stats();
    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.released, 2);
    assert_eq!(stats.skipped, 0);
}

#[test]
fn remote_execution_runs_and_releases() {
    execution_runs_and_releases(Store::Remote);
}

#[test]
fn local_execution_runs_and_releases() {
    execution_runs_and_releases(Store::Local);
}
