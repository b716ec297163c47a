//! FileLock integration tests: independent handles over one directory.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use hybrid_lock::{FileLock, Lock, LockKey, ReleaseOutcome};
use tempfile::TempDir;

fn file_lock(dir: &TempDir, name: &str, ttl_secs: u64) -> FileLock {
    FileLock::new(LockKey::new(name).unwrap(), dir.path(), ttl_secs).unwrap()
}

// ============================================================================
// Exclusion
// ============================================================================

#[test]
fn concurrent_handles_admit_one_holder() {
    const CONTENDERS: usize = 8;
    let dir = Arc::new(TempDir::new().unwrap());
    let barrier = Arc::new(Barrier::new(CONTENDERS));

    let handles: Vec<_> = (0..CONTENDERS)
        .map(|_| {
            let dir = Arc::clone(&dir);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let lock = file_lock(&dir, "nightly", 30);
                barrier.wait();
                lock.acquire()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn critical_sections_never_overlap() {
    let dir = Arc::new(TempDir::new().unwrap());
    let inside = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let entries = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let dir = Arc::clone(&dir);
            let inside = Arc::clone(&inside);
            let overlaps = Arc::clone(&overlaps);
            let entries = Arc::clone(&entries);
            thread::spawn(move || {
                let lock = file_lock(&dir, "nightly", 30);
                for _ in 0..3 {
                    while !lock.acquire() {
                        thread::sleep(Duration::from_millis(2));
                    }
                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    entries.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(lock.release(), ReleaseOutcome::Released);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(entries.load(Ordering::SeqCst), 12);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Stale files
// ============================================================================

#[test]
fn expired_file_is_taken_over_once() {
    const CONTENDERS: usize = 6;
    let dir = Arc::new(TempDir::new().unwrap());
    let crashed = file_lock(&dir, "nightly", 1);
    assert!(crashed.acquire());
    thread::sleep(Duration::from_millis(1100));

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let handles: Vec<_> = (0..CONTENDERS)
        .map(|_| {
            let dir = Arc::clone(&dir);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let lock = file_lock(&dir, "nightly", 30);
                barrier.wait();
                lock.acquire()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert!(!crashed.release().is_released());
}

#[test]
fn foreign_file_blocks_until_expiry() {
    let dir = TempDir::new().unwrap();
    let lock = file_lock(&dir, "nightly", 1);
    fs::write(lock.path(), "written by another process").unwrap();

    assert!(!lock.acquire());
    assert!(lock.is_locked());

    thread::sleep(Duration::from_millis(1100));
    assert!(!lock.is_locked());
    assert!(lock.acquire());
    assert_ne!(
        fs::read_to_string(lock.path()).unwrap(),
        "written by another process"
    );
}

#[test]
fn release_leaves_no_lock_file() {
    let dir = TempDir::new().unwrap();
    let lock = file_lock(&dir, "nightly", 30);

    assert!(lock.acquire());
    assert!(lock.path().exists());
    assert!(lock.release().is_released());
    assert!(!lock.path().exists());
}
