//! TTL expiry without release.

use std::thread;
use std::time::Duration;

use hybrid_lock::{Lock, LockMode};

use crate::support::{Fixture, Store};

/// Key "reports", TTL 1s: A acquires, B is refused, after 1.1s B acquires.
fn abandoned_lock_expires(store: Store) {
    let fixture = Fixture::new(store);
    let a = fixture.lock("reports", LockMode::Execution, 1);
    let b = fixture.lock("reports", LockMode::Execution, 1);

    assert!(a.acquire());
    assert!(!b.acquire());
    assert!(b.is_locked());

    thread::sleep(Duration::from_millis(1100));

    assert!(!b.is_locked());
    assert!(b.acquire());
    assert!(a.is_locked());
}

#[test]
fn remote_abandoned_lock_expires() {
    abandoned_lock_expires(Store::Remote);
}

#[test]
fn local_abandoned_lock_expires() {
    abandoned_lock_expires(Store::Local);
}

fn stale_holder_cannot_release_successor(store: Store) {
    let fixture = Fixture::new(store);
    let stale = fixture.lock("reports", LockMode::Execution, 1);
    let successor = fixture.lock("reports", LockMode::Execution, 30);

    assert!(stale.acquire());
    thread::sleep(Duration::from_millis(1100));
    assert!(successor.acquire());

    assert!(!stale.release().is_released());
    assert!(successor.is_locked());
    assert!(successor.release().is_released());
}

#[test]
fn remote_stale_holder_cannot_release_successor() {
    stale_holder_cannot_release_successor(Store::Remote);
}

#[test]
fn local_stale_holder_cannot_release_successor() {
    stale_holder_cannot_release_successor(Store::Local);
}

#[test]
fn queue_waiter_takes_over_abandoned_lock() {
    for store in [Store::Remote, Store::Local] {
        let fixture = Fixture::new(store);
        let crashed = fixture.lock("reports", LockMode::Queue, 1);
        let waiter = fixture.lock("reports", LockMode::Queue, 1);
        assert!(crashed.acquire());

        // never released: the waiter gets in once the TTL lapses
        assert_eq!(waiter.run(|| 7), Ok(Some(7)));
        assert!(waiter.stats().retries > 0);
    }
}

fn shorter_ttl_cannot_steal_live_lock(store: Store) {
    let fixture = Fixture::new(store);
    let holder = fixture.lock("reports", LockMode::Execution, 30);
    let impatient = fixture.lock("reports", LockMode::Execution, 1);

    assert!(holder.acquire());
    thread::sleep(Duration::from_millis(1100));

    assert!(impatient.is_locked());
    assert!(!impatient.acquire());
    assert!(holder.release().is_released());
}

#[test]
fn remote_shorter_ttl_cannot_steal_live_lock() {
    shorter_ttl_cannot_steal_live_lock(Store::Remote);
}

#[test]
fn local_shorter_ttl_cannot_steal_live_lock() {
    shorter_ttl_cannot_steal_live_lock(Store::Local);
}
