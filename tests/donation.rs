mod common;

use common::{boot, effective, spawn};
use kthreads::thread::PRI_DEFAULT;
use kthreads::{Options, Status};

#[test]
fn donate_one() {
    let k = boot(Options::default());
    let main = k.current();
    let lock = k.lock_create();
    k.lock_acquire(lock);

    let a = spawn(&k, "acquire1", PRI_DEFAULT + 1);
    assert_eq!(k.current(), a);
    k.lock_acquire(lock);
    assert_eq!(k.current(), main);
    assert_eq!(k.get_priority(), PRI_DEFAULT + 1);

    let b = spawn(&k, "acquire2", PRI_DEFAULT + 2);
    k.lock_acquire(lock);
    assert_eq!(k.current(), main);
    assert_eq!(k.get_priority(), PRI_DEFAULT + 2);
    assert_eq!(k.lock_waiters(lock), [a, b]);

    // The lock goes straight to the highest-priority waiter.
    k.lock_release(lock);
    assert_eq!(k.current(), b);
    assert_eq!(k.lock_holder(lock), Some(b));
    assert!(k.lock_held_by_current(lock));
    assert_eq!(k.lock_waiters(lock), [a]);
    assert_eq!(effective(&k, main), PRI_DEFAULT);

    k.lock_release(lock);
    assert_eq!(k.current(), b);
    assert_eq!(k.lock_holder(lock), Some(a));
    assert_eq!(k.thread(a).unwrap().status, Status::Ready);

    k.exit_current();
    assert_eq!(k.current(), a);
    assert!(k.lock_held_by_current(lock));
    k.lock_release(lock);
    assert_eq!(k.lock_holder(lock), None);
}

#[test]
fn donate_multiple() {
    let k = boot(Options::default());
    let main = k.current();
    let (la, lb) = (k.lock_create(), k.lock_create());
    k.lock_acquire(la);
    k.lock_acquire(lb);

    let a = spawn(&k, "a", PRI_DEFAULT + 1);
    k.lock_acquire(la);
    assert_eq!(k.current(), main);
    assert_eq!(k.get_priority(), PRI_DEFAULT + 1);

    let b = spawn(&k, "b", PRI_DEFAULT + 2);
    k.lock_acquire(lb);
    assert_eq!(k.current(), main);
    assert_eq!(k.get_priority(), PRI_DEFAULT + 2);

    // Only the donation through `lb` goes away.
    k.lock_release(lb);
    assert_eq!(k.current(), b);
    assert_eq!(effective(&k, main), PRI_DEFAULT + 1);
    assert_eq!(k.donors(main), [a]);

    k.lock_release(lb);
    k.exit_current();
    assert_eq!(k.current(), main);

    k.lock_release(la);
    assert_eq!(k.current(), a);
    assert_eq!(effective(&k, main), PRI_DEFAULT);
    assert!(k.donors(main).is_empty());
}

#[test]
fn donate_nest() {
    let k = boot(Options::default());
    let main = k.current();
    let (la, lb) = (k.lock_create(), k.lock_create());
    k.lock_acquire(la);

    let medium = spawn(&k, "medium", PRI_DEFAULT + 1);
    k.lock_acquire(lb);
    k.lock_acquire(la);
    assert_eq!(k.current(), main);
    assert_eq!(k.get_priority(), PRI_DEFAULT + 1);

    let high = spawn(&k, "high", PRI_DEFAULT + 2);
    k.lock_acquire(lb);
    assert_eq!(k.current(), main);
    assert_eq!(effective(&k, medium), PRI_DEFAULT + 2);
    assert_eq!(k.get_priority(), PRI_DEFAULT + 2);

    k.lock_release(la);
    assert_eq!(k.current(), medium);
    assert_eq!(k.get_priority(), PRI_DEFAULT + 2);
    assert_eq!(effective(&k, main), PRI_DEFAULT);

    k.lock_release(lb);
    assert_eq!(k.current(), high);
    assert_eq!(effective(&k, medium), PRI_DEFAULT + 1);
}

#[test]
fn donate_lower() {
    let k = boot(Options::default());
    let main = k.current();
    let lock = k.lock_create();
    k.lock_acquire(lock);

    let a = spawn(&k, "acquire", PRI_DEFAULT + 10);
    k.lock_acquire(lock);
    assert_eq!(k.get_priority(), PRI_DEFAULT + 10);

    // Lowering the base priority keeps the donation.
    k.set_priority(PRI_DEFAULT - 10);
    assert_eq!(k.current(), main);
    assert_eq!(k.get_priority(), PRI_DEFAULT + 10);

    k.lock_release(lock);
    assert_eq!(k.current(), a);
    assert_eq!(effective(&k, main), PRI_DEFAULT - 10);
}

#[test]
fn donate_chain_is_capped() {
    const BASE: u32 = 10;
    const CHAIN: usize = 10;

    let k = boot(Options::default());
    let main = k.current();
    k.set_priority(BASE);

    let locks: Vec<_> = (0..CHAIN).map(|_| k.lock_create()).collect();
    k.lock_acquire(locks[0]);

    let mut threads = Vec::new();
    for i in 1..CHAIN {
        let tid = spawn(&k, &format!("chain {}", i), BASE + i as u32);
        assert_eq!(k.current(), tid);
        k.lock_acquire(locks[i]);
        k.lock_acquire(locks[i - 1]);
        assert_eq!(k.current(), main);
        threads.push(tid);
    }

    // Each of the last holders got the top donation, but only eight hops up.
    let top = BASE + CHAIN as u32 - 1;
    assert_eq!(effective(&k, threads[7]), top);
    assert_eq!(effective(&k, threads[0]), top);
    assert_eq!(effective(&k, main), BASE + 8);

    let last = spawn(&k, "chain 10", top + 1);
    k.lock_acquire(locks[CHAIN - 1]);
    assert_eq!(k.current(), main);
    assert_eq!(effective(&k, threads[1]), top + 1);
    assert_eq!(effective(&k, threads[0]), top);
    assert_eq!(effective(&k, main), BASE + 8);
    assert_eq!(k.lock_waiters(locks[CHAIN - 1]), [last]);

    // Releasing the last lock restores the base priority.
    k.lock_release(locks[0]);
    assert_eq!(effective(&k, main), BASE);
    assert_eq!(k.current(), threads[0]);
    assert_eq!(k.get_priority(), top + 1);
}

#[test]
fn donation_depth_is_configurable() {
    let k = boot(Options {
        donation_depth: 1,
        ..Options::default()
    });
    let main = k.current();
    let (la, lb) = (k.lock_create(), k.lock_create());
    k.lock_acquire(la);

    let medium = spawn(&k, "medium", PRI_DEFAULT + 1);
    k.lock_acquire(lb);
    k.lock_acquire(la);

    spawn(&k, "high", PRI_DEFAULT + 2);
    k.lock_acquire(lb);

    assert_eq!(effective(&k, medium), PRI_DEFAULT + 2);
    assert_eq!(effective(&k, main), PRI_DEFAULT + 1);
}

#[test]
fn no_donation_under_mlfqs() {
    let k = boot(Options::mlfqs());
    let main = k.current();
    let lock = k.lock_create();
    k.lock_acquire(lock);

    let a = spawn(&k, "a", PRI_DEFAULT);
    k.yield_now();
    assert_eq!(k.current(), a);
    k.lock_acquire(lock);

    assert_eq!(k.current(), main);
    assert!(k.donors(main).is_empty());
    assert_eq!(k.lock_waiters(lock), [a]);

    k.lock_release(lock);
    assert_eq!(k.lock_holder(lock), Some(a));
    assert_eq!(k.thread(a).unwrap().waiting_on, None);
}

#[test]
fn try_acquire_never_blocks() {
    let k = boot(Options::default());
    let lock = k.lock_create();
    assert!(k.lock_try_acquire(lock));
    assert!(k.lock_held_by_current(lock));

    let a = spawn(&k, "a", PRI_DEFAULT + 1);
    assert!(!k.lock_try_acquire(lock));
    assert!(!k.lock_held_by_current(lock));
    assert_eq!(k.current(), a);
    assert!(k.lock_waiters(lock).is_empty());
}

#[test]
#[should_panic(expected = "does not hold it")]
fn release_by_non_holder_panics() {
    let k = boot(Options::default());
    let lock = k.lock_create();
    k.lock_release(lock);
}

#[test]
#[should_panic(expected = "recursively")]
fn recursive_acquire_panics() {
    let k = boot(Options::default());
    let lock = k.lock_create();
    k.lock_acquire(lock);
    k.lock_acquire(lock);
}
