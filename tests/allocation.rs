//! The scheduler never touches the heap while interrupts are off.
//!
//! A counting allocator watches one simulated machine per test thread and
//! counts every allocation or free made while that machine has interrupts
//! disabled.

mod common;

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::ptr;

use common::{boot, spawn, ticks, Kernel};
use kthreads::platform::sim::SimPlatform;
use kthreads::thread::{PRI_DEFAULT, PRI_MAX};
use kthreads::{Options, Platform, Status};

struct Counting;

thread_local! {
    static WATCHED: Cell<*const SimPlatform> = const { Cell::new(ptr::null()) };
    static COUNT: Cell<usize> = const { Cell::new(0) };
}

fn note() {
    let _ = WATCHED.try_with(|watched| {
        let platform = watched.get();
        if !platform.is_null() && !unsafe { &*platform }.intr_get() {
            let _ = COUNT.try_with(|count| count.set(count.get() + 1));
        }
    });
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        note();
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        note();
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        note();
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        note();
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOCATOR: Counting = Counting;

/// Runs `f` and returns how many heap operations it made with the kernel's
/// interrupts off.
fn with_interrupts_off(kernel: &Kernel, f: impl FnOnce()) -> usize {
    WATCHED.with(|watched| watched.set(kernel.platform()));
    COUNT.with(|count| count.set(0));
    f();
    WATCHED.with(|watched| watched.set(ptr::null()));
    COUNT.with(|count| count.get())
}

#[test]
fn locks_and_donation() {
    let k = boot(Options::default());
    let main = k.current();

    let count = with_interrupts_off(&k, || {
        let lock = k.lock_create();
        k.lock_acquire(lock);

        let a = spawn(&k, "a", PRI_DEFAULT + 1);
        k.lock_acquire(lock);
        let b = spawn(&k, "b", PRI_DEFAULT + 2);
        k.lock_acquire(lock);
        assert_eq!(k.current(), main);
        assert_eq!(k.lock_waiters(lock), [a, b]);
        assert_eq!(k.donors(main), [a, b]);

        k.lock_release(lock);
        assert_eq!(k.current(), b);
        k.lock_release(lock);
        k.exit_current();
        assert_eq!(k.current(), a);
        k.lock_release(lock);
        k.exit_current();
        assert_eq!(k.current(), main);
        k.yield_now();
    });

    assert_eq!(count, 0);
    assert_eq!(k.threads().len(), 2);
    assert_eq!(k.platform().pages_in_use(), 1);
}

#[test]
fn spawning_many_threads() {
    let k = boot(Options::default());
    let main = k.current();

    let count = with_interrupts_off(&k, || {
        let tids: Vec<_> = (0..40)
            .map(|i| spawn(&k, "worker", PRI_DEFAULT - 1 - i % 3))
            .collect();
        assert_eq!(k.ready_list().len(), tids.len());
        assert!(k
            .threads()
            .iter()
            .all(|t| t.tid == main || t.status != Status::Running));

        k.set_priority(PRI_DEFAULT - 3);
        for _ in &tids {
            k.exit_current();
        }
        assert_eq!(k.current(), main);
        k.yield_now();
    });

    assert_eq!(count, 0);
    assert_eq!(k.platform().pages_in_use(), 1);
}

#[test]
fn sleeping_and_mlfqs_ticks() {
    let k = boot(Options::mlfqs());
    let main = k.current();

    let count = with_interrupts_off(&k, || {
        let others: Vec<_> = (0..5).map(|_| spawn(&k, "spinner", PRI_MAX)).collect();
        k.sleep(3);
        assert_eq!(k.current(), others[0]);
        assert_eq!(k.sleeping(), [main]);

        ticks(&k, 250);
        assert!(k.sleeping().is_empty());
        assert!(k.get_load_avg() > 0);
    });

    assert_eq!(count, 0);
}
