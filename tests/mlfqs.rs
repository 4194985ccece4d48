mod common;

use common::{boot, effective, spawn, ticks};
use kthreads::thread::{PRI_MAX, PRI_MIN};
use kthreads::Options;

#[test]
fn boots_at_max_priority() {
    let k = boot(Options::mlfqs());
    assert_eq!(k.get_priority(), PRI_MAX);
    assert_eq!(k.get_nice(), 0);
    assert_eq!(k.get_load_avg(), 0);
    assert_eq!(k.get_recent_cpu(), 0);
}

#[test]
fn explicit_priorities_are_ignored() {
    let k = boot(Options::mlfqs());
    let main = k.current();

    let t = spawn(&k, "low", PRI_MIN);
    assert_eq!(k.thread(t).unwrap().priority, PRI_MAX);
    assert_eq!(k.current(), main);

    k.set_priority(PRI_MIN);
    assert_eq!(k.get_priority(), PRI_MAX);
}

#[test]
fn nice_lowers_priority() {
    let k = boot(Options::mlfqs());
    let main = k.current();
    let other = spawn(&k, "other", PRI_MAX);

    k.set_nice(5);
    assert_eq!(effective(&k, main), PRI_MAX - 10);
    assert_eq!(k.thread(main).unwrap().nice, 5);
    assert_eq!(k.current(), other);
}

#[test]
fn recent_cpu_counts_running_ticks() {
    let k = boot(Options::mlfqs());
    ticks(&k, 1);
    assert_eq!(k.get_recent_cpu(), 100);
    ticks(&k, 9);
    assert_eq!(k.get_recent_cpu(), 1000);
}

#[test]
fn mlfqs_load_1() {
    let k = boot(Options::mlfqs());

    ticks(&k, 99);
    assert_eq!(k.get_load_avg(), 0);
    assert_eq!(k.get_recent_cpu(), 9900);

    ticks(&k, 1);
    // load_avg = 1/60, recent_cpu = 100 * (2/60) / (2/60 + 1)
    assert_eq!(k.get_load_avg(), 1);
    assert_eq!(k.get_recent_cpu(), 322);
    assert_eq!(k.get_priority(), 62);
}

#[test]
fn recalculation_reorders_ready_threads() {
    let k = boot(Options::mlfqs());
    let main = k.current();

    let niced = spawn(&k, "niced", PRI_MAX);
    k.yield_now();
    assert_eq!(k.current(), niced);
    k.set_nice(20);
    assert_eq!(k.current(), main);
    assert_eq!(effective(&k, niced), 23);

    ticks(&k, 100);
    assert_eq!(k.current(), main);
    assert_eq!(k.get_load_avg(), 3);
    assert_eq!(k.get_recent_cpu(), 624);
    assert_eq!(k.get_priority(), 61);

    let info = k.thread(niced).unwrap();
    assert_eq!(info.recent_cpu.trunc(), 20);
    assert_eq!(info.effective_priority, 18);
    assert_eq!(k.ready_list(), [niced]);
}

#[test]
fn idle_cpu_carries_no_load() {
    let k = boot(Options::mlfqs());
    let main = k.current();

    k.sleep_until(200);
    ticks(&k, 200);

    assert_eq!(k.current(), main);
    assert_eq!(k.get_load_avg(), 0);
    assert_eq!(k.get_recent_cpu(), 0);
    assert_eq!(k.stats().idle_ticks, 200);

    let idle = k.idle_thread().unwrap();
    assert_eq!(k.thread(idle).unwrap().recent_cpu.trunc(), 0);
}

#[test]
#[should_panic(expected = "nice 21 out of range")]
fn nice_out_of_range_panics() {
    let k = boot(Options::mlfqs());
    k.set_nice(21);
}
