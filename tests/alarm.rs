mod common;

use common::{boot, spawn, tick, ticks};
use kthreads::{Options, Status};

#[test]
fn alarm_zero_and_negative() {
    let k = boot(Options::default());
    let main = k.current();

    k.sleep(0);
    k.sleep(-100);
    k.sleep_until(0);

    assert_eq!(k.current(), main);
    assert_eq!(k.platform().switches(), 0);
    assert!(k.sleeping().is_empty());
}

#[test]
fn past_deadline_returns_immediately() {
    let k = boot(Options::default());
    let main = k.current();
    ticks(&k, 10);

    k.sleep_until(10);
    k.sleep_until(3);

    assert_eq!(k.current(), main);
    assert!(k.sleeping().is_empty());
}

#[test]
fn wakes_at_exactly_the_deadline() {
    let k = boot(Options::default());
    let main = k.current();
    let idle = k.idle_thread().unwrap();

    k.sleep_until(100);
    assert_eq!(k.current(), idle);

    ticks(&k, 99);
    assert_eq!(k.ticks(), 99);
    assert_eq!(k.thread(main).unwrap().status, Status::Blocked);
    assert_eq!(k.sleeping(), [main]);
    assert!(k.ready_list().is_empty());

    tick(&k);
    assert_eq!(k.current(), main);
    assert!(k.sleeping().is_empty());
    assert_eq!(k.thread(main).unwrap().status, Status::Running);
}

#[test]
fn alarm_multiple() {
    let k = boot(Options::default());
    let main = k.current();
    let a = spawn(&k, "a", 31);
    let b = spawn(&k, "b", 31);
    assert_eq!(k.ready_list(), [a, b]);

    k.sleep_until(5);
    assert_eq!(k.current(), a);
    k.sleep_until(5);
    assert_eq!(k.current(), b);
    k.sleep_until(3);
    assert_eq!(k.current(), k.idle_thread().unwrap());

    ticks(&k, 3);
    assert_eq!(k.current(), b);
    assert_eq!(k.sleeping(), [main, a]);

    k.sleep_until(5);
    ticks(&k, 2);

    // Threads due on the same tick wake in the order they went to sleep.
    assert_eq!(k.current(), main);
    assert_eq!(k.ready_list(), [a, b]);
    assert!(k.sleeping().is_empty());
}

#[test]
fn alarm_priority() {
    let k = boot(Options::default());
    let main = k.current();
    k.set_priority(63);

    let low = spawn(&k, "low", 10);
    let high = spawn(&k, "high", 50);
    let mid = spawn(&k, "mid", 30);
    assert_eq!(k.current(), main);

    k.sleep_until(2);
    assert_eq!(k.current(), high);
    k.sleep_until(2);
    assert_eq!(k.current(), mid);
    k.sleep_until(2);
    assert_eq!(k.current(), low);
    k.sleep_until(2);

    ticks(&k, 2);
    // Woken in sleep order, run in priority order.
    assert_eq!(k.current(), main);
    assert_eq!(k.ready_list(), [high, mid, low]);
}

#[test]
fn relative_sleep_counts_from_now() {
    let k = boot(Options::default());
    let main = k.current();
    ticks(&k, 7);

    k.sleep(5);
    assert_eq!(k.thread(main).unwrap().wakeup, 12);
    ticks(&k, 4);
    assert_ne!(k.current(), main);
    tick(&k);
    assert_eq!(k.current(), main);
    assert_eq!(k.elapsed(7), 5);
}

#[test]
fn real_time_sleeps() {
    let k = boot(Options::default());
    let main = k.current();

    // Shorter than a tick: busy-wait on the platform.
    k.usleep(50);
    k.nsleep(1000);
    assert_eq!(k.current(), main);
    assert_eq!(k.platform().delays(), [(50, 1_000_000), (1000, 1_000_000_000)]);

    // 20ms at 100Hz is two ticks.
    k.msleep(20);
    assert_eq!(k.thread(main).unwrap().wakeup, 2);
    ticks(&k, 2);
    assert_eq!(k.current(), main);
}

#[test]
fn idle_ticks_are_accounted() {
    let k = boot(Options::default());
    ticks(&k, 3);
    k.sleep(5);
    ticks(&k, 5);

    let stats = k.stats();
    assert_eq!(stats.kernel_ticks, 3);
    assert_eq!(stats.idle_ticks, 5);
    assert_eq!(stats.user_ticks, 0);
    assert_eq!(
        stats.to_string(),
        "Thread: 5 idle ticks, 3 kernel ticks, 0 user ticks"
    );
    k.print_stats();
}

#[test]
#[should_panic(expected = "interrupt handler")]
fn sleeping_in_an_interrupt_handler_panics() {
    let k = boot(Options::default());
    k.platform().interrupt(|| k.sleep_until(10));
}
