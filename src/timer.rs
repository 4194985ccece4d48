//! Timer ticks and sleeping.
//!
//! The platform calls [`Manager::timer_interrupt`] `timer_freq` times per
//! second. Everything time-based in the scheduler counts these ticks: sleeps,
//! time slices and the MLFQS statistics.

use crate::platform::Platform;
use crate::thread::{Manager, Tid};

impl<P: Platform> Manager<P> {
    /// Timer ticks since the OS booted.
    pub fn ticks(&self) -> i64 {
        let guard = self.intr_disable();
        let state = self.state.lock(&guard);
        state.ticks
    }

    /// Ticks elapsed since `then`, a value once returned by
    /// [`Manager::ticks`].
    pub fn elapsed(&self, then: i64) -> i64 {
        self.ticks() - then
    }

    /// Sleeps for approximately `ticks` timer ticks. Interrupts must be on.
    pub fn sleep(&self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        let start = self.ticks();
        self.sleep_until(start + ticks);
    }

    /// Blocks the current thread until the tick count reaches `tick`.
    /// Returns at once if that tick already passed.
    pub fn sleep_until(&self, tick: i64) {
        assert!(
            !self.platform.intr_context(),
            "sleeping inside an interrupt handler"
        );
        self.reap();

        let guard = self.intr_disable();
        let sleeper: Tid = {
            let mut state = self.state.lock(&guard);
            if tick <= state.ticks {
                return;
            }
            let current = state.current;
            assert!(!state.is_idle(current), "the idle thread cannot sleep");
            debug_assert!(!state.alarm.contains(current));
            state.running_mut().wakeup = tick;
            state.alarm.register(current);
            current
        };

        log::debug!("thread {} sleeps until tick {}", sleeper, tick);
        self.block(&guard);
    }

    /// Sleeps for approximately `ms` milliseconds.
    pub fn msleep(&self, ms: i64) {
        self.real_time_sleep(ms, 1000);
    }

    /// Sleeps for approximately `us` microseconds.
    pub fn usleep(&self, us: i64) {
        self.real_time_sleep(us, 1000 * 1000);
    }

    /// Sleeps for approximately `ns` nanoseconds.
    pub fn nsleep(&self, ns: i64) {
        self.real_time_sleep(ns, 1000 * 1000 * 1000);
    }

    /// Sleeps for `num / denom` seconds. Waits shorter than a tick busy-wait
    /// instead, since the timer cannot wake us any sooner.
    fn real_time_sleep(&self, num: i64, denom: i64) {
        let ticks = num * self.options.timer_freq / denom;
        if ticks > 0 {
            assert!(self.platform.intr_get(), "sleeping with interrupts off");
            self.sleep(ticks);
        } else {
            self.platform.delay(num, denom);
        }
    }

    /// The timer interrupt handler body.
    ///
    /// Runs the per-tick bookkeeping and wakes due sleepers. It never
    /// switches threads itself; when the running thread used up its slice or
    /// was outranked, it asks for a yield on interrupt return.
    pub fn timer_interrupt(&self) {
        assert!(
            self.platform.intr_context(),
            "timer interrupt outside an interrupt handler"
        );

        let guard = self.intr_disable();
        let preempt = {
            let mut state = self.state.lock(&guard);
            let state = &mut *state;
            state.ticks += 1;

            let expired = state.thread_tick(&self.options);
            state
                .alarm
                .wake(state.ticks, &mut state.all, &mut state.scheduler);

            expired || state.should_preempt()
        };

        if preempt {
            self.platform.yield_on_return();
        }
    }

    /// Logs timer and thread statistics.
    pub fn print_stats(&self) {
        let (ticks, stats) = {
            let guard = self.intr_disable();
            let state = self.state.lock(&guard);
            (state.ticks, state.stats)
        };
        log::info!("Timer: {} ticks", ticks);
        log::info!("{}", stats);
    }
}
