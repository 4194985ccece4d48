//! Kernel Threads
//!
//! A thread is created [`Blocked`](Status::Blocked), immediately becomes
//! [`Ready`](Status::Ready), and from then on moves between the states below
//! until it exits:
//!
//! ```text
//!            dispatch             exit
//!   Ready ──────────────> Running ─────> Dying ──> reclaimed
//!     ^  <──────────────    │
//!     │       yield         │ block (sleep, lock)
//!     │                     v
//!     └─────── unblock ── Blocked
//! ```
//!
//! The ready queue is ordered by effective priority. The running thread gives
//! up the CPU when it blocks, yields, exits, when a higher-priority thread
//! becomes ready, or when the timer interrupt finds its time slice used up.

pub(crate) mod alarm;
pub(crate) mod imp;
mod manager;
pub(crate) mod scheduler;
pub(crate) mod storage;
mod switch;

use alloc::string::String;
use alloc::vec::Vec;

use crate::config::Options;
use crate::platform::{Platform, TimerHandler};
use crate::sync::IntrGuard;
use crate::{OsError, Result};

use self::imp::{Stack, Thread};
use self::scheduler::priority::donate::Donate;

pub use self::imp::{
    Builder, Flags, Name, Status, ThreadFunc, ThreadInfo, Tid, NAME_MAX, NICE_DEFAULT, NICE_MAX,
    NICE_MIN, PRI_DEFAULT, PRI_MAX, PRI_MIN, THREAD_MAGIC,
};
pub use self::manager::{Manager, Stats};
pub(crate) use self::manager::State;
pub(crate) use self::scheduler::{mlfqs, Schedule, Scheduler};

use self::mlfqs::Mlfqs;

impl<P: Platform> Manager<P> {
    /// Starts preemptive thread scheduling: creates the idle thread running
    /// `idle`, installs `timer` as the timer interrupt handler and enables
    /// interrupts.
    ///
    /// `idle` should call [`Manager::idle`].
    pub fn start(&self, idle: ThreadFunc, timer: TimerHandler) -> Result<()> {
        self.create(Name::new("idle"), PRI_MIN, Flags::IDLE, idle, 0)?;
        self.platform.register_timer(timer);
        self.platform.intr_set(true);
        Ok(())
    }

    /// Creates a new kernel thread named `name` with the given initial
    /// `priority`, which runs `entry(aux)`.
    ///
    /// The new thread may be scheduled, and may even exit, before this
    /// returns.
    pub fn spawn(&self, name: &str, priority: u32, entry: ThreadFunc, aux: usize) -> Result<Tid> {
        Builder::new(entry, aux)
            .name(name)
            .priority(priority)
            .spawn(self)
    }

    pub(crate) fn create(
        &self,
        name: Name,
        priority: u32,
        flags: Flags,
        entry: ThreadFunc,
        aux: usize,
    ) -> Result<Tid> {
        assert!(
            (PRI_MIN..=PRI_MAX).contains(&priority),
            "priority {} out of range",
            priority
        );
        assert!(!flags.contains(Flags::BOOT));
        let idle = flags.contains(Flags::IDLE);
        self.reap();

        let tid = {
            let guard = self.intr_disable();
            let mut state = self.state.lock(&guard);
            state.allocate_tid()?
        };

        // Everything the thread owns is allocated with interrupts on.
        let page = self.platform.alloc_page().ok_or(OsError::OutOfMemory)?;
        let stack = Stack::new(page);
        let stack_top = stack.top();

        let mut thread: Thread<P::Context> = Thread::new(name, priority, flags, Some(stack));
        thread.tid = tid;
        if self.options.mlfqs && !idle {
            thread.priority = Mlfqs::priority(thread.recent_cpu, thread.nice);
            thread.effective = thread.priority;
        }
        self.platform
            .init_context(&mut thread.context, stack_top, entry, aux);

        {
            let guard = self.thread_room();
            let mut state = self.state.lock(&guard);
            state.all.insert(thread);
            if idle {
                assert!(state.idle.is_none(), "idle thread created twice");
                state.idle = Some(tid);
            } else {
                state.make_ready(tid);
            }
        }

        log::debug!("spawned thread {} `{}` at priority {}", tid, name, priority);

        self.check_preemption();
        Ok(tid)
    }

    /// Body of the idle thread. Runs only when no other thread is ready.
    pub fn idle(&self) -> ! {
        loop {
            self.reap();
            {
                let guard = self.intr_disable();
                self.block(&guard);
            }
            self.platform.wait_for_interrupt();
        }
    }

    /// Returns the running thread.
    ///
    /// Panics if the running thread's control block is inconsistent or its
    /// stack overflowed.
    pub fn current(&self) -> Tid {
        let guard = self.intr_disable();
        let state = self.state.lock(&guard);
        state.running().tid
    }

    /// Returns the name of the running thread.
    pub fn name(&self) -> String {
        let name = {
            let guard = self.intr_disable();
            let state = self.state.lock(&guard);
            state.running().name
        };
        String::from(name.as_str())
    }

    pub fn thread(&self, tid: Tid) -> Option<ThreadInfo> {
        let guard = self.intr_disable();
        let state = self.state.lock(&guard);
        state.all.get(&tid).map(Thread::info)
    }

    /// Every live thread, in tid order.
    pub fn threads(&self) -> Vec<ThreadInfo> {
        self.snapshot(|state, out| out.extend(state.all.values().map(Thread::info)))
    }

    /// Ready threads in the order they will run.
    pub fn ready_list(&self) -> Vec<Tid> {
        self.snapshot(|state, out| state.scheduler.tids(out))
    }

    /// Threads waiting on the alarm clock.
    pub fn sleeping(&self) -> Vec<Tid> {
        self.snapshot(|state, out| state.alarm.tids(out))
    }

    pub fn idle_thread(&self) -> Option<Tid> {
        let guard = self.intr_disable();
        let state = self.state.lock(&guard);
        state.idle
    }

    /// Puts the current thread to sleep. It will not be scheduled again until
    /// it is awoken by [`Manager::unblock`].
    ///
    /// Taking the guard makes sure interrupts are off, which is what callers
    /// need to atomically check a condition and block on it.
    pub fn block(&self, guard: &IntrGuard<'_, P>) {
        assert!(
            !self.platform.intr_context(),
            "blocking inside an interrupt handler"
        );
        assert!(!self.platform.intr_get(), "blocking with interrupts on");
        self.schedule(guard, Status::Blocked, false);
    }

    /// Transitions a blocked thread to the ready-to-run state.
    ///
    /// This does not preempt the running thread, so a caller that disabled
    /// interrupts can unblock a thread and update other data atomically.
    pub fn unblock(&self, tid: Tid) {
        let guard = self.intr_disable();
        let mut state = self.state.lock(&guard);
        assert!(!state.is_idle(tid), "the idle thread is never unblocked");
        state.make_ready(tid);
    }

    /// Yields the CPU. The current thread is not put to sleep and may be
    /// scheduled again immediately.
    pub fn yield_now(&self) {
        assert!(
            !self.platform.intr_context(),
            "yielding inside an interrupt handler"
        );
        self.reap();
        let guard = self.intr_disable();
        self.schedule(&guard, Status::Ready, true);
    }

    /// Yields if a ready thread outranks the running one. Inside an interrupt
    /// handler, the yield happens on return from the interrupt.
    pub fn check_preemption(&self) {
        let guard = self.intr_disable();
        let preempt = self.state.lock(&guard).should_preempt();
        if !preempt {
            return;
        }

        if self.platform.intr_context() {
            self.platform.yield_on_return();
        } else {
            self.yield_now();
        }
    }

    /// Gracefully shut down the current thread, and schedule another one.
    pub fn exit(&self) -> ! {
        self.exit_current();
        unreachable!("an exited thread shouldn't be scheduled again");
    }

    /// Marks the current thread dying and dispatches the next one.
    ///
    /// On real hardware this never returns. On a simulated platform it
    /// returns with the next thread current.
    pub fn exit_current(&self) {
        assert!(
            !self.platform.intr_context(),
            "exiting inside an interrupt handler"
        );
        self.reap();

        let (tid, user) = {
            let guard = self.intr_disable();
            let state = self.state.lock(&guard);
            let thread = state.running();
            assert!(!thread.is_idle(), "the idle thread cannot exit");
            (thread.tid, thread.flags.contains(Flags::USER))
        };

        if user {
            self.platform.process_exit(tid);
        }
        log::debug!("thread {} exits", tid);

        let guard = self.intr_disable();
        self.schedule(&guard, Status::Dying, false);
    }

    /// Sets the current thread's base priority. Ignored under the MLFQS,
    /// which computes priorities itself.
    pub fn set_priority(&self, priority: u32) {
        if self.options.mlfqs {
            return;
        }
        assert!(
            (PRI_MIN..=PRI_MAX).contains(&priority),
            "priority {} out of range",
            priority
        );

        {
            let guard = self.intr_disable();
            let mut state = self.state.lock(&guard);
            let state = &mut *state;
            let current = state.current;
            state.running_mut().priority = priority;
            Donate::refresh(&mut state.all, &mut state.scheduler, &state.locks, current);
        }

        self.check_preemption();
    }

    /// Returns the current thread's effective priority.
    pub fn get_priority(&self) -> u32 {
        let guard = self.intr_disable();
        let state = self.state.lock(&guard);
        state.running().effective
    }

    /// Sets the current thread's nice value and recomputes its priority.
    pub fn set_nice(&self, nice: i32) {
        assert!(
            (NICE_MIN..=NICE_MAX).contains(&nice),
            "nice {} out of range",
            nice
        );

        {
            let guard = self.intr_disable();
            let mut state = self.state.lock(&guard);
            let thread = state.running_mut();
            thread.nice = nice;
            if self.options.mlfqs {
                thread.priority = Mlfqs::priority(thread.recent_cpu, nice);
                thread.effective = thread.priority;
            }
        }

        self.check_preemption();
    }

    pub fn get_nice(&self) -> i32 {
        let guard = self.intr_disable();
        let state = self.state.lock(&guard);
        state.running().nice
    }

    /// Returns 100 times the system load average.
    pub fn get_load_avg(&self) -> i32 {
        let guard = self.intr_disable();
        let state = self.state.lock(&guard);
        (state.mlfqs.load_avg() * 100).trunc()
    }

    /// Returns 100 times the current thread's `recent_cpu`.
    pub fn get_recent_cpu(&self) -> i32 {
        let guard = self.intr_disable();
        let state = self.state.lock(&guard);
        (state.running().recent_cpu * 100).trunc()
    }

    pub fn stats(&self) -> Stats {
        let guard = self.intr_disable();
        let state = self.state.lock(&guard);
        state.stats
    }
}

impl<C> State<C> {
    /// Per-tick accounting for the running thread. Returns whether its time
    /// slice is used up.
    pub(crate) fn thread_tick(&mut self, options: &Options) -> bool {
        let current = self.current;
        let idle = self.is_idle(current);

        if idle {
            self.stats.idle_ticks += 1;
        } else if self.all[&current].flags.contains(Flags::USER) {
            self.stats.user_ticks += 1;
        } else {
            self.stats.kernel_ticks += 1;
        }

        if options.mlfqs {
            if !idle {
                let thread = self.thread_mut(current);
                thread.recent_cpu = thread.recent_cpu + 1;
            }
            if self.ticks % options.timer_freq == 0 {
                self.mlfqs_recalculate();
            }
        }

        self.slice += 1;
        self.slice >= options.time_slice
    }

    /// The once-a-second MLFQS update: load average, then every thread's
    /// `recent_cpu`, then every thread's priority.
    fn mlfqs_recalculate(&mut self) {
        let running = if self.is_idle(self.current) { 0 } else { 1 };
        self.mlfqs.update_load_avg(self.scheduler.len() + running);

        let mlfqs = &self.mlfqs;
        for thread in self.all.values_mut().filter(|t| !t.is_idle()) {
            thread.recent_cpu = mlfqs.decay(thread.recent_cpu, thread.nice);
        }
        for thread in self.all.values_mut().filter(|t| !t.is_idle()) {
            thread.priority = Mlfqs::priority(thread.recent_cpu, thread.nice);
            thread.effective = thread.priority;
        }

        self.scheduler.reorder(&self.all);
    }
}
