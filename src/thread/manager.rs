use alloc::vec::Vec;
use core::fmt;

use crate::config::Options;
use crate::platform::Platform;
use crate::sync::lock::LockRecord;
use crate::sync::{IntrGuard, IntrMutex};
use crate::thread::alarm::Alarm;
use crate::thread::imp::{lookup_mut, Flags, Name, Registry, Thread, PRI_DEFAULT};
use crate::thread::mlfqs::Mlfqs;
use crate::thread::storage::Storage;
use crate::thread::{Schedule, Scheduler, Status, Tid};
use crate::{OsError, Result};

/// Timer ticks spent in each kind of thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub idle_ticks: u64,
    pub kernel_ticks: u64,
    pub user_ticks: u64,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Thread: {} idle ticks, {} kernel ticks, {} user ticks",
            self.idle_ticks, self.kernel_ticks, self.user_ticks
        )
    }
}

/// Everything the scheduler owns. Only reachable through [`IntrMutex`], i.e.
/// with interrupts off, so nothing here grows in place: see
/// [`Manager::reserved`].
pub(crate) struct State<C> {
    /// The registry: every live thread.
    pub all: Registry<C>,
    pub scheduler: Scheduler,
    pub alarm: Alarm,
    /// Every lock ever created, indexed by [`LockId`](crate::sync::LockId).
    pub locks: Vec<LockRecord>,
    pub mlfqs: Mlfqs,
    pub stats: Stats,

    pub current: Tid,
    pub idle: Option<Tid>,

    /// Timer ticks since boot.
    pub ticks: i64,
    /// Timer ticks since the running thread was dispatched.
    pub slice: u32,

    next_tid: Tid,
    /// Arrival stamp for the next thread to wait on a lock.
    pub next_ticket: u64,

    /// Threads that died and were switched away from. They are freed by
    /// [`Manager::reap`], with interrupts on.
    pub destruction: Vec<Thread<C>>,
    /// The boot thread after it exited. Its stack was never ours.
    pub retired: Option<Thread<C>>,
}

impl<C> State<C> {
    pub fn allocate_tid(&mut self) -> Result<Tid> {
        let tid = self.next_tid;
        self.next_tid = tid.checked_add(1).ok_or(OsError::TidExhausted)?;
        Ok(tid)
    }

    pub fn thread(&self, tid: Tid) -> &Thread<C> {
        self.all
            .get(&tid)
            .unwrap_or_else(|| panic!("no thread with tid {}", tid))
    }

    pub fn thread_mut(&mut self, tid: Tid) -> &mut Thread<C> {
        lookup_mut(&mut self.all, tid)
    }

    /// The running thread, after checking that it really is one.
    pub fn running(&self) -> &Thread<C> {
        let thread = self.thread(self.current);
        assert_eq!(
            thread.status,
            Status::Running,
            "current thread {} is not running",
            thread.tid
        );
        thread.check_stack();
        thread
    }

    pub fn running_mut(&mut self) -> &mut Thread<C> {
        self.running();
        let current = self.current;
        self.thread_mut(current)
    }

    pub fn is_idle(&self, tid: Tid) -> bool {
        self.idle == Some(tid)
    }

    /// Moves a blocked thread to the ready queue.
    pub fn make_ready(&mut self, tid: Tid) {
        let thread = self.thread_mut(tid);
        assert_eq!(
            thread.status,
            Status::Blocked,
            "thread {} unblocked while not blocked",
            tid
        );
        thread.status = Status::Ready;
        self.scheduler.register(tid, &self.all);
    }

    /// Whether a ready thread should take the CPU from the running one.
    /// Anything beats the idle thread.
    pub fn should_preempt(&self) -> bool {
        let Some(head) = self.scheduler.peek() else {
            return false;
        };
        self.is_idle(self.current) || self.all[&head].effective > self.all[&self.current].effective
    }

    /// Whether one more thread fits everywhere a thread can be put without
    /// growing anything: the registry, the ready queue, the alarm and the
    /// destruction list.
    pub fn has_room_for_thread(&self) -> bool {
        let wanted = self.all.len() + 1;
        self.all.capacity() >= wanted
            && self.scheduler.capacity() >= wanted
            && self.alarm.capacity() >= wanted
            && self.destruction.capacity() >= wanted + self.destruction.len()
    }
}

const BOOT_ROOM: usize = 2;

/// Owner of all kernel threads on the CPU.
///
/// Every operation acts on behalf of the running thread, called *current*.
pub struct Manager<P: Platform> {
    pub(crate) platform: P,
    pub(crate) options: Options,
    pub(crate) state: IntrMutex<State<P::Context>>,
}

impl<P: Platform> Manager<P> {
    /// Turns the code that is running right now into the first thread,
    /// `main`. Interrupts must be off.
    ///
    /// This is the one place that allocates with interrupts off: nothing
    /// else runs yet. It leaves room for `main` and the idle thread.
    pub fn new(platform: P, options: Options) -> Self {
        assert!(!platform.intr_get(), "threads initialized with interrupts on");

        let mut boot = Thread::new(Name::new("main"), PRI_DEFAULT, Flags::BOOT, None);
        if options.mlfqs {
            boot.priority = Mlfqs::priority(boot.recent_cpu, boot.nice);
            boot.effective = boot.priority;
        }
        boot.status = Status::Running;

        let mut state = State {
            all: Registry::with_capacity(BOOT_ROOM),
            scheduler: Scheduler::with_capacity(BOOT_ROOM),
            alarm: Alarm::with_capacity(BOOT_ROOM),
            locks: Vec::new(),
            mlfqs: Mlfqs::default(),
            stats: Stats::default(),
            current: 0,
            idle: None,
            ticks: 0,
            slice: 0,
            next_tid: 1,
            next_ticket: 0,
            destruction: Vec::with_capacity(BOOT_ROOM),
            retired: None,
        };

        // The first identifier cannot be exhausted.
        let tid = state.allocate_tid().unwrap_or(1);
        boot.tid = tid;
        state.all.insert(boot);
        state.current = tid;

        Self {
            platform,
            options,
            state: IntrMutex::new(state),
        }
    }

    /// Disables interrupts until the returned guard is dropped.
    pub fn intr_disable(&self) -> IntrGuard<'_, P> {
        IntrGuard::new(&self.platform)
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Disables interrupts once one more thread fits in the scheduler state.
    pub(crate) fn thread_room(&self) -> IntrGuard<'_, P> {
        loop {
            drop(self.reserved(|state| {
                let wanted = state.all.len() + 1;
                (&mut state.all, wanted)
            }));
            drop(self.reserved(|state| {
                let wanted = state.all.len() + 1;
                (&mut state.scheduler, wanted)
            }));
            drop(self.reserved(|state| {
                let wanted = state.all.len() + 1;
                (&mut state.alarm, wanted)
            }));
            let guard = self.reserved(|state| {
                let wanted = state.all.len() + state.destruction.len() + 1;
                (&mut state.destruction, wanted)
            });
            if self.state.lock(&guard).has_room_for_thread() {
                return guard;
            }
        }
    }
}
