//! Kernel locks with priority donation.
//!
//! A lock is owned by at most one thread. A thread that finds it taken
//! blocks, and donates its priority to the holder (and onward, see
//! [`Donate::propagate`]) unless the MLFQS is in charge of priorities.
//!
//! Release hands the lock straight to the highest-priority waiter, so a woken
//! waiter already owns the lock when it runs again. The waiters left behind
//! become donors of the new holder.

use alloc::vec::Vec;

use crate::platform::Platform;
use crate::thread::imp::{lookup_mut, Registry};
use crate::thread::scheduler::priority::donate::Donate;
use crate::thread::{Manager, State, Tid};

/// Handle to a lock created with [`Manager::lock_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockId(usize);

impl LockId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Who holds a lock. Its waiters are the threads whose `waiting_on` names
/// it, ordered by their tickets.
#[derive(Debug, Default)]
pub(crate) struct LockRecord {
    pub holder: Option<Tid>,
}

/// Waiters of `lock`, in arrival order.
fn waiters<C>(all: &Registry<C>, lock: LockId, out: &mut Vec<Tid>) {
    let first = out.len();
    out.extend(
        all.values()
            .filter(|t| t.waiting_on == Some(lock))
            .map(|t| t.tid),
    );
    // In place, without a scratch buffer.
    let waiters = &mut out[first..];
    for i in 1..waiters.len() {
        let mut j = i;
        while j > 0 && all[&waiters[j - 1]].ticket > all[&waiters[j]].ticket {
            waiters.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// The waiter of `lock` with the highest effective priority, the earliest
/// one among equals.
fn max_priority_waiter<C>(all: &Registry<C>, lock: LockId) -> Option<Tid> {
    all.values()
        .filter(|t| t.waiting_on == Some(lock))
        .max_by(|a, b| {
            a.effective
                .cmp(&b.effective)
                .then(b.ticket.cmp(&a.ticket))
        })
        .map(|t| t.tid)
}

impl<C> State<C> {
    fn lock_record(&mut self, lock: LockId) -> &mut LockRecord {
        self.locks
            .get_mut(lock.index())
            .unwrap_or_else(|| panic!("{:?} does not exist", lock))
    }
}

impl<P: Platform> Manager<P> {
    pub fn lock_create(&self) -> LockId {
        let guard = self.reserved(|state| {
            let wanted = state.locks.len() + 1;
            (&mut state.locks, wanted)
        });
        let mut state = self.state.lock(&guard);
        let id = LockId(state.locks.len());
        state.locks.push(LockRecord::default());
        id
    }

    /// Acquires `lock`, sleeping until it becomes available if necessary.
    ///
    /// Must not be called from an interrupt handler, nor by the holder.
    pub fn lock_acquire(&self, lock: LockId) {
        assert!(!self.platform.intr_context());
        self.reap();

        let guard = self.intr_disable();
        let must_wait = {
            let mut state = self.state.lock(&guard);
            let state = &mut *state;
            let current = state.current;
            let holder = state.lock_record(lock).holder;

            match holder {
                None => {
                    state.lock_record(lock).holder = Some(current);
                    None
                }
                Some(holder) if holder == current => {
                    panic!("thread {} acquired {:?} recursively", current, lock)
                }
                Some(holder) => {
                    let ticket = state.next_ticket;
                    state.next_ticket += 1;
                    let thread = lookup_mut(&mut state.all, current);
                    thread.waiting_on = Some(lock);
                    thread.ticket = ticket;

                    let hops = if self.options.mlfqs {
                        0
                    } else {
                        Donate::propagate(
                            &mut state.all,
                            &mut state.scheduler,
                            &state.locks,
                            current,
                            self.options.donation_depth,
                        )
                    };
                    Some((current, holder, hops))
                }
            }
        };

        if let Some((current, holder, hops)) = must_wait {
            log::debug!(
                "thread {} waits on {:?} held by {}, donated over {} hops",
                current,
                lock,
                holder,
                hops
            );
            self.block(&guard);
        }
    }

    /// Acquires `lock` only if it is free. Never sleeps.
    pub fn lock_try_acquire(&self, lock: LockId) -> bool {
        let guard = self.intr_disable();
        let mut state = self.state.lock(&guard);
        let current = state.current;
        let record = state.lock_record(lock);

        if record.holder.is_some() {
            return false;
        }
        record.holder = Some(current);
        true
    }

    /// Releases `lock`, which the current thread must hold.
    ///
    /// Gives up the priority donated through this lock, and yields if a
    /// higher-priority thread became ready as a result.
    pub fn lock_release(&self, lock: LockId) {
        let guard = self.intr_disable();
        {
            let mut state = self.state.lock(&guard);
            let state = &mut *state;
            let current = state.current;
            let donation = !self.options.mlfqs;

            assert_eq!(
                state.lock_record(lock).holder,
                Some(current),
                "{:?} released by a thread that does not hold it",
                lock
            );

            // The remaining waiters now donate to the new holder.
            let next = max_priority_waiter(&state.all, lock);
            state.lock_record(lock).holder = next;

            if let Some(next) = next {
                lookup_mut(&mut state.all, next).waiting_on = None;
                if donation {
                    Donate::refresh(&mut state.all, &mut state.scheduler, &state.locks, next);
                }
                state.make_ready(next);
            }

            if donation {
                Donate::refresh(&mut state.all, &mut state.scheduler, &state.locks, current);
            }
        }
        drop(guard);

        self.check_preemption();
    }

    /// Whether the running thread holds `lock`.
    pub fn lock_held_by_current(&self, lock: LockId) -> bool {
        self.lock_holder(lock) == Some(self.current())
    }

    pub fn lock_holder(&self, lock: LockId) -> Option<Tid> {
        let guard = self.intr_disable();
        let state = self.state.lock(&guard);
        state.locks.get(lock.index()).and_then(|l| l.holder)
    }

    /// Threads blocked on `lock`, in arrival order.
    pub fn lock_waiters(&self, lock: LockId) -> Vec<Tid> {
        self.snapshot(|state, out| waiters(&state.all, lock, out))
    }

    /// Threads donating their priority to `tid`. Always empty under the
    /// MLFQS, which does not donate.
    pub fn donors(&self, tid: Tid) -> Vec<Tid> {
        let donation = !self.options.mlfqs;
        self.snapshot(|state, out| {
            if donation {
                out.extend(Donate::donors(&state.all, &state.locks, tid).map(|t| t.tid));
            }
        })
    }
}
