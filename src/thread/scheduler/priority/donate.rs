use crate::sync::lock::LockRecord;
use crate::sync::LockId;
use crate::thread::imp::{lookup_mut, Registry, Thread};
use crate::thread::{Schedule, Scheduler, Status, Tid};

/// The donation relationships manager for the priority scheduler.
///
/// A thread blocked on a lock is a *donor* of the lock's holder. The holder
/// runs at the highest effective priority among itself and its donors, so a
/// low-priority holder cannot starve a high-priority waiter behind some
/// medium-priority thread.
///
/// The relation is not stored: it follows from each thread's `waiting_on`
/// and each lock's holder, so handing a lock over moves its waiters to the
/// new holder without touching any list.
pub struct Donate;

fn holder(locks: &[LockRecord], lock: LockId) -> Option<Tid> {
    locks.get(lock.index()).and_then(|l| l.holder)
}

impl Donate {
    /// Threads blocked on a lock that `donee` holds, in tid order.
    pub fn donors<'a, C>(
        all: &'a Registry<C>,
        locks: &'a [LockRecord],
        donee: Tid,
    ) -> impl Iterator<Item = &'a Thread<C>> + 'a {
        all.values().filter(move |t| {
            t.waiting_on
                .map_or(false, |lock| holder(locks, lock) == Some(donee))
        })
    }

    /// Update effective priority of a thread from its base priority and its
    /// donors, and move it in the ready queue if it is queued.
    pub fn refresh<C>(
        all: &mut Registry<C>,
        scheduler: &mut Scheduler,
        locks: &[LockRecord],
        tid: Tid,
    ) -> u32 {
        let donated = Self::donors(all, locks, tid).map(|d| d.effective).max();

        let thread = lookup_mut(all, tid);
        thread.effective = donated.map_or(thread.priority, |d| d.max(thread.priority));
        let (effective, status) = (thread.effective, thread.status);

        if status == Status::Ready {
            scheduler.requeue(tid, all);
        }
        effective
    }

    /// Push the effective priority of `donor` up its chain of lock holders,
    /// at most `depth` hops. Returns the number of holders raised.
    ///
    /// The walk ends early at a holder that already runs at least as high,
    /// since everything above it was raised by an earlier donation.
    pub fn propagate<C>(
        all: &mut Registry<C>,
        scheduler: &mut Scheduler,
        locks: &[LockRecord],
        donor: Tid,
        depth: usize,
    ) -> usize {
        let priority = all[&donor].effective;
        let mut u = donor;
        let mut hops = 0;

        while hops < depth {
            let Some(lock) = all[&u].waiting_on else {
                break;
            };
            let Some(next) = holder(locks, lock) else {
                break;
            };
            // The holder may have exited while still owning the lock.
            let Some(v) = all.get_mut(&next) else {
                break;
            };
            if v.effective >= priority {
                break;
            }

            v.effective = priority;
            if v.status == Status::Ready {
                scheduler.requeue(next, all);
            }

            hops += 1;
            u = next;
        }

        hops
    }
}
