use alloc::vec::Vec;

use crate::thread::imp::{lookup_mut, Registry};
use crate::thread::storage::Storage;
use crate::thread::{Schedule, Scheduler, Status, Tid};

/// An alarm clock for managing sleeping threads.
///
/// Holds the ids of blocked threads together with the absolute tick stored in
/// each thread's `wakeup`. Threads are kept in the order they fell asleep, so
/// threads due on the same tick become ready in that order.
#[derive(Debug, Default)]
pub struct Alarm(Vec<Tid>);

impl Alarm {
    /// Register a blocked thread to be woken up at its `wakeup` tick.
    pub fn register(&mut self, tid: Tid) {
        self.0.push(tid);
    }

    /// Wake up every thread whose wakeup tick is `now` or earlier, moving it
    /// to the ready queue. Returns how many threads woke up.
    pub fn wake<C>(&mut self, now: i64, all: &mut Registry<C>, scheduler: &mut Scheduler) -> usize {
        let before = self.0.len();
        self.0.retain(|&tid| {
            if all[&tid].wakeup > now {
                return true;
            }
            let thread = lookup_mut(all, tid);
            assert_eq!(thread.status, Status::Blocked);
            thread.status = Status::Ready;
            scheduler.register(tid, all);
            false
        });
        before - self.0.len()
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.0.contains(&tid)
    }

    pub fn tids(&self, out: &mut Vec<Tid>) {
        out.extend_from_slice(&self.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Storage for Alarm {
    fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }

    fn adopt(&mut self, fresh: &mut Self) {
        self.0.adopt(&mut fresh.0);
    }
}
