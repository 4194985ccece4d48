pub mod donate;
pub mod queue;

use alloc::vec::Vec;

use crate::thread::imp::Registry;
use crate::thread::storage::Storage;
use crate::thread::{Schedule, Tid};

use self::queue::Queue;

/// Priority scheduler.
#[derive(Default)]
pub struct PriorityScheduler(Queue);

impl Schedule for PriorityScheduler {
    fn register<C>(&mut self, tid: Tid, all: &Registry<C>) {
        self.0.push(tid, all);
    }

    fn schedule(&mut self) -> Option<Tid> {
        self.0.pop_front()
    }

    fn peek(&self) -> Option<Tid> {
        self.0.front()
    }

    fn remove(&mut self, tid: Tid) -> bool {
        self.0.remove(tid)
    }

    fn reorder<C>(&mut self, all: &Registry<C>) {
        self.0.reorder(all);
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn tids(&self, out: &mut Vec<Tid>) {
        out.extend(self.0.iter());
    }
}

impl Storage for PriorityScheduler {
    fn with_capacity(capacity: usize) -> Self {
        Self(Queue::with_capacity(capacity))
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }

    fn adopt(&mut self, fresh: &mut Self) {
        self.0.adopt(&mut fresh.0);
    }
}
