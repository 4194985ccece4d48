use alloc::collections::VecDeque;

use crate::thread::imp::Registry;
use crate::thread::storage::Storage;
use crate::thread::Tid;

/// Ready queue kept sorted by effective priority, highest first.
///
/// Insertion finds the first thread of strictly lower priority and goes in
/// front of it, so threads of equal priority leave in arrival order.
/// `pop_front` is then the whole scheduling decision.
#[derive(Default)]
pub struct Queue(VecDeque<Tid>);

impl Queue {
    pub fn push<C>(&mut self, tid: Tid, all: &Registry<C>) {
        let priority = all[&tid].effective;
        let pos = self
            .0
            .iter()
            .position(|t| all[t].effective < priority)
            .unwrap_or(self.0.len());
        self.0.insert(pos, tid);
    }

    pub fn pop_front(&mut self) -> Option<Tid> {
        self.0.pop_front()
    }

    pub fn front(&self) -> Option<Tid> {
        self.0.front().copied()
    }

    pub fn remove(&mut self, tid: Tid) -> bool {
        match self.0.iter().position(|&t| t == tid) {
            Some(pos) => {
                self.0.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Re-sorts after a bulk priority change. Threads whose priorities tie
    /// keep their arrival order.
    ///
    /// Runs in the timer interrupt, so it sorts in place: an insertion sort,
    /// which is stable and needs no scratch buffer.
    pub fn reorder<C>(&mut self, all: &Registry<C>) {
        let queue = self.0.make_contiguous();
        for i in 1..queue.len() {
            let mut j = i;
            while j > 0 && all[&queue[j - 1]].effective < all[&queue[j]].effective {
                queue.swap(j - 1, j);
                j -= 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tid> + '_ {
        self.0.iter().copied()
    }
}

impl Storage for Queue {
    fn with_capacity(capacity: usize) -> Self {
        Self(VecDeque::with_capacity(capacity))
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }

    fn adopt(&mut self, fresh: &mut Self) {
        self.0.adopt(&mut fresh.0);
    }
}
