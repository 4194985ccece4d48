//! Growable storage that is never grown with interrupts off.
//!
//! Every container reachable from the scheduler state is sized ahead of the
//! operation that fills it. [`Manager::reserved`] allocates a larger buffer
//! with interrupts on, moves the contents over under the guard, and frees
//! the old buffer once interrupts are back on.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::mem;

use crate::platform::Platform;
use crate::sync::IntrGuard;
use crate::thread::{Manager, State};

pub(crate) trait Storage {
    fn with_capacity(capacity: usize) -> Self;

    fn capacity(&self) -> usize;

    /// Moves every element into `fresh`, which must be empty and large
    /// enough, then swaps the two. `fresh` is left with the old, empty
    /// buffer.
    fn adopt(&mut self, fresh: &mut Self);
}

impl<T> Storage for Vec<T> {
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }

    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }

    fn adopt(&mut self, fresh: &mut Self) {
        debug_assert!(fresh.is_empty() && fresh.capacity() >= self.len());
        fresh.append(self);
        mem::swap(self, fresh);
    }
}

impl<T> Storage for VecDeque<T> {
    fn with_capacity(capacity: usize) -> Self {
        VecDeque::with_capacity(capacity)
    }

    fn capacity(&self) -> usize {
        VecDeque::capacity(self)
    }

    fn adopt(&mut self, fresh: &mut Self) {
        debug_assert!(fresh.is_empty() && fresh.capacity() >= self.len());
        fresh.append(self);
        mem::swap(self, fresh);
    }
}

impl<P: Platform> Manager<P> {
    /// Disables interrupts once the storage `pick` selects can hold as many
    /// elements as `pick` asks for.
    ///
    /// The returned guard keeps the room from being taken by another thread.
    pub(crate) fn reserved<S: Storage>(
        &self,
        pick: impl Fn(&mut State<P::Context>) -> (&mut S, usize),
    ) -> IntrGuard<'_, P> {
        loop {
            let guard = self.intr_disable();
            let wanted = {
                let mut state = self.state.lock(&guard);
                let (storage, wanted) = pick(&mut *state);
                (storage.capacity() < wanted).then_some(wanted)
            };
            let Some(wanted) = wanted else {
                return guard;
            };
            drop(guard);

            let mut fresh = S::with_capacity(wanted * 2);
            {
                let guard = self.intr_disable();
                let mut state = self.state.lock(&guard);
                let (storage, wanted) = pick(&mut *state);
                if storage.capacity() < wanted && fresh.capacity() >= wanted {
                    storage.adopt(&mut fresh);
                }
            }
            // Whichever buffer lost is freed here, with interrupts restored.
            drop(fresh);
        }
    }

    /// Fills a buffer under the guard. The buffer is sized for every live
    /// thread beforehand, which bounds anything `fill` collects.
    pub(crate) fn snapshot<T>(&self, fill: impl Fn(&State<P::Context>, &mut Vec<T>)) -> Vec<T> {
        let mut out = Vec::new();
        loop {
            let live = {
                let guard = self.intr_disable();
                let state = self.state.lock(&guard);
                state.all.len()
            };
            out.reserve(live);

            let guard = self.intr_disable();
            let state = self.state.lock(&guard);
            if out.capacity() >= state.all.len() {
                fill(&*state, &mut out);
                debug_assert!(out.len() <= state.all.len());
                return out;
            }
        }
    }
}
