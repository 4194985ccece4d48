//! Dispatching: choosing the next thread and switching to it.

use crate::platform::Platform;
use crate::sync::IntrGuard;
use crate::thread::imp::Flags;
use crate::thread::manager::State;
use crate::thread::{Manager, Schedule, Status, Tid};

/// A switch decided under the state lock, to be carried out after the lock
/// is released.
struct Switch<C> {
    prev: Tid,
    next: Tid,
    prev_ctx: *mut C,
    next_ctx: *const C,
}

impl<C> State<C> {
    /// Picks the next thread and makes it current. Returns `None` if the
    /// current thread was picked again.
    ///
    /// A dying thread leaves the registry here. Its storage is queued for
    /// destruction rather than freed, since we are still on its stack. The
    /// destruction list has room for it, see [`State::has_room_for_thread`].
    fn switch_to_next(&mut self) -> Option<Switch<C>> {
        let prev = self.current;
        let next = self
            .scheduler
            .schedule()
            .or(self.idle)
            .unwrap_or_else(|| panic!("no thread to run after thread {}", prev));

        let thread = self.thread_mut(next);
        thread.status = Status::Running;
        thread.check_stack();
        self.slice = 0;

        if prev == next {
            return None;
        }
        self.current = next;

        let prev_ctx: *mut C = if self.thread(prev).status == Status::Dying {
            let mut dying = self
                .all
                .remove(&prev)
                .unwrap_or_else(|| panic!("dying thread {} vanished", prev));
            let ctx: *mut C = &mut *dying.context;
            if dying.flags.contains(Flags::BOOT) {
                self.retired = Some(dying);
            } else {
                self.destruction.push(dying);
            }
            ctx
        } else {
            &mut *self.thread_mut(prev).context
        };
        let next_ctx: *const C = &*self.thread(next).context;

        Some(Switch {
            prev,
            next,
            prev_ctx,
            next_ctx,
        })
    }
}

impl<P: Platform> Manager<P> {
    /// Changes the running thread's status to `status` and switches to the
    /// next thread to run. With `requeue`, the running thread goes back on the
    /// ready queue first (unless it is the idle thread).
    ///
    /// Interrupts must be off; the guard proves it.
    pub(crate) fn schedule(&self, guard: &IntrGuard<'_, P>, status: Status, requeue: bool) {
        assert!(!self.platform.intr_get());

        let switch = {
            let mut state = self.state.lock(guard);
            let state = &mut *state;

            let current = state.current;
            let idle = state.is_idle(current);
            // The idle thread is never queued. Off the CPU, it is blocked.
            let status = if idle && status == Status::Ready {
                Status::Blocked
            } else {
                status
            };
            state.running_mut().status = status;
            if requeue && !idle {
                state.scheduler.register(current, &state.all);
            }

            state.switch_to_next()
        };

        if let Some(switch) = switch {
            debug_assert_ne!(switch.prev, switch.next);

            #[cfg(feature = "debug")]
            log::trace!("switch {} -> {}", switch.prev, switch.next);

            self.platform.activate(switch.next);
            unsafe { self.platform.switch(switch.prev_ctx, switch.next_ctx) };
        }
    }

    /// Frees the threads that died and were switched away from.
    ///
    /// Each one is taken off the destruction list under the guard and freed
    /// after it. Does nothing with interrupts off; a later call catches up.
    pub(crate) fn reap(&self) {
        if !self.platform.intr_get() {
            return;
        }

        loop {
            let victim = {
                let guard = self.intr_disable();
                let mut state = self.state.lock(&guard);
                state.destruction.pop()
            };
            let Some(mut victim) = victim else {
                return;
            };

            if let Some(stack) = victim.stack.take() {
                unsafe { self.platform.free_page(stack.into_page()) };
            }
            log::trace!("reclaimed thread {}", victim.tid);
        }
    }
}
