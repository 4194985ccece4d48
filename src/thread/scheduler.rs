pub mod mlfqs;
pub mod priority;

use alloc::vec::Vec;

use crate::thread::imp::Registry;
use crate::thread::Tid;

pub use self::priority::PriorityScheduler;

/// The scheduler in use. Both priority modes share the same ready queue; the
/// MLFQS only changes where priorities come from.
pub type Scheduler = PriorityScheduler;

/// Ready queue policy.
///
/// Implementations only hold thread ids; priorities are looked up in the
/// registry passed in.
pub trait Schedule: Default {
    /// Adds a ready thread.
    fn register<C>(&mut self, tid: Tid, all: &Registry<C>);

    /// Removes and returns the thread that should run next.
    fn schedule(&mut self) -> Option<Tid>;

    /// The thread [`Schedule::schedule`] would return, left in place.
    fn peek(&self) -> Option<Tid>;

    /// Removes `tid` if it is queued.
    fn remove(&mut self, tid: Tid) -> bool;

    /// Restores the ordering after priorities changed in bulk.
    fn reorder<C>(&mut self, all: &Registry<C>);

    fn len(&self) -> usize;

    /// Appends the queued threads to `out`, in the order they would be
    /// scheduled.
    fn tids(&self, out: &mut Vec<Tid>);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves a queued thread whose priority changed to its new position.
    fn requeue<C>(&mut self, tid: Tid, all: &Registry<C>) {
        if self.remove(tid) {
            self.register(tid, all);
        }
    }
}
