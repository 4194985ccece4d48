//! Hardware services the scheduler consumes.
//!
//! [`Platform`] bundles everything below the scheduler: the interrupt
//! enable bit, the timer interrupt hook, the page allocator and the context
//! switch itself. The scheduler never touches registers directly.

#[cfg(target_arch = "riscv64")]
pub mod riscv;
pub mod sim;

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::thread::{ThreadFunc, Tid};

/// Size of a kernel stack page.
pub const PG_SIZE: usize = 4096;

// Size and alignment are the same non-zero power of two.
pub(crate) const PAGE_LAYOUT: Layout = unsafe { Layout::from_size_align_unchecked(PG_SIZE, PG_SIZE) };

/// Handler invoked on every timer interrupt.
pub type TimerHandler = fn();

pub trait Platform: Sync {
    /// Saved register state of a switched-out thread.
    type Context: Default + Send;

    /// Returns whether interrupts are enabled.
    fn intr_get(&self) -> bool;

    /// Enables or disables interrupts, returning the previous level.
    fn intr_set(&self, on: bool) -> bool;

    /// Returns whether we are running inside an external interrupt handler.
    fn intr_context(&self) -> bool;

    /// Asks the interrupt return path to yield the running thread.
    fn yield_on_return(&self);

    /// Sleeps the CPU until the next interrupt arrives.
    fn wait_for_interrupt(&self);

    /// Installs the timer interrupt handler.
    fn register_timer(&self, handler: TimerHandler);

    /// Busy-waits for `num / denom` seconds. Used for delays shorter than a
    /// timer tick.
    fn delay(&self, num: i64, denom: i64);

    /// Allocates a zeroed, page-aligned page of [`PG_SIZE`] bytes.
    fn alloc_page(&self) -> Option<NonNull<u8>>;

    /// Returns a page to the allocator.
    ///
    /// # Safety
    ///
    /// `page` must come from [`Platform::alloc_page`] and must not be in use.
    unsafe fn free_page(&self, page: NonNull<u8>);

    /// Prepares `ctx` so that switching to it runs `entry(aux)` on the stack
    /// ending at `stack_top`, with interrupts enabled.
    fn init_context(&self, ctx: &mut Self::Context, stack_top: usize, entry: ThreadFunc, aux: usize);

    /// Saves the running context into `prev` and resumes `next`.
    ///
    /// # Safety
    ///
    /// Interrupts must be off and both contexts must stay alive until the
    /// switch completes.
    unsafe fn switch(&self, prev: *mut Self::Context, next: *const Self::Context);

    /// Activates the address space of `tid`. Called once per actual switch.
    fn activate(&self, _tid: Tid) {}

    /// Tears down the user process of `tid` before the thread dies.
    fn process_exit(&self, _tid: Tid) {}
}
