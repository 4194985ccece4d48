//! Hosted simulation of a single-CPU machine.
//!
//! [`SimPlatform`] runs the scheduler on an ordinary host. A context switch
//! only records that it happened and returns immediately, so after any call
//! that dispatches a new thread, the caller simply continues *as* that
//! thread. Thread entry functions are never executed; the scheduler state is
//! driven step by step from the outside, which makes every interleaving
//! deterministic.
//!
//! ```
//! use kthreads::platform::sim::SimPlatform;
//! use kthreads::{Manager, Options};
//!
//! fn idle(_: usize) {}
//! fn noop(_: usize) {}
//!
//! let manager = Manager::new(SimPlatform::new(), Options::default());
//! manager.start(idle, || {}).unwrap();
//!
//! let tid = manager.spawn("worker", 40, noop, 0).unwrap();
//! // The worker outranks `main` and got the CPU at once.
//! assert_eq!(manager.current(), tid);
//! ```

use alloc::alloc::{alloc_zeroed, dealloc};
use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering::SeqCst};

use spin::Mutex;

use super::{Platform, TimerHandler, PAGE_LAYOUT};
use crate::thread::{ThreadFunc, Tid};

/// Register state of a simulated thread.
#[derive(Debug, Default)]
pub struct SimContext {
    pub entry: Option<ThreadFunc>,
    pub aux: usize,
    pub stack_top: usize,
}

pub struct SimPlatform {
    intr: AtomicBool,
    in_handler: AtomicBool,
    yield_requested: AtomicBool,
    timer: Mutex<Option<TimerHandler>>,
    pages: AtomicUsize,
    page_limit: AtomicUsize,
    switches: AtomicUsize,
    activations: AtomicUsize,
    last_activated: AtomicIsize,
    process_exits: Mutex<Vec<Tid>>,
    delays: Mutex<Vec<(i64, i64)>>,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    /// Creates a machine that boots with interrupts off.
    pub fn new() -> Self {
        Self {
            intr: AtomicBool::new(false),
            in_handler: AtomicBool::new(false),
            yield_requested: AtomicBool::new(false),
            timer: Mutex::new(None),
            pages: AtomicUsize::new(0),
            page_limit: AtomicUsize::new(usize::MAX),
            switches: AtomicUsize::new(0),
            activations: AtomicUsize::new(0),
            last_activated: AtomicIsize::new(0),
            process_exits: Mutex::new(Vec::new()),
            delays: Mutex::new(Vec::new()),
        }
    }

    /// Runs `f` as an external interrupt handler.
    pub fn interrupt<R>(&self, f: impl FnOnce() -> R) -> R {
        let old = self.intr_set(false);
        self.in_handler.store(true, SeqCst);
        let result = f();
        self.in_handler.store(false, SeqCst);
        self.intr_set(old);
        result
    }

    /// Consumes a pending yield-on-return request.
    pub fn take_yield_request(&self) -> bool {
        self.yield_requested.swap(false, SeqCst)
    }

    pub fn timer_handler(&self) -> Option<TimerHandler> {
        *self.timer.lock()
    }

    /// Limits the number of pages that may be live at once.
    pub fn set_page_limit(&self, limit: usize) {
        self.page_limit.store(limit, SeqCst);
    }

    /// Pages currently handed out.
    pub fn pages_in_use(&self) -> usize {
        self.pages.load(SeqCst)
    }

    /// Number of context switches performed so far.
    pub fn switches(&self) -> usize {
        self.switches.load(SeqCst)
    }

    /// Number of address space activations. Recorded with interrupts off,
    /// so only counted.
    pub fn activations(&self) -> usize {
        self.activations.load(SeqCst)
    }

    /// The thread whose address space was activated last, if any.
    pub fn last_activated(&self) -> Option<Tid> {
        match self.activations() {
            0 => None,
            _ => Some(self.last_activated.load(SeqCst)),
        }
    }

    pub fn process_exits(&self) -> Vec<Tid> {
        self.process_exits.lock().clone()
    }

    pub fn delays(&self) -> Vec<(i64, i64)> {
        self.delays.lock().clone()
    }
}

impl Platform for SimPlatform {
    type Context = SimContext;

    fn intr_get(&self) -> bool {
        self.intr.load(SeqCst)
    }

    fn intr_set(&self, on: bool) -> bool {
        self.intr.swap(on, SeqCst)
    }

    fn intr_context(&self) -> bool {
        self.in_handler.load(SeqCst)
    }

    fn yield_on_return(&self) {
        assert!(self.intr_context());
        self.yield_requested.store(true, SeqCst);
    }

    fn wait_for_interrupt(&self) {
        core::hint::spin_loop();
    }

    fn register_timer(&self, handler: TimerHandler) {
        *self.timer.lock() = Some(handler);
    }

    fn delay(&self, num: i64, denom: i64) {
        self.delays.lock().push((num, denom));
    }

    fn alloc_page(&self) -> Option<NonNull<u8>> {
        let live = self.pages.load(SeqCst);
        if live >= self.page_limit.load(SeqCst) {
            return None;
        }
        let page = NonNull::new(unsafe { alloc_zeroed(PAGE_LAYOUT) })?;
        self.pages.store(live + 1, SeqCst);
        Some(page)
    }

    unsafe fn free_page(&self, page: NonNull<u8>) {
        self.pages.fetch_sub(1, SeqCst);
        unsafe { dealloc(page.as_ptr(), PAGE_LAYOUT) };
    }

    fn init_context(&self, ctx: &mut SimContext, stack_top: usize, entry: ThreadFunc, aux: usize) {
        *ctx = SimContext {
            entry: Some(entry),
            aux,
            stack_top,
        };
    }

    unsafe fn switch(&self, prev: *mut SimContext, next: *const SimContext) {
        assert!(!self.intr_get());
        assert_ne!(prev as *const SimContext, next);
        self.switches.fetch_add(1, SeqCst);
    }

    fn activate(&self, tid: Tid) {
        self.last_activated.store(tid, SeqCst);
        self.activations.fetch_add(1, SeqCst);
    }

    fn process_exit(&self, tid: Tid) {
        self.process_exits.lock().push(tid);
    }
}
