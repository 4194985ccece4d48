//! RISC-V 64 supervisor-mode backend.
//!
//! The embedding kernel owns the trap vector. It calls [`timer_trap`] on a
//! supervisor timer interrupt and yields the current thread before `sret`
//! when that returns `true`.

use alloc::alloc::{alloc_zeroed, dealloc};
use core::arch::global_asm;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering::SeqCst};

use riscv::register::{sstatus, time};
use spin::Once;

use super::{Platform, TimerHandler, PAGE_LAYOUT};
use crate::thread::ThreadFunc;

static TIMER: Once<TimerHandler> = Once::new();
static EXIT: Once<fn() -> !> = Once::new();
static IN_TRAP: AtomicBool = AtomicBool::new(false);
static YIELD_ON_RETURN: AtomicBool = AtomicBool::new(false);

/// Callee-saved registers. Layout is shared with `__kthreads_switch`.
#[repr(C)]
#[derive(Debug, Default)]
pub struct Context {
    ra: usize,
    sp: usize,
    s: [usize; 12],
}

global_asm!(
    ".globl __kthreads_switch",
    "__kthreads_switch:",
    "sd ra, 0(a0)",
    "sd sp, 8(a0)",
    "sd s0, 16(a0)",
    "sd s1, 24(a0)",
    "sd s2, 32(a0)",
    "sd s3, 40(a0)",
    "sd s4, 48(a0)",
    "sd s5, 56(a0)",
    "sd s6, 64(a0)",
    "sd s7, 72(a0)",
    "sd s8, 80(a0)",
    "sd s9, 88(a0)",
    "sd s10, 96(a0)",
    "sd s11, 104(a0)",
    "ld ra, 0(a1)",
    "ld sp, 8(a1)",
    "ld s0, 16(a1)",
    "ld s1, 24(a1)",
    "ld s2, 32(a1)",
    "ld s3, 40(a1)",
    "ld s4, 48(a1)",
    "ld s5, 56(a1)",
    "ld s6, 64(a1)",
    "ld s7, 72(a1)",
    "ld s8, 80(a1)",
    "ld s9, 88(a1)",
    "ld s10, 96(a1)",
    "ld s11, 104(a1)",
    "ret",
    ".globl __kthreads_entry",
    "__kthreads_entry:",
    "mv a0, s0",
    "mv a1, s1",
    "j {kernel_thread}",
    kernel_thread = sym kernel_thread,
);

extern "C" {
    fn __kthreads_switch(prev: *mut Context, next: *const Context);
    fn __kthreads_entry();
}

/// First code a new thread runs. The scheduler switched here with interrupts
/// off.
extern "C" fn kernel_thread(entry: usize, aux: usize) -> ! {
    unsafe { sstatus::set_sie() };

    let entry: ThreadFunc = unsafe { core::mem::transmute(entry) };
    entry(aux);

    match EXIT.get() {
        Some(exit) => exit(),
        None => panic!("thread returned before an exit hook was installed"),
    }
}

/// Runs the timer handler. Returns whether the interrupted thread must yield
/// before the trap returns.
pub fn timer_trap() -> bool {
    IN_TRAP.store(true, SeqCst);
    if let Some(handler) = TIMER.get() {
        handler();
    }
    IN_TRAP.store(false, SeqCst);
    YIELD_ON_RETURN.swap(false, SeqCst)
}

pub struct RiscvPlatform {
    /// Frequency of the `time` CSR in Hz.
    timebase: u64,
}

impl RiscvPlatform {
    /// `exit` is called when a thread's entry function returns; it should
    /// forward to [`Manager::exit`](crate::Manager::exit).
    pub fn new(timebase: u64, exit: fn() -> !) -> Self {
        EXIT.call_once(|| exit);
        Self { timebase }
    }
}

impl Platform for RiscvPlatform {
    type Context = Context;

    fn intr_get(&self) -> bool {
        sstatus::read().sie()
    }

    fn intr_set(&self, on: bool) -> bool {
        let old = sstatus::read().sie();
        unsafe {
            if on {
                sstatus::set_sie();
            } else {
                sstatus::clear_sie();
            }
        }
        old
    }

    fn intr_context(&self) -> bool {
        IN_TRAP.load(SeqCst)
    }

    fn yield_on_return(&self) {
        YIELD_ON_RETURN.store(true, SeqCst);
    }

    fn wait_for_interrupt(&self) {
        unsafe { riscv::asm::wfi() };
    }

    fn register_timer(&self, handler: TimerHandler) {
        TIMER.call_once(|| handler);
    }

    fn delay(&self, num: i64, denom: i64) {
        let cycles = (num.max(0) as u64).saturating_mul(self.timebase) / denom as u64;
        let start = time::read() as u64;
        while (time::read() as u64).wrapping_sub(start) < cycles {
            core::hint::spin_loop();
        }
    }

    fn alloc_page(&self) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { alloc_zeroed(PAGE_LAYOUT) })
    }

    unsafe fn free_page(&self, page: NonNull<u8>) {
        unsafe { dealloc(page.as_ptr(), PAGE_LAYOUT) };
    }

    fn init_context(&self, ctx: &mut Context, stack_top: usize, entry: ThreadFunc, aux: usize) {
        *ctx = Context::default();
        ctx.ra = __kthreads_entry as usize;
        ctx.sp = stack_top;
        ctx.s[0] = entry as usize;
        ctx.s[1] = aux;
    }

    unsafe fn switch(&self, prev: *mut Context, next: *const Context) {
        unsafe { __kthreads_switch(prev, next) };
    }
}
