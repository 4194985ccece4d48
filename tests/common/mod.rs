#![allow(dead_code)]

use kthreads::platform::sim::SimPlatform;
use kthreads::{Manager, Options, Tid};

pub type Kernel = Manager<SimPlatform>;

pub fn idle(_: usize) {}

pub fn noop(_: usize) {}

fn timer() {}

/// Boots a simulated kernel with the idle thread running and interrupts on.
pub fn boot(options: Options) -> Kernel {
    let kernel = Manager::new(SimPlatform::new(), options);
    kernel.start(idle, timer).unwrap();
    kernel
}

/// Delivers one timer interrupt, then yields if the handler asked for it, as
/// the interrupt return path does.
pub fn tick(kernel: &Kernel) {
    kernel.platform().interrupt(|| kernel.timer_interrupt());
    if kernel.platform().take_yield_request() {
        kernel.yield_now();
    }
}

pub fn ticks(kernel: &Kernel, n: usize) {
    for _ in 0..n {
        tick(kernel);
    }
}

pub fn spawn(kernel: &Kernel, name: &str, priority: u32) -> Tid {
    kernel.spawn(name, priority, noop, 0).unwrap()
}

pub fn effective(kernel: &Kernel, tid: Tid) -> u32 {
    kernel.thread(tid).unwrap().effective_priority
}
