//! Multi-level feedback queue scheduler.
//!
//! Priorities are derived rather than assigned:
//!
//! ```text
//! priority   = PRI_MAX - recent_cpu / 4 - nice * 2
//! recent_cpu = (2 * load_avg) / (2 * load_avg + 1) * recent_cpu + nice
//! load_avg   = (59 / 60) * load_avg + (1 / 60) * ready_threads
//! ```
//!
//! `recent_cpu` grows by one every tick its thread runs. Once per second the
//! load average is updated first, then every `recent_cpu` decays, then every
//! priority is recomputed; each step feeds the next.

use crate::fixed_point::Fixed;
use crate::thread::imp::{PRI_MAX, PRI_MIN};

#[derive(Debug, Default)]
pub struct Mlfqs {
    load_avg: Fixed,
}

impl Mlfqs {
    pub fn load_avg(&self) -> Fixed {
        self.load_avg
    }

    /// `ready` counts the ready threads plus the running one, unless the
    /// CPU is idle.
    pub fn update_load_avg(&mut self, ready: usize) {
        let old = Fixed::from_int(59) / Fixed::from_int(60);
        let new = Fixed::from_int(1) / Fixed::from_int(60);
        self.load_avg = old * self.load_avg + new * ready as i32;
    }

    /// Decays `recent_cpu` by the current load. Never negative.
    pub fn decay(&self, recent_cpu: Fixed, nice: i32) -> Fixed {
        let twice = self.load_avg * 2;
        let recent_cpu = twice / (twice + 1) * recent_cpu + nice;
        if recent_cpu.is_negative() {
            Fixed::ZERO
        } else {
            recent_cpu
        }
    }

    pub fn priority(recent_cpu: Fixed, nice: i32) -> u32 {
        let priority = (Fixed::from_int(PRI_MAX as i32) - recent_cpu / 4 - nice * 2).trunc();
        priority.clamp(PRI_MIN as i32, PRI_MAX as i32) as u32
    }
}
