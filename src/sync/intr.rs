use spin::{Mutex, MutexGuard};

use crate::platform::Platform;

/// Interrupts stay disabled while this guard lives. Dropping it restores the
/// level that was active when it was created, so guards nest.
///
/// The guard may be held across a context switch: each thread restores its
/// own saved level once it is resumed and the guard goes out of scope.
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct IntrGuard<'a, P: Platform> {
    platform: &'a P,
    old: bool,
}

impl<'a, P: Platform> IntrGuard<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        let old = platform.intr_set(false);
        Self { platform, old }
    }

    /// Whether interrupts were enabled before this guard.
    pub fn old_level(&self) -> bool {
        self.old
    }
}

impl<P: Platform> Drop for IntrGuard<'_, P> {
    fn drop(&mut self) {
        self.platform.intr_set(self.old);
    }
}

/// State that may only be touched with interrupts off.
///
/// Nothing can preempt a holder, so the inner lock is never contended. A
/// failed acquisition means the same thread asked twice, which is a bug.
pub struct IntrMutex<T>(Mutex<T>);

impl<T> IntrMutex<T> {
    pub const fn new(value: T) -> Self {
        Self(Mutex::new(value))
    }

    pub fn lock<'a, P: Platform>(&'a self, _guard: &'a IntrGuard<'_, P>) -> MutexGuard<'a, T> {
        self.0
            .try_lock()
            .unwrap_or_else(|| panic!("scheduler state locked re-entrantly"))
    }
}
