//! Synchronization primitives.
//!
//! On a single CPU the only real primitive is turning interrupts off.
//! [`IntrGuard`] does that for a scope, [`IntrMutex`] hands out scheduler
//! state only to holders of such a guard, and the donation-aware kernel
//! locks in [`lock`] are built on top of both.

pub mod intr;
pub mod lock;

pub use self::intr::{IntrGuard, IntrMutex};
pub use self::lock::LockId;
