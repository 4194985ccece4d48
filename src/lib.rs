//! Kernel threads for a single-CPU teaching kernel.
//!
//! The crate owns the scheduler state of the kernel: thread control blocks,
//! the priority-ordered ready queue, the alarm clock, priority donation and
//! the multi-level feedback queue scheduler. Everything that touches the
//! hardware goes through [`Platform`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod fixed_point;
pub mod platform;
pub mod sync;
pub mod thread;
pub mod timer;

pub use crate::config::Options;
pub use crate::error::OsError;
pub use crate::platform::Platform;
pub use crate::thread::{Builder, Manager, Status, ThreadFunc, ThreadInfo, Tid};

pub type Result<T> = core::result::Result<T, OsError>;
