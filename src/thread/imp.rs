//! Thread control block.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ops::{Deref, Index};
use core::ptr::NonNull;
use core::{fmt, str};

use crate::fixed_point::Fixed;
use crate::platform::{Platform, PG_SIZE};
use crate::sync::LockId;
use crate::thread::storage::Storage;
use crate::thread::Manager;
use crate::Result;

/// Thread identifier. Allocated in increasing order and never reused.
pub type Tid = isize;

/// Entry point of a kernel thread, called with the thread's argument.
pub type ThreadFunc = fn(usize);

/// Lowest priority.
pub const PRI_MIN: u32 = 0;
/// Default priority.
pub const PRI_DEFAULT: u32 = 31;
/// Highest priority.
pub const PRI_MAX: u32 = 63;

pub const NICE_MIN: i32 = -20;
pub const NICE_DEFAULT: i32 = 0;
pub const NICE_MAX: i32 = 20;

/// Canary written at the bottom of every kernel stack. A thread that
/// overflows its stack overwrites it first.
pub const THREAD_MAGIC: u32 = 0xcd6abf4b;

/// Longest thread name kept, in bytes.
pub const NAME_MAX: usize = 16;

/// States in a thread's life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Not running but ready to run.
    Ready,
    /// The one thread on the CPU.
    Running,
    /// Waiting for an event to trigger.
    Blocked,
    /// About to be destroyed.
    Dying,
}

bitflags::bitflags! {
    pub struct Flags: u8 {
        /// Runs only when nothing else is ready.
        const IDLE = 0b0000_0001;

        /// Adopted from the boot context; its stack is not ours to free.
        const BOOT = 0b0000_0010;

        /// Owns a user address space.
        const USER = 0b0000_0100;
    }
}

/// A kernel stack page, with [`THREAD_MAGIC`] in its lowest word.
pub(crate) struct Stack {
    page: NonNull<u8>,
}

// The page belongs to exactly one thread control block.
unsafe impl Send for Stack {}

impl Stack {
    pub fn new(page: NonNull<u8>) -> Self {
        unsafe { page.cast::<u32>().as_ptr().write_volatile(THREAD_MAGIC) };
        Self { page }
    }

    pub fn top(&self) -> usize {
        self.page.as_ptr() as usize + PG_SIZE
    }

    pub fn is_intact(&self) -> bool {
        unsafe { self.page.cast::<u32>().as_ptr().read_volatile() == THREAD_MAGIC }
    }

    pub fn into_page(self) -> NonNull<u8> {
        self.page
    }
}

/// A thread name of at most [`NAME_MAX`] bytes, stored inline so that
/// naming a thread never allocates.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Name {
    buf: [u8; NAME_MAX],
    len: u8,
}

impl Name {
    /// Keeps the longest prefix of `name` that fits, never splitting a
    /// character.
    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(NAME_MAX);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut buf = [0; NAME_MAX];
        buf[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self {
            buf,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        str::from_utf8(&self.buf[..self.len as usize]).unwrap_or_default()
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

pub(crate) struct Thread<C> {
    pub tid: Tid,
    pub name: Name,
    pub status: Status,
    pub flags: Flags,

    /// Priority assigned by the owner, or computed by the MLFQS.
    pub priority: u32,
    /// Priority after donations; this is what the scheduler reads.
    pub effective: u32,

    pub nice: i32,
    pub recent_cpu: Fixed,

    /// Absolute tick to wake up at, while in the alarm.
    pub wakeup: i64,
    pub waiting_on: Option<LockId>,
    /// Orders the waiters of one lock by arrival.
    pub ticket: u64,

    pub stack: Option<Stack>,
    pub context: Box<C>,
}

/// Every live thread, sorted by id.
///
/// A sorted vector rather than a map, so that its storage can be sized
/// ahead of an insertion.
pub(crate) struct Registry<C>(Vec<Thread<C>>);

impl<C> Registry<C> {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    fn position(&self, tid: Tid) -> core::result::Result<usize, usize> {
        self.0.binary_search_by_key(&tid, |t| t.tid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, tid: &Tid) -> Option<&Thread<C>> {
        self.position(*tid).ok().map(|pos| &self.0[pos])
    }

    pub fn get_mut(&mut self, tid: &Tid) -> Option<&mut Thread<C>> {
        self.position(*tid).ok().map(|pos| &mut self.0[pos])
    }

    /// Adds `thread` under its own id. Does not allocate if room was
    /// reserved.
    pub fn insert(&mut self, thread: Thread<C>) {
        match self.position(thread.tid) {
            Ok(_) => panic!("thread {} registered twice", thread.tid),
            Err(pos) => self.0.insert(pos, thread),
        }
    }

    pub fn remove(&mut self, tid: &Tid) -> Option<Thread<C>> {
        self.position(*tid).ok().map(|pos| self.0.remove(pos))
    }

    pub fn values(&self) -> impl Iterator<Item = &Thread<C>> {
        self.0.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Thread<C>> {
        self.0.iter_mut()
    }
}

impl<C> Index<&Tid> for Registry<C> {
    type Output = Thread<C>;

    fn index(&self, tid: &Tid) -> &Thread<C> {
        self.get(tid)
            .unwrap_or_else(|| panic!("no thread with tid {}", tid))
    }
}

impl<C> FromIterator<Thread<C>> for Registry<C> {
    fn from_iter<I: IntoIterator<Item = Thread<C>>>(iter: I) -> Self {
        let mut all = Self::new();
        for thread in iter {
            all.insert(thread);
        }
        all
    }
}

impl<C> Storage for Registry<C> {
    fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }

    fn adopt(&mut self, fresh: &mut Self) {
        self.0.adopt(&mut fresh.0);
    }
}

pub(crate) fn lookup_mut<C>(all: &mut Registry<C>, tid: Tid) -> &mut Thread<C> {
    all.get_mut(&tid)
        .unwrap_or_else(|| panic!("no thread with tid {}", tid))
}

impl<C: Default> Thread<C> {
    pub fn new(name: Name, priority: u32, flags: Flags, stack: Option<Stack>) -> Self {
        assert!(
            (PRI_MIN..=PRI_MAX).contains(&priority),
            "priority {} out of range",
            priority
        );

        Self {
            tid: 0,
            name,
            status: Status::Blocked,
            flags,
            priority,
            effective: priority,
            nice: NICE_DEFAULT,
            recent_cpu: Fixed::ZERO,
            wakeup: 0,
            waiting_on: None,
            ticket: 0,
            stack,
            context: Box::default(),
        }
    }
}

impl<C> Thread<C> {
    pub fn is_idle(&self) -> bool {
        self.flags.contains(Flags::IDLE)
    }

    /// Panics if the thread ran off the end of its stack.
    pub fn check_stack(&self) {
        if let Some(stack) = &self.stack {
            assert!(
                stack.is_intact(),
                "stack overflow in thread {} ({})",
                self.tid,
                self.name
            );
        }
    }

    pub fn info(&self) -> ThreadInfo {
        ThreadInfo {
            tid: self.tid,
            name: self.name,
            status: self.status,
            flags: self.flags,
            priority: self.priority,
            effective_priority: self.effective,
            nice: self.nice,
            recent_cpu: self.recent_cpu,
            wakeup: self.wakeup,
            waiting_on: self.waiting_on,
        }
    }
}

/// Snapshot of a thread control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub tid: Tid,
    pub name: Name,
    pub status: Status,
    pub flags: Flags,
    pub priority: u32,
    pub effective_priority: u32,
    pub nice: i32,
    pub recent_cpu: Fixed,
    /// Only meaningful while the thread sleeps.
    pub wakeup: i64,
    pub waiting_on: Option<LockId>,
}

/// Thread factory, which can be used in order to configure the properties of
/// a new thread.
///
/// ```
/// # use kthreads::platform::sim::SimPlatform;
/// # use kthreads::{Builder, Manager, Options};
/// # fn worker(_: usize) {}
/// # let manager = Manager::new(SimPlatform::new(), Options::default());
/// let tid = Builder::new(worker, 7)
///     .name("worker")
///     .priority(20)
///     .spawn(&manager)
///     .unwrap();
/// assert_eq!(manager.thread(tid).unwrap().name, "worker");
/// ```
pub struct Builder {
    name: Name,
    priority: u32,
    flags: Flags,
    entry: ThreadFunc,
    aux: usize,
}

impl Builder {
    pub fn new(entry: ThreadFunc, aux: usize) -> Self {
        Self {
            name: Name::new("thread"),
            priority: PRI_DEFAULT,
            flags: Flags::empty(),
            entry,
            aux,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Name::new(name);
        self
    }

    /// Initial priority. Ignored when the MLFQS computes priorities.
    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the thread as running a user process.
    pub fn user(mut self) -> Self {
        self.flags |= Flags::USER;
        self
    }

    /// Creates the thread and puts it on the ready queue. It may run before
    /// this returns.
    pub fn spawn<P: Platform>(self, manager: &Manager<P>) -> Result<Tid> {
        manager.create(self.name, self.priority, self.flags, self.entry, self.aux)
    }
}
