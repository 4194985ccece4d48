use alloc::string::String;

/// Recoverable kernel errors.
///
/// Broken scheduler invariants are not represented here: those halt the
/// kernel with a panic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OsError {
    /// The page allocator could not provide a kernel stack.
    #[error("out of memory")]
    OutOfMemory,

    /// Thread identifiers are never reused, and none are left.
    #[error("thread identifiers exhausted")]
    TidExhausted,

    #[error("unknown option `{0}`")]
    UnknownOption(String),

    #[error("bad value for option `{0}`")]
    BadOption(String),
}
