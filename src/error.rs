//! Error types surfaced across the tree, its iterators, and the façades.

/// Everything a public operation on a tree can fail with.
///
/// `IndexOutOfRange` and `UnsupportedOperation` are ordinary, recoverable
/// results of caller input. `InternalInvariantViolated` means a structural
/// bug was detected; in debug builds the detecting call site asserts first
/// (so this variant is never actually returned — the process aborts), and
/// in release builds it is returned and the tree is considered poisoned:
/// further mutations on it may also fail, but it will not corrupt memory.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("index {index} out of range for a tree of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("this operation requires a tree constructed with insertion-order tracking")]
    UnsupportedOperation,

    #[error("internal invariant violated: {0}")]
    InternalInvariantViolated(&'static str),
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// Panics in debug builds (the detected condition is always a library bug,
/// never caller input), and otherwise produces the poisoning error value
/// for the release build to return.
#[inline]
#[track_caller]
pub(crate) fn invariant_violation(msg: &'static str) -> TreeError {
    debug_assert!(false, "internal invariant violated: {msg}");
    TreeError::InternalInvariantViolated(msg)
}
