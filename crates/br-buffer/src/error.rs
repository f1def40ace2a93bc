//! Error types.

use std::fmt;

use thiserror::Error;

/// Construction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Requested capacity was zero.
    #[error("ring buffer capacity must be positive (got {capacity})")]
    InvalidCapacity { capacity: usize },
}

/// Why a blocking `take` or `peek` gave up without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The caller's cancel token fired first.
    #[error("wait on ring buffer was cancelled")]
    Cancelled,
    /// The timeout elapsed first.
    #[error("wait on ring buffer timed out")]
    TimedOut,
}

/// Why a blocking `add` gave up. Carries the element back to the caller.
#[derive(Clone, PartialEq, Eq, Error)]
pub enum AddError<T> {
    #[error("add to ring buffer was cancelled before the element was stored")]
    Cancelled(T),
    #[error("add to ring buffer timed out while the buffer was full")]
    TimedOut(T),
}

impl<T> AddError<T> {
    pub(crate) fn new(kind: WaitError, item: T) -> Self {
        match kind {
            WaitError::Cancelled => AddError::Cancelled(item),
            WaitError::TimedOut => AddError::TimedOut(item),
        }
    }

    /// The element that was not added.
    pub fn into_inner(self) -> T {
        match self {
            AddError::Cancelled(item) | AddError::TimedOut(item) => item,
        }
    }

    /// The outcome without the element.
    pub fn kind(&self) -> WaitError {
        match self {
            AddError::Cancelled(_) => WaitError::Cancelled,
            AddError::TimedOut(_) => WaitError::TimedOut,
        }
    }
}

// Manual impl so `T` need not be `Debug`.
impl<T> fmt::Debug for AddError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddError::Cancelled(_) => f.write_str("Cancelled(..)"),
            AddError::TimedOut(_) => f.write_str("TimedOut(..)"),
        }
    }
}
