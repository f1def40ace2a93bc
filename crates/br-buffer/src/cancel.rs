//! Cancellation signal for blocked buffer operations.
//!
//! A `CancelToken` is shared by cloning. Firing it wakes every thread that
//! is blocked on a buffer with that token; those calls return `Cancelled`
//! and leave the buffer exactly as they found it.
//!
//! # Lost wakeups
//!
//! A waiter registers with the token before it checks the flag, and both
//! happen under the buffer's lock. `cancel()` stores the flag before it
//! snapshots the registrations, and wakes each buffer under that buffer's
//! lock. So either the waiter sees the flag, or it is already registered
//! and parked when the wakeup arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Something that parks threads and can be told to re-check.
pub(crate) trait WakeOnCancel: Send + Sync {
    /// Wake every parked thread so it re-evaluates its cancel token.
    fn wake_all(&self);
}

/// Cloneable cancellation signal.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenState>,
}

#[derive(Default)]
struct TokenState {
    cancelled: AtomicBool,
    watchers: Mutex<Vec<Weak<dyn WakeOnCancel>>>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let watchers: Vec<_> = self
            .inner
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        tracing::trace!(watchers = watchers.len(), "cancel token fired");
        for watcher in watchers.iter().filter_map(Weak::upgrade) {
            watcher.wake_all();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Register a buffer to be woken on cancel. One entry per buffer.
    pub(crate) fn register(&self, watcher: &Weak<dyn WakeOnCancel>) {
        let mut watchers = self
            .inner
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        watchers.retain(|w| w.strong_count() > 0);
        if !watchers.iter().any(|w| w.ptr_eq(watcher)) {
            watchers.push(watcher.clone());
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
