//! Blocking bounded ring buffer.
//!
//! # Layout
//!
//! A fixed array of `Option<T>` slots, one write cursor and one live
//! count. The read cursor is derived:
//!
//! ```text
//! read = (write - count + capacity) mod capacity
//! ```
//!
//! Keeping a single cursor means the two can never drift apart.
//!
//! # Gates
//!
//! | Gate | Closed when | Waiters | Opened by |
//! |------|-------------|---------|-----------|
//! | `not_full` | `count == capacity` | `add` | `take` (notify one) |
//! | `not_empty` | `count == 0` | `take` | `add` (notify one) |
//! | `peekable` | `count == 0` | `peek` | `add` out of empty (notify all) |
//!
//! All condvars share the one mutex that guards the slots, so a gate is
//! always evaluated atomically with the state change it protects. Peekers
//! park on their own condvar so they never swallow a taker's wakeup.
//!
//! # Loom
//!
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test -p br-buffer --release
//! ```

#[cfg(loom)]
use loom::sync::{Condvar, Mutex, MutexGuard};
#[cfg(not(loom))]
use std::sync::{Condvar, Mutex, MutexGuard};

use std::sync::{Arc, PoisonError, Weak};
use std::time::{Duration, Instant};

use br_core::SlotLayout;

use crate::cancel::{CancelToken, WakeOnCancel};
use crate::error::{AddError, BufferError, WaitError};

/// Fixed-capacity FIFO shared between producers and consumers.
///
/// `add` blocks while the buffer is full, `take` and `peek` block while it
/// is empty. Cloning yields another handle to the same buffer.
///
/// ```
/// use br_buffer::BoundedRingBuffer;
///
/// let buffer = BoundedRingBuffer::new(3).unwrap();
/// buffer.add(10);
/// buffer.add(20);
/// assert_eq!(buffer.peek(), 10);
/// assert_eq!(buffer.take(), 10);
/// assert_eq!(buffer.size(), 1);
/// ```
pub struct BoundedRingBuffer<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    ring: Mutex<Ring<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    peekable: Condvar,
    capacity: usize,
}

struct Ring<T> {
    slots: Box<[Option<T>]>,
    write_cursor: usize,
    count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    NotFull,
    NotEmpty,
    Peekable,
}

/// A cancel token paired with the handle it should wake.
struct CancelWatch<'a> {
    token: &'a CancelToken,
    waker: Weak<dyn WakeOnCancel>,
}

impl<T> Ring<T> {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            write_cursor: 0,
            count: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn read_cursor(&self) -> usize {
        (self.write_cursor + self.capacity() - self.count) % self.capacity()
    }

    fn push(&mut self, item: T) {
        debug_assert!(!self.is_full(), "push into a full ring");
        debug_assert!(self.slots[self.write_cursor].is_none(), "write slot occupied");
        self.slots[self.write_cursor] = Some(item);
        self.write_cursor = (self.write_cursor + 1) % self.capacity();
        self.count += 1;
    }

    fn pop(&mut self) -> T {
        debug_assert!(!self.is_empty(), "pop from an empty ring");
        let read = self.read_cursor();
        let item = self.slots[read]
            .take()
            .expect("slot at the read cursor holds a live element");
        self.count -= 1;
        item
    }

    fn front(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.read_cursor()].as_ref()
    }

    fn closed(&self, gate: Gate) -> bool {
        match gate {
            Gate::NotFull => self.is_full(),
            Gate::NotEmpty | Gate::Peekable => self.is_empty(),
        }
    }

    fn layout(&self) -> SlotLayout {
        SlotLayout {
            capacity: self.capacity(),
            write_cursor: self.write_cursor,
            count: self.count,
            occupied: self.slots.iter().map(Option::is_some).collect(),
        }
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Ring<T>> {
        // Every mutation completes before user code can run under the
        // lock, so a poisoned ring is still consistent.
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn condvar(&self, gate: Gate) -> &Condvar {
        match gate {
            Gate::NotFull => &self.not_full,
            Gate::NotEmpty => &self.not_empty,
            Gate::Peekable => &self.peekable,
        }
    }

    /// Park until `gate` opens. Never gives up.
    fn block_until_open(&self, gate: Gate) -> MutexGuard<'_, Ring<T>> {
        let mut ring = self.lock();
        while ring.closed(gate) {
            tracing::trace!(?gate, "ring buffer waiting");
            ring = self
                .condvar(gate)
                .wait(ring)
                .unwrap_or_else(PoisonError::into_inner);
        }
        ring
    }

    /// Park until `gate` opens, the deadline passes, or the token fires.
    ///
    /// A fired token wins over an open gate, so a call made with an
    /// already-cancelled token never touches the ring.
    fn wait_until_open(
        &self,
        gate: Gate,
        deadline: Option<Instant>,
        watch: Option<&CancelWatch<'_>>,
    ) -> Result<MutexGuard<'_, Ring<T>>, WaitError> {
        let condvar = self.condvar(gate);
        let mut ring = self.lock();
        let mut registered = false;

        loop {
            if watch.map_or(false, |w| w.token.is_cancelled()) {
                if !ring.closed(gate) {
                    // We may have consumed a notify_one meant for a peer.
                    condvar.notify_one();
                }
                tracing::trace!(?gate, "ring buffer wait cancelled");
                return Err(WaitError::Cancelled);
            }
            if !ring.closed(gate) {
                return Ok(ring);
            }
            if let Some(w) = watch {
                if !registered {
                    w.token.register(&w.waker);
                    registered = true;
                    continue;
                }
            }

            let remaining = match deadline {
                None => None,
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => {
                        tracing::trace!(?gate, "ring buffer wait timed out");
                        return Err(WaitError::TimedOut);
                    }
                },
            };

            tracing::trace!(?gate, "ring buffer waiting");
            ring = match remaining {
                None => condvar.wait(ring).unwrap_or_else(PoisonError::into_inner),
                Some(left) => {
                    condvar
                        .wait_timeout(ring, left)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    fn push_locked(&self, mut ring: MutexGuard<'_, Ring<T>>, item: T) {
        let was_empty = ring.is_empty();
        ring.push(item);
        drop(ring);
        self.not_empty.notify_one();
        if was_empty {
            self.peekable.notify_all();
        }
    }

    fn pop_locked(&self, mut ring: MutexGuard<'_, Ring<T>>) -> T {
        let item = ring.pop();
        drop(ring);
        self.not_full.notify_one();
        item
    }
}

impl<T: Send> WakeOnCancel for Shared<T> {
    fn wake_all(&self) {
        // Taking the lock orders this wakeup after any in-flight check.
        drop(self.lock());
        self.not_full.notify_all();
        self.not_empty.notify_all();
        self.peekable.notify_all();
    }
}

fn deadline_after(timeout: Duration) -> Option<Instant> {
    // An unrepresentable deadline waits forever.
    Instant::now().checked_add(timeout)
}

impl<T> BoundedRingBuffer<T> {
    /// Create an empty buffer with `capacity` slots.
    ///
    /// # Errors
    ///
    /// `BufferError::InvalidCapacity` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity { capacity });
        }
        tracing::debug!(capacity, "ring buffer created");
        Ok(Self {
            shared: Arc::new(Shared {
                ring: Mutex::new(Ring::new(capacity)),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                peekable: Condvar::new(),
                capacity,
            }),
        })
    }

    /// Append `item`, blocking while the buffer is full.
    pub fn add(&self, item: T) {
        let ring = self.shared.block_until_open(Gate::NotFull);
        self.shared.push_locked(ring, item);
    }

    /// Append `item`, waiting at most `timeout` for a free slot.
    ///
    /// A zero timeout never parks.
    ///
    /// # Errors
    ///
    /// `AddError::TimedOut` with the item if no slot freed up in time.
    pub fn add_timeout(&self, item: T, timeout: Duration) -> Result<(), AddError<T>> {
        match self
            .shared
            .wait_until_open(Gate::NotFull, deadline_after(timeout), None)
        {
            Ok(ring) => {
                self.shared.push_locked(ring, item);
                Ok(())
            }
            Err(kind) => Err(AddError::new(kind, item)),
        }
    }

    /// Remove and return the oldest element, blocking while empty.
    pub fn take(&self) -> T {
        let ring = self.shared.block_until_open(Gate::NotEmpty);
        self.shared.pop_locked(ring)
    }

    /// Remove the oldest element, waiting at most `timeout` for one.
    ///
    /// # Errors
    ///
    /// `WaitError::TimedOut` if the buffer stayed empty.
    pub fn take_timeout(&self, timeout: Duration) -> Result<T, WaitError> {
        let ring = self
            .shared
            .wait_until_open(Gate::NotEmpty, deadline_after(timeout), None)?;
        Ok(self.shared.pop_locked(ring))
    }

    /// Number of live elements at the instant of the call.
    #[must_use]
    pub fn size(&self) -> usize {
        self.shared.lock().count
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.size() == self.capacity()
    }

    /// Cursor, count and slot occupancy, captured under one lock.
    #[must_use]
    pub fn slot_layout(&self) -> SlotLayout {
        self.shared.lock().layout()
    }
}

impl<T: Clone> BoundedRingBuffer<T> {
    /// Clone of the oldest element, blocking while empty. Does not remove.
    pub fn peek(&self) -> T {
        let ring = self.shared.block_until_open(Gate::Peekable);
        Self::front_of(&ring)
    }

    /// Like [`peek`](Self::peek), waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// `WaitError::TimedOut` if the buffer stayed empty.
    pub fn peek_timeout(&self, timeout: Duration) -> Result<T, WaitError> {
        let ring = self
            .shared
            .wait_until_open(Gate::Peekable, deadline_after(timeout), None)?;
        Ok(Self::front_of(&ring))
    }

    /// Live elements, oldest first.
    #[must_use]
    pub fn contents(&self) -> Vec<T> {
        let ring = self.shared.lock();
        let read = ring.read_cursor();
        (0..ring.count)
            .filter_map(|i| {
                let slot = (read + i) % ring.capacity();
                debug_assert!(
                    ring.slots[slot].is_some(),
                    "slot {} is empty inside the live window",
                    slot
                );
                ring.slots[slot].clone()
            })
            .collect()
    }

    fn front_of(ring: &Ring<T>) -> T {
        ring.front()
            .cloned()
            .expect("open peekable gate implies a live front element")
    }
}

impl<T: Send + 'static> BoundedRingBuffer<T> {
    fn watch<'a>(&self, token: &'a CancelToken) -> CancelWatch<'a> {
        let waker: Weak<dyn WakeOnCancel> = Arc::downgrade(&self.shared) as Weak<dyn WakeOnCancel>;
        CancelWatch { token, waker }
    }

    /// Append `item`, blocking while full, until `token` fires.
    ///
    /// # Errors
    ///
    /// `AddError::Cancelled` with the item; the buffer is unchanged.
    pub fn add_cancellable(&self, item: T, token: &CancelToken) -> Result<(), AddError<T>> {
        let watch = self.watch(token);
        match self.shared.wait_until_open(Gate::NotFull, None, Some(&watch)) {
            Ok(ring) => {
                self.shared.push_locked(ring, item);
                Ok(())
            }
            Err(kind) => Err(AddError::new(kind, item)),
        }
    }

    /// Remove the oldest element, blocking while empty, until `token` fires.
    ///
    /// # Errors
    ///
    /// `WaitError::Cancelled`; the buffer is unchanged.
    pub fn take_cancellable(&self, token: &CancelToken) -> Result<T, WaitError> {
        let watch = self.watch(token);
        let ring = self
            .shared
            .wait_until_open(Gate::NotEmpty, None, Some(&watch))?;
        Ok(self.shared.pop_locked(ring))
    }
}

impl<T: Clone + Send + 'static> BoundedRingBuffer<T> {
    /// Clone of the oldest element, blocking while empty, until `token` fires.
    ///
    /// # Errors
    ///
    /// `WaitError::Cancelled`.
    pub fn peek_cancellable(&self, token: &CancelToken) -> Result<T, WaitError> {
        let watch = self.watch(token);
        let ring = self
            .shared
            .wait_until_open(Gate::Peekable, None, Some(&watch))?;
        Ok(Self::front_of(&ring))
    }
}

impl<T> Clone for BoundedRingBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for BoundedRingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.shared.lock();
        f.debug_struct("BoundedRingBuffer")
            .field("capacity", &self.shared.capacity)
            .field("write_cursor", &ring.write_cursor)
            .field("count", &ring.count)
            .finish()
    }
}


/// Loom models of the two gates.
#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::thread;

    #[test]
    fn test_handoff_through_full_gate() {
        loom::model(|| {
            let buf = BoundedRingBuffer::new(1).unwrap();
            let producer = {
                let buf = buf.clone();
                thread::spawn(move || {
                    buf.add(1);
                    buf.add(2);
                })
            };

            assert_eq!(buf.take(), 1);
            assert_eq!(buf.take(), 2);
            producer.join().unwrap();
            assert!(buf.is_empty());
        });
    }

    #[test]
    fn test_handoff_through_empty_gate() {
        loom::model(|| {
            let buf = BoundedRingBuffer::new(2).unwrap();
            let consumer = {
                let buf = buf.clone();
                thread::spawn(move || (buf.take(), buf.take()))
            };

            buf.add(1);
            buf.add(2);
            assert_eq!(consumer.join().unwrap(), (1, 2));
        });
    }

    #[test]
    fn test_peek_and_take_both_wake() {
        loom::model(|| {
            let buf = BoundedRingBuffer::new(1).unwrap();
            let peeker = {
                let buf = buf.clone();
                thread::spawn(move || buf.peek())
            };
            let taker = {
                let buf = buf.clone();
                thread::spawn(move || buf.take())
            };

            buf.add(5);
            assert_eq!(peeker.join().unwrap(), 5);
            assert_eq!(taker.join().unwrap(), 5);
        });
    }
}
