//! Stand-in buffers for testing the DST machinery itself.

use std::collections::VecDeque;
use std::sync::Mutex;

use br_core::SlotLayout;

use crate::fault_injection::{DstTestableBuffer, Refusal};

/// `VecDeque`-backed stand-in, enough to test the runner itself.
pub(crate) struct MockBuffer {
    values: Mutex<VecDeque<u64>>,
    capacity: usize,
}

impl DstTestableBuffer for MockBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    fn add_now(&self, value: u64) -> Result<(), Refusal> {
        let mut values = self.values.lock().unwrap();
        if values.len() == self.capacity {
            return Err(Refusal::WouldBlock);
        }
        values.push_back(value);
        Ok(())
    }

    fn take_now(&self) -> Result<u64, Refusal> {
        self.values
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(Refusal::WouldBlock)
    }

    fn peek_now(&self) -> Result<u64, Refusal> {
        self.values
            .lock()
            .unwrap()
            .front()
            .copied()
            .ok_or(Refusal::WouldBlock)
    }

    fn add_cancelled(&self, _value: u64) -> Result<(), Refusal> {
        Err(Refusal::Cancelled)
    }

    fn take_cancelled(&self) -> Result<u64, Refusal> {
        Err(Refusal::Cancelled)
    }

    fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn contents(&self) -> Vec<u64> {
        self.values.lock().unwrap().iter().copied().collect()
    }

    fn slot_layout(&self) -> SlotLayout {
        // Model a ring whose read cursor is pinned at slot 0.
        let count = self.len();
        SlotLayout {
            capacity: self.capacity,
            write_cursor: count % self.capacity,
            count,
            occupied: (0..self.capacity).map(|i| i < count).collect(),
        }
    }
}

/// Take that forgets to remove the element.
pub(crate) struct LeakyBuffer(MockBuffer);

impl DstTestableBuffer for LeakyBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self(MockBuffer::with_capacity(capacity))
    }
    fn add_now(&self, value: u64) -> Result<(), Refusal> {
        self.0.add_now(value)
    }
    fn take_now(&self) -> Result<u64, Refusal> {
        self.0.peek_now()
    }
    fn peek_now(&self) -> Result<u64, Refusal> {
        self.0.peek_now()
    }
    fn add_cancelled(&self, value: u64) -> Result<(), Refusal> {
        self.0.add_cancelled(value)
    }
    fn take_cancelled(&self) -> Result<u64, Refusal> {
        self.0.take_cancelled()
    }
    fn len(&self) -> usize {
        self.0.len()
    }
    fn capacity(&self) -> usize {
        self.0.capacity()
    }
    fn contents(&self) -> Vec<u64> {
        self.0.contents()
    }
    fn slot_layout(&self) -> SlotLayout {
        self.0.slot_layout()
    }
}

/// Add that always reports a full buffer.
pub(crate) struct StuckBuffer(MockBuffer);

impl DstTestableBuffer for StuckBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self(MockBuffer::with_capacity(capacity))
    }
    fn add_now(&self, _value: u64) -> Result<(), Refusal> {
        Err(Refusal::WouldBlock)
    }
    fn take_now(&self) -> Result<u64, Refusal> {
        self.0.take_now()
    }
    fn peek_now(&self) -> Result<u64, Refusal> {
        self.0.peek_now()
    }
    fn add_cancelled(&self, value: u64) -> Result<(), Refusal> {
        self.0.add_cancelled(value)
    }
    fn take_cancelled(&self) -> Result<u64, Refusal> {
        self.0.take_cancelled()
    }
    fn len(&self) -> usize {
        self.0.len()
    }
    fn capacity(&self) -> usize {
        self.0.capacity()
    }
    fn contents(&self) -> Vec<u64> {
        self.0.contents()
    }
    fn slot_layout(&self) -> SlotLayout {
        self.0.slot_layout()
    }
}
