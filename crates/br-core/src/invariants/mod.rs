//! Invariant traits for the bounded ring buffer.
//!
//! - `bounded_buffer`: NoLostElements, NoDuplicates, FifoOrder,
//!   BoundedCapacity, CursorInRange, LiveSlotsContiguous

pub mod bounded_buffer;

pub use bounded_buffer::{BoundedBufferProperties, BoundedBufferPropertyChecker, SlotLayout};
