//! # br-buffer
//!
//! Blocking bounded ring buffer for producer/consumer hand-off.
//!
//! | Operation | Blocks while | Gives up on |
//! |-----------|--------------|-------------|
//! | `add` | full | never |
//! | `add_timeout` | full | timeout |
//! | `add_cancellable` | full | cancel token |
//! | `take` / `peek` | empty | never |
//! | `take_timeout` / `peek_timeout` | empty | timeout |
//! | `take_cancellable` / `peek_cancellable` | empty | cancel token |
//!
//! A call that gives up leaves the buffer exactly as it found it.
//!
//! The buffer implements `DstTestableBuffer` from `br-dst` and has loom
//! models under `#[cfg(loom)]`.

mod cancel;
mod dst;
mod error;
mod ring;

pub use cancel::CancelToken;
pub use error::{AddError, BufferError, WaitError};
pub use ring::BoundedRingBuffer;
