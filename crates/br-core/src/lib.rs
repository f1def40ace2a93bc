//! # br-core
//!
//! Property vocabulary for the bounded ring buffer.
//!
//! This crate provides:
//! - `PropertyResult` and `PropertyChecker` for verifying invariants
//! - `Counterexample` for rendering failure paths
//! - `BoundedBufferProperties`, the view a buffer exposes so its
//!   invariants can be checked from the outside

pub mod counterexample;
pub mod invariants;
pub mod property;

pub use counterexample::{Counterexample, RingIssue, RoleAction, StateSnapshot};
pub use invariants::{BoundedBufferProperties, BoundedBufferPropertyChecker, SlotLayout};
pub use property::{PropertyChecker, PropertyResult};
