//! # br-dst
//!
//! Deterministic Simulation Testing for the bounded ring buffer.
//!
//! Time, randomness, role scheduling and faults are all derived from a
//! single seed, so any failing run can be replayed exactly.
//!
//! ## Harnesses
//!
//! - `harness`: producer/consumer interleaving over a buffer, where a
//!   refused operation parks its role (`DstHarness`)
//! - `fault_injection`: buffer runner that injects cancellations and
//!   abandoned callers at operation boundaries (`DstRunner`)
//!
//! ## Usage
//!
//! ```rust
//! use br_dst::DstEnv;
//!
//! let mut env = DstEnv::new(12345);
//!
//! // Deterministic time
//! env.clock().advance_ns(1_000_000);
//! assert_eq!(env.clock().now_ns(), 1_000_000);
//!
//! // Deterministic randomness
//! let choice: u64 = env.rng().gen_range(0..10);
//! assert!(choice < 10);
//!
//! // Deterministic fault injection
//! if env.fault().should_fail() {
//!     // simulate a cancelled caller
//! }
//! ```
//!
//! ## Reproducibility
//!
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

pub mod clock;
pub mod env;
pub mod fault;
pub mod fault_injection;
pub mod harness;
#[cfg(test)]
mod mock;
pub mod random;
pub mod scheduler;

pub use clock::SimClock;
pub use env::{DstEnv, EnvStats};
pub use fault::{FaultConfig, FaultInjector, FaultStats};
pub use fault_injection::{
    run_dst_scenario, DstOp, DstResult, DstRunner, DstStats, DstTestableBuffer, FaultPoint,
    FaultType, Refusal,
};
pub use harness::{DstHarness, HarnessConfig, HarnessResult, RoleState};
pub use random::DeterministicRng;
pub use scheduler::{ScheduleDecision, Scheduler};

/// Get DST seed from environment or generate a random one.
///
/// Prints the seed for reproduction. Use `DST_SEED=<seed>` to reproduce.
///
/// # Panics
///
/// Panics if `DST_SEED` is set but is not a valid `u64`.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var("DST_SEED") {
        Ok(s) => {
            let seed: u64 = s.parse().expect("DST_SEED must be a valid u64");
            println!("DST_SEED={} (from environment)", seed);
            seed
        }
        Err(_) => {
            // Zero is reserved; checkers reject it as a seed.
            let seed = rand::random::<u64>().max(1);
            println!("DST_SEED={} (randomly generated)", seed);
            seed
        }
    }
}

/// Iteration count from `DST_ITERATIONS`, or `default`.
#[must_use]
pub fn iterations_or(default: u64) -> u64 {
    std::env::var("DST_ITERATIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
