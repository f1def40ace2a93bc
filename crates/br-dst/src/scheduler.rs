//! Deterministic role scheduler.
//!
//! Decides which simulated role (producer, consumer, ...) runs the next
//! step. Same seed, same interleaving.

use crate::random::DeterministicRng;

/// Scheduling decision taken at a yield point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Keep running the current role
    Continue,
    /// Switch to the given role
    SwitchTo(usize),
}

/// Seeded scheduler over a fixed number of roles.
#[derive(Debug, Clone)]
pub struct Scheduler {
    rng: DeterministicRng,
    roles_count: usize,
    current: usize,
    yield_probability: f64,
    switches_count: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new(rng: DeterministicRng, roles_count: usize, yield_probability: f64) -> Self {
        debug_assert!(roles_count > 0, "Must schedule at least one role");
        debug_assert!(
            (0.0..=1.0).contains(&yield_probability),
            "yield_probability out of range"
        );
        Self {
            rng,
            roles_count,
            current: 0,
            yield_probability,
            switches_count: 0,
        }
    }

    /// Role currently scheduled.
    #[must_use]
    pub fn current_role(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn roles_count(&self) -> usize {
        self.roles_count
    }

    #[must_use]
    pub fn switches_count(&self) -> u64 {
        self.switches_count
    }

    /// Yield point: maybe hand the next step to another role.
    pub fn decide(&mut self) -> ScheduleDecision {
        if self.roles_count == 1 || !self.rng.gen_bool(self.yield_probability) {
            return ScheduleDecision::Continue;
        }
        self.switch_to_other();
        ScheduleDecision::SwitchTo(self.current)
    }

    /// Switch to some other role unconditionally.
    pub fn force_switch(&mut self) {
        if self.roles_count > 1 {
            self.switch_to_other();
        }
    }

    fn switch_to_other(&mut self) {
        let offset = self.rng.gen_range(1..self.roles_count);
        self.current = (self.current + offset) % self.roles_count;
        self.switches_count += 1;
    }
}
