//! Producer/consumer DST harness over a bounded buffer.
//!
//! Roles `0..producers_count` add fresh tags; the remaining roles take, or
//! peek now and then. All operations go through a `DstRunner`, so faults
//! and per-operation contracts are handled there.
//!
//! Nothing really blocks. An operation refused with `WouldBlock` PARKS its
//! role, and the scheduler moves on. That is how a blocking gate looks
//! from a single thread:
//!
//! | Refused | Parks | Unparked by |
//! |---------|-------|-------------|
//! | add (full) | that producer | any take that removed an element |
//! | take / peek (empty) | that consumer | any add that stored an element |
//!
//! A parked role retries the same operation once unparked; it does not
//! spend a step on the refusal.
//!
//! A run ends when every role is done or parked. Parked producers are only
//! acceptable with every consumer done and the buffer full; parked
//! consumers only with every producer done and the buffer empty. Anything
//! else is a deadlock and fails the run.

use br_core::{Counterexample, PropertyResult};

use crate::fault_injection::{DstRunner, DstTestableBuffer, FaultType};
use crate::{DstEnv, FaultConfig};

/// Upper bound on simulated roles.
const ROLES_COUNT_MAX: usize = 16;

/// Configuration for a producer/consumer run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub producers_count: usize,
    pub consumers_count: usize,
    /// Capacity of the buffer under test
    pub capacity: usize,
    /// Completed operations each role performs before it is done
    pub steps_per_role: u64,
    /// Probability of handing control to another role after a step
    pub yield_probability: f64,
    /// Probability that a consumer step is a peek instead of a take
    pub peek_probability: f64,
    /// Faults injected by the runner at operation boundaries
    pub fault_config: FaultConfig,
    /// Check invariants after every N operations (0 = only at the end)
    pub invariant_check_interval: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            producers_count: 1,
            consumers_count: 1,
            capacity: 4,
            steps_per_role: 200,
            yield_probability: 0.3,
            peek_probability: 0.1,
            fault_config: FaultConfig::default(),
            invariant_check_interval: 10,
        }
    }
}

impl HarnessConfig {
    /// Several producers and consumers on a small buffer, frequent faults.
    #[must_use]
    pub fn stress() -> Self {
        Self {
            producers_count: 3,
            consumers_count: 3,
            capacity: 3,
            steps_per_role: 2_000,
            yield_probability: 0.5,
            peek_probability: 0.1,
            fault_config: FaultConfig::aggressive(),
            invariant_check_interval: 50,
        }
    }

    /// One producer, one consumer, no faults.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            producers_count: 1,
            consumers_count: 1,
            capacity: 2,
            steps_per_role: 50,
            yield_probability: 0.2,
            peek_probability: 0.0,
            fault_config: FaultConfig::none(),
            invariant_check_interval: 5,
        }
    }

    fn roles_count(&self) -> usize {
        self.producers_count + self.consumers_count
    }
}

/// Scheduling state of one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleState {
    Ready,
    /// Waiting for the opposite gate to move
    Parked,
    Done,
}

/// What one step did to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    /// An element went in or came out
    Moved,
    /// Completed without moving anything (peek, cancelled call)
    Settled,
    /// Refused with `WouldBlock`
    Refused,
}

/// Result of a harness run.
#[derive(Debug, Clone)]
pub struct HarnessResult {
    pub seed: u64,
    pub operations_count: u64,
    pub switches_count: u64,
    /// Times a role parked on a closed gate
    pub parks_count: u64,
    pub faults_injected_count: u64,
    pub invariant_checks_count: u64,
    /// Elements added and taken over the whole run
    pub added_count: u64,
    pub taken_count: u64,
    pub all_invariants_held: bool,
    pub first_violation: Option<String>,
    /// Role interleaving up to the violation, if any
    pub counterexample: Option<Counterexample>,
}

/// Deterministic producer/consumer harness.
pub struct DstHarness<B> {
    env: DstEnv,
    runner: DstRunner<B>,
    config: HarnessConfig,
    roles: Vec<RoleState>,
    role_steps: Vec<u64>,
    next_tag: u64,
    operations_count: u64,
    parks_count: u64,
    added_count: u64,
    taken_count: u64,
    invariant_checks_count: u64,
    violation: Option<String>,
}

impl<B: DstTestableBuffer> DstHarness<B> {
    /// Harness over a fresh buffer.
    #[must_use]
    pub fn new(seed: u64, config: HarnessConfig) -> Self {
        let roles_count = config.roles_count();
        debug_assert!(seed != 0, "Seed should not be zero");
        debug_assert!(config.producers_count > 0, "Need at least one producer");
        debug_assert!(config.consumers_count > 0, "Need at least one consumer");
        debug_assert!(
            roles_count <= ROLES_COUNT_MAX,
            "Too many roles for DST: {}",
            roles_count
        );
        debug_assert!(config.capacity > 0, "capacity must be positive");

        // Faults live in the runner; the env only schedules.
        let env = DstEnv::with_scheduler(
            seed,
            roles_count,
            config.yield_probability,
            FaultConfig::none(),
        );
        let runner =
            DstRunner::with_fault_config(seed, config.capacity, config.fault_config.clone());

        Self {
            env,
            runner,
            roles: vec![RoleState::Ready; roles_count],
            role_steps: vec![0; roles_count],
            config,
            next_tag: 1,
            operations_count: 0,
            parks_count: 0,
            added_count: 0,
            taken_count: 0,
            invariant_checks_count: 0,
            violation: None,
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.env.seed()
    }

    /// Runner (and through it, the buffer) under test.
    pub fn runner(&self) -> &DstRunner<B> {
        &self.runner
    }

    /// State of every role, producers first.
    pub fn roles(&self) -> &[RoleState] {
        &self.roles
    }

    fn is_producer(&self, role: usize) -> bool {
        role < self.config.producers_count
    }

    /// Run until every role is done or parked, or a violation stops it.
    pub fn run(&mut self) -> HarnessResult {
        while self.violation.is_none() {
            let Some(role) = self.next_ready_role() else {
                self.check_quiescent();
                break;
            };

            match self.step(role) {
                StepOutcome::Refused => {
                    self.roles[role] = RoleState::Parked;
                    self.parks_count += 1;
                    self.force_switch();
                }
                outcome => {
                    self.role_steps[role] += 1;
                    if self.role_steps[role] >= self.config.steps_per_role {
                        self.roles[role] = RoleState::Done;
                    }
                    if outcome == StepOutcome::Moved {
                        self.unpark_opposite(role);
                    }
                    if let Some(scheduler) = self.env.scheduler() {
                        scheduler.decide();
                    }
                }
            }

            if let Some(contract) = self.runner.violations().first() {
                let message = format!("Role {}: {}", role, contract);
                self.stop_with_violation(message);
                break;
            }
            if self.due_for_check() {
                self.check_invariants();
            }
        }

        if self.violation.is_none() {
            self.check_invariants();
        }
        self.build_result()
    }

    /// The scheduled role if it can run, else some other ready role.
    fn next_ready_role(&mut self) -> Option<usize> {
        if !self.roles.contains(&RoleState::Ready) {
            return None;
        }
        let scheduler = self.env.scheduler()?;
        while self.roles[scheduler.current_role()] != RoleState::Ready {
            scheduler.force_switch();
        }
        Some(scheduler.current_role())
    }

    fn force_switch(&mut self) {
        if let Some(scheduler) = self.env.scheduler() {
            scheduler.force_switch();
        }
    }

    fn step(&mut self, role: usize) -> StepOutcome {
        self.operations_count += 1;

        if self.is_producer(role) {
            let tag = self.next_tag;
            return match self.runner.add(tag) {
                Ok(false) => StepOutcome::Refused,
                // Abandoned after the add: the element is in.
                Ok(true) | Err(FaultType::CallerAbandon) => {
                    self.next_tag += 1;
                    self.added_count += 1;
                    StepOutcome::Moved
                }
                Err(_) => {
                    self.next_tag += 1;
                    StepOutcome::Settled
                }
            };
        }

        if self.env.rng().gen_bool(self.config.peek_probability) {
            return match self.runner.peek() {
                Some(_) => StepOutcome::Settled,
                None => StepOutcome::Refused,
            };
        }
        match self.runner.take() {
            Ok(None) => StepOutcome::Refused,
            Ok(Some(_)) | Err(FaultType::CallerAbandon) => {
                self.taken_count += 1;
                StepOutcome::Moved
            }
            Err(_) => StepOutcome::Settled,
        }
    }

    /// A stored element wakes consumers; a removed one wakes producers.
    fn unpark_opposite(&mut self, role: usize) {
        let producers = self.config.producers_count;
        let woken = if self.is_producer(role) {
            producers..self.roles.len()
        } else {
            0..producers
        };
        for state in &mut self.roles[woken] {
            if *state == RoleState::Parked {
                *state = RoleState::Ready;
            }
        }
    }

    /// Nobody can run. Check that everyone parked for a real reason.
    fn check_quiescent(&mut self) {
        let (producers, consumers) = self.roles.split_at(self.config.producers_count);
        let parked = |roles: &[RoleState]| roles.contains(&RoleState::Parked);
        let done = |roles: &[RoleState]| roles.iter().all(|&r| r == RoleState::Done);

        let buffer = self.runner.buffer();
        let (len, capacity) = (buffer.len(), buffer.capacity());

        let producers_stuck = parked(producers) && !(done(consumers) && len == capacity);
        let consumers_stuck = parked(consumers) && !(done(producers) && len == 0);
        if producers_stuck || consumers_stuck {
            self.stop_with_violation(format!(
                "Deadlock: roles {:?} parked at len={} capacity={}",
                self.roles, len, capacity
            ));
        }
    }

    fn due_for_check(&self) -> bool {
        let interval = self.config.invariant_check_interval;
        interval != 0 && self.operations_count % interval == 0
    }

    fn check_invariants(&mut self) {
        self.invariant_checks_count += 1;
        let failed: Option<PropertyResult> = self
            .runner
            .check_invariants()
            .into_iter()
            .find(|r| !r.holds);
        if let Some(result) = failed {
            self.stop_with_violation(result.format());
        }
    }

    fn stop_with_violation(&mut self, message: String) {
        if self.violation.is_none() {
            tracing::warn!(seed = self.seed(), %message, "DST violation");
            self.violation = Some(message);
        }
    }

    fn build_result(&mut self) -> HarnessResult {
        let seed = self.seed();
        let counterexample = self.violation.as_ref().map(|violation| {
            let mut ce = Counterexample::with_seed(seed).with_description(violation.clone());
            for action in self.runner.actions() {
                ce.add_action(action.clone());
            }
            ce
        });

        HarnessResult {
            seed,
            operations_count: self.operations_count,
            switches_count: self.env.scheduler().map_or(0, |s| s.switches_count()),
            parks_count: self.parks_count,
            faults_injected_count: self.runner.stats().faults_injected,
            invariant_checks_count: self.invariant_checks_count,
            added_count: self.added_count,
            taken_count: self.taken_count,
            all_invariants_held: self.violation.is_none(),
            first_violation: self.violation.clone(),
            counterexample,
        }
    }
}

impl HarnessResult {
    /// One status line, plus the failure diagram if the run failed.
    #[must_use]
    pub fn format(&self) -> String {
        let status = if self.all_invariants_held { "PASS" } else { "FAIL" };
        let mut result = format!(
            "[{}] DST_SEED={} ops={} added={} taken={} parks={} switches={} faults={} checks={}",
            status,
            self.seed,
            self.operations_count,
            self.added_count,
            self.taken_count,
            self.parks_count,
            self.switches_count,
            self.faults_injected_count,
            self.invariant_checks_count
        );

        if let Some(ref ce) = self.counterexample {
            result.push('\n');
            result.push_str(&ce.render_diagram());
        }

        result
    }
}
