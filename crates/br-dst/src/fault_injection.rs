//! Fault injection for bounded buffers.
//!
//! Faults are injected at OPERATION BOUNDARIES. The buffer under test is
//! unchanged; the runner decides, per operation, whether the caller
//! cancels before it starts, abandons the result after it finishes, or
//! is simply slow.
//!
//! | Fault | Point | What it checks |
//! |-------|-------|----------------|
//! | Cancellation | before | A cancelled add/take leaves the slot layout untouched |
//! | CallerAbandon | after | A completed add/take is accounted even if the caller vanishes |
//! | Delay | either | Simulated time moves, ordering does not |
//!
//! Operations never wait: a full add or empty take reports `WouldBlock`,
//! and the runner verifies the buffer really was full or empty.

use crate::fault::{FaultConfig, FaultInjector};
use crate::random::DeterministicRng;
use crate::SimClock;

use br_core::{
    BoundedBufferProperties, BoundedBufferPropertyChecker, PropertyChecker, PropertyResult,
    RoleAction, SlotLayout,
};

/// Fault injection points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Before starting an operation
    BeforeOperation,
    /// After an operation completes, before the caller sees the result
    AfterOperation,
}

/// Types of faults that can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// The caller's cancellation signal fires
    Cancellation,
    /// The caller goes away without using the result
    CallerAbandon,
    /// The caller is slow
    Delay,
}

/// Why a non-waiting operation did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// The gate was closed (full for add, empty for take/peek)
    WouldBlock,
    /// The operation was cancelled before it could proceed
    Cancelled,
}

/// Trait for buffers testable with DST.
///
/// MINIMAL interface: non-waiting forms of the blocking operations plus
/// the views the invariant checker needs.
pub trait DstTestableBuffer: Send + Sync {
    /// Build an empty buffer.
    fn with_capacity(capacity: usize) -> Self;
    /// Add without waiting.
    fn add_now(&self, value: u64) -> Result<(), Refusal>;
    /// Take without waiting.
    fn take_now(&self) -> Result<u64, Refusal>;
    /// Peek without waiting.
    fn peek_now(&self) -> Result<u64, Refusal>;
    /// Add with a cancellation signal that has already fired.
    fn add_cancelled(&self, value: u64) -> Result<(), Refusal>;
    /// Take with a cancellation signal that has already fired.
    fn take_cancelled(&self) -> Result<u64, Refusal>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn capacity(&self) -> usize;
    /// Live elements, oldest first.
    fn contents(&self) -> Vec<u64>;
    fn slot_layout(&self) -> SlotLayout;
}

/// DST runner for bounded buffers.
///
/// Tracks every completed add and take so the bounded-buffer properties
/// can be checked at any point.
pub struct DstRunner<B> {
    buffer: B,
    rng: DeterministicRng,
    fault_injector: FaultInjector,
    clock: SimClock,
    seed: u64,
    produced: Vec<u64>,
    consumed: Vec<u64>,
    actions: Vec<RoleAction>,
    violations: Vec<String>,
    operations_count: u64,
    faults_injected: u64,
    abandoned_operations: u64,
    would_block_count: u64,
}

impl<B: DstTestableBuffer> DstRunner<B> {
    /// Runner over a fresh buffer with default fault injection.
    pub fn new(seed: u64, capacity: usize) -> Self {
        Self::with_fault_config(seed, capacity, FaultConfig::default())
    }

    /// Runner over a fresh buffer with explicit fault injection.
    pub fn with_fault_config(seed: u64, capacity: usize, fault_config: FaultConfig) -> Self {
        debug_assert!(capacity > 0, "capacity must be positive");
        Self::with_buffer(seed, B::with_capacity(capacity), fault_config)
    }

    /// Runner over an existing (empty) buffer.
    pub fn with_buffer(seed: u64, buffer: B, fault_config: FaultConfig) -> Self {
        debug_assert!(buffer.is_empty(), "runner must start from an empty buffer");
        Self {
            buffer,
            rng: DeterministicRng::new(seed),
            fault_injector: FaultInjector::new(
                DeterministicRng::new(seed.wrapping_add(1)),
                fault_config,
            ),
            clock: SimClock::new(),
            seed,
            produced: Vec::new(),
            consumed: Vec::new(),
            actions: Vec::new(),
            violations: Vec::new(),
            operations_count: 0,
            faults_injected: 0,
            abandoned_operations: 0,
            would_block_count: 0,
        }
    }

    /// Seed for reproduction.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Buffer under test.
    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Role actions recorded so far (0 = producer, 1 = consumer).
    pub fn actions(&self) -> &[RoleAction] {
        &self.actions
    }

    /// Per-operation violations noticed by the runner itself.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Add with fault injection at the boundaries.
    ///
    /// `Ok(true)` if the element went in, `Ok(false)` if the buffer was
    /// full, `Err` if a fault cut the operation short.
    pub fn add(&mut self, value: u64) -> Result<bool, FaultType> {
        if let Some(fault) = self.maybe_inject_fault(FaultPoint::BeforeOperation) {
            if fault == FaultType::Cancellation {
                let before = self.buffer.slot_layout();
                let outcome = self.buffer.add_cancelled(value);
                self.expect_cancelled("add", outcome.err(), &before);
                self.record(0, format!("add({})", value), false);
                return Err(fault);
            }
        }

        let outcome = self.buffer.add_now(value);
        self.operations_count += 1;

        match outcome {
            Ok(()) => {
                self.produced.push(value);
                self.record(0, format!("add({})", value), true);
            }
            Err(refusal) => {
                self.would_block_count += 1;
                if refusal != Refusal::WouldBlock || self.buffer.len() != self.buffer.capacity() {
                    self.violations.push(format!(
                        "add({}) refused with {:?} at len={} capacity={}",
                        value,
                        refusal,
                        self.buffer.len(),
                        self.buffer.capacity()
                    ));
                }
                self.record(0, format!("add({})", value), false);
                return Ok(false);
            }
        }

        if let Some(FaultType::CallerAbandon) = self.maybe_inject_fault(FaultPoint::AfterOperation) {
            // The element is in the buffer; only the caller is gone.
            self.abandoned_operations += 1;
            return Err(FaultType::CallerAbandon);
        }

        Ok(true)
    }

    /// Take with fault injection at the boundaries.
    ///
    /// `Ok(Some(v))` on success, `Ok(None)` if the buffer was empty.
    pub fn take(&mut self) -> Result<Option<u64>, FaultType> {
        if let Some(fault) = self.maybe_inject_fault(FaultPoint::BeforeOperation) {
            if fault == FaultType::Cancellation {
                let before = self.buffer.slot_layout();
                let outcome = self.buffer.take_cancelled();
                self.expect_cancelled("take", outcome.err(), &before);
                self.record(1, "take()".to_string(), false);
                return Err(fault);
            }
        }

        let outcome = self.buffer.take_now();
        self.operations_count += 1;

        let value = match outcome {
            Ok(value) => value,
            Err(refusal) => {
                self.would_block_count += 1;
                if refusal != Refusal::WouldBlock || !self.buffer.is_empty() {
                    self.violations.push(format!(
                        "take() refused with {:?} at len={}",
                        refusal,
                        self.buffer.len()
                    ));
                }
                self.record(1, "take()".to_string(), false);
                return Ok(None);
            }
        };

        let expected = self.produced.get(self.consumed.len()).copied();
        if expected != Some(value) {
            self.violations.push(format!(
                "take() returned {} but oldest element is {:?}",
                value, expected
            ));
        }
        self.consumed.push(value);
        self.record(1, format!("take()={}", value), true);

        if let Some(FaultType::CallerAbandon) = self.maybe_inject_fault(FaultPoint::AfterOperation) {
            // Taken and gone: still counts as consumed.
            self.abandoned_operations += 1;
            return Err(FaultType::CallerAbandon);
        }

        Ok(Some(value))
    }

    /// Peek; never faulted, always checked against the oldest element.
    pub fn peek(&mut self) -> Option<u64> {
        let before = self.buffer.slot_layout();
        let outcome = self.buffer.peek_now();
        self.operations_count += 1;

        if self.buffer.slot_layout() != before {
            self.violations.push("peek() changed the slot layout".to_string());
        }

        let expected = self.produced.get(self.consumed.len()).copied();
        match outcome {
            Ok(value) => {
                if expected != Some(value) {
                    self.violations.push(format!(
                        "peek() returned {} but oldest element is {:?}",
                        value, expected
                    ));
                }
                self.record(1, format!("peek()={}", value), true);
                Some(value)
            }
            Err(refusal) => {
                if refusal != Refusal::WouldBlock || expected.is_some() {
                    self.violations.push(format!(
                        "peek() refused with {:?} while {:?} is buffered",
                        refusal, expected
                    ));
                }
                self.record(1, "peek()".to_string(), false);
                None
            }
        }
    }

    fn expect_cancelled(&mut self, op: &str, refusal: Option<Refusal>, before: &SlotLayout) {
        if refusal != Some(Refusal::Cancelled) {
            self.violations.push(format!(
                "cancelled {} returned {:?} instead of Cancelled",
                op, refusal
            ));
        }
        if &self.buffer.slot_layout() != before {
            self.violations
                .push(format!("cancelled {} changed the slot layout", op));
        }
    }

    fn record(&mut self, role_id: u64, action: String, success: bool) {
        self.actions.push(RoleAction {
            role_id,
            step: self.actions.len() as u64 + 1,
            action,
            success,
        });
    }

    fn maybe_inject_fault(&mut self, point: FaultPoint) -> Option<FaultType> {
        if let Some(delay_us) = self.fault_injector.should_delay() {
            self.clock.advance_us(delay_us);
        }
        if !self.fault_injector.should_fail() {
            return None;
        }
        self.faults_injected += 1;
        let fault = match (point, self.rng.gen_range(0..2_u8)) {
            (FaultPoint::BeforeOperation, 0) => FaultType::Cancellation,
            (FaultPoint::AfterOperation, 0) => FaultType::CallerAbandon,
            _ => FaultType::Delay,
        };
        if fault == FaultType::Delay {
            self.clock.advance_us(self.rng.gen_range(1..=1_000));
        }
        Some(fault)
    }

    /// Run the bounded-buffer property checker plus the runner's own
    /// per-operation findings.
    pub fn check_invariants(&self) -> Vec<PropertyResult> {
        let mut results = BoundedBufferPropertyChecker::new(self).check_all();
        results.push(match self.violations.first() {
            None => PropertyResult::pass("OperationContracts"),
            Some(first) => PropertyResult::fail("OperationContracts", first.clone(), None),
        });
        results
    }

    /// Statistics so far.
    pub fn stats(&self) -> DstStats {
        DstStats {
            seed: self.seed,
            operations_count: self.operations_count,
            faults_injected: self.faults_injected,
            abandoned_operations: self.abandoned_operations,
            would_block_count: self.would_block_count,
            elapsed_us: self.clock.now_us(),
        }
    }
}

impl<B: DstTestableBuffer> BoundedBufferProperties for DstRunner<B> {
    fn produced_elements(&self) -> Vec<u64> {
        self.produced.clone()
    }

    fn consumed_elements(&self) -> Vec<u64> {
        self.consumed.clone()
    }

    fn current_contents(&self) -> Vec<u64> {
        self.buffer.contents()
    }

    fn slot_layout(&self) -> SlotLayout {
        self.buffer.slot_layout()
    }
}

/// Statistics from a DST run.
#[derive(Debug, Clone)]
pub struct DstStats {
    pub seed: u64,
    pub operations_count: u64,
    pub faults_injected: u64,
    pub abandoned_operations: u64,
    pub would_block_count: u64,
    pub elapsed_us: u64,
}

impl DstStats {
    pub fn format(&self) -> String {
        format!(
            "DST_SEED={} ops={} faults={} abandoned={} would_block={} elapsed_us={}",
            self.seed,
            self.operations_count,
            self.faults_injected,
            self.abandoned_operations,
            self.would_block_count,
            self.elapsed_us
        )
    }
}

/// DST operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstOp {
    Add(u64),
    Take,
    Peek,
}

/// DST result.
#[derive(Debug)]
pub struct DstResult {
    pub passed: bool,
    pub properties: Vec<PropertyResult>,
    pub stats: DstStats,
    pub fault_errors: Vec<String>,
}

impl DstResult {
    pub fn format(&self) -> String {
        let status = if self.passed { "PASS" } else { "FAIL" };
        let mut result = format!("[{}] {}", status, self.stats.format());

        for property in self.properties.iter().filter(|p| !p.holds) {
            result.push_str(&format!("\n  VIOLATION: {}", property.format()));
        }

        result
    }
}

/// Run a scripted DST scenario against a fresh buffer.
///
/// Faults are expected and recorded; invariants are checked at the end.
pub fn run_dst_scenario<B: DstTestableBuffer>(
    seed: u64,
    capacity: usize,
    operations: Vec<DstOp>,
) -> DstResult {
    let mut runner: DstRunner<B> = DstRunner::new(seed, capacity);
    let mut fault_errors = Vec::new();

    for op in operations {
        let result = match op {
            DstOp::Add(v) => runner.add(v).map(|_| ()),
            DstOp::Take => runner.take().map(|_| ()),
            DstOp::Peek => {
                runner.peek();
                Ok(())
            }
        };

        if let Err(fault) = result {
            fault_errors.push(format!("{:?}", fault));
        }
    }

    let properties = runner.check_invariants();
    DstResult {
        passed: properties.iter().all(|p| p.holds),
        properties,
        stats: runner.stats(),
        fault_errors,
    }
}
