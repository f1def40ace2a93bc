//! `DstTestableBuffer` adapter for the ring buffer.
//!
//! The DST runner never parks. "Now" forms use a zero timeout, and the
//! cancelled forms pass a token that has already fired.

use std::time::Duration;

use br_core::SlotLayout;
use br_dst::{DstTestableBuffer, Refusal};

use crate::cancel::CancelToken;
use crate::error::WaitError;
use crate::ring::BoundedRingBuffer;

fn refusal(err: WaitError) -> Refusal {
    match err {
        WaitError::TimedOut => Refusal::WouldBlock,
        WaitError::Cancelled => Refusal::Cancelled,
    }
}

fn fired_token() -> CancelToken {
    let token = CancelToken::new();
    token.cancel();
    token
}

impl DstTestableBuffer for BoundedRingBuffer<u64> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    fn with_capacity(capacity: usize) -> Self {
        match BoundedRingBuffer::new(capacity) {
            Ok(buffer) => buffer,
            Err(e) => panic!("DST buffer: {}", e),
        }
    }

    fn add_now(&self, value: u64) -> Result<(), Refusal> {
        self.add_timeout(value, Duration::ZERO)
            .map_err(|e| refusal(e.kind()))
    }

    fn take_now(&self) -> Result<u64, Refusal> {
        self.take_timeout(Duration::ZERO).map_err(refusal)
    }

    fn peek_now(&self) -> Result<u64, Refusal> {
        self.peek_timeout(Duration::ZERO).map_err(refusal)
    }

    fn add_cancelled(&self, value: u64) -> Result<(), Refusal> {
        self.add_cancellable(value, &fired_token())
            .map_err(|e| refusal(e.kind()))
    }

    fn take_cancelled(&self) -> Result<u64, Refusal> {
        self.take_cancellable(&fired_token()).map_err(refusal)
    }

    fn len(&self) -> usize {
        self.size()
    }

    fn capacity(&self) -> usize {
        BoundedRingBuffer::capacity(self)
    }

    fn contents(&self) -> Vec<u64> {
        BoundedRingBuffer::contents(self)
    }

    fn slot_layout(&self) -> SlotLayout {
        BoundedRingBuffer::slot_layout(self)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use br_dst::{run_dst_scenario, DstOp, DstRunner, FaultConfig};

    #[test]
    fn test_now_forms_refuse_at_boundaries() {
        let buf = <BoundedRingBuffer<u64> as DstTestableBuffer>::with_capacity(1);

        assert_eq!(buf.take_now(), Err(Refusal::WouldBlock));
        assert_eq!(buf.peek_now(), Err(Refusal::WouldBlock));
        assert_eq!(buf.add_now(1), Ok(()));
        assert_eq!(buf.add_now(2), Err(Refusal::WouldBlock));
        assert_eq!(buf.add_cancelled(3), Err(Refusal::Cancelled));
        assert_eq!(buf.take_cancelled(), Err(Refusal::Cancelled));
        assert_eq!(buf.take_now(), Ok(1));
    }

    #[test]
    fn test_runner_without_faults() {
        let mut runner: DstRunner<BoundedRingBuffer<u64>> =
            DstRunner::with_fault_config(12345, 3, FaultConfig::none());

        for v in [10, 20, 30] {
            assert_eq!(runner.add(v), Ok(true));
        }
        assert_eq!(runner.add(99), Ok(false));
        assert_eq!(runner.take(), Ok(Some(10)));
        assert_eq!(runner.add(40), Ok(true));
        assert_eq!(runner.peek(), Some(20));
        for v in [20, 30, 40] {
            assert_eq!(runner.take(), Ok(Some(v)));
        }
        assert_eq!(runner.take(), Ok(None));

        let results = runner.check_invariants();
        assert!(results.iter().all(|r| r.holds), "{:?}", results);
    }

    #[test]
    fn test_scenario_with_faults() {
        let ops: Vec<DstOp> = (1..=40)
            .flat_map(|i| [DstOp::Add(i), DstOp::Add(i + 1_000), DstOp::Peek, DstOp::Take])
            .collect();

        let result = run_dst_scenario::<BoundedRingBuffer<u64>>(777, 4, ops);
        assert!(result.passed, "{}", result.format());
    }
}
