//! Property tests against a `VecDeque` model.
//!
//! Every operation uses a zero timeout, so a sequence that would block on
//! the real buffer shows up as `TimedOut` and must match the model being
//! full or empty at that point.

#![cfg(not(loom))]

use std::collections::VecDeque;
use std::time::Duration;

use br_buffer::{AddError, BoundedRingBuffer, WaitError};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add(u64),
    Take,
    Peek,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u64>().prop_map(Op::Add),
        2 => Just(Op::Take),
        1 => Just(Op::Peek),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_matches_bounded_model(
        capacity in 1usize..12,
        ops in prop::collection::vec(op(), 1..300)
    ) {
        let buffer = BoundedRingBuffer::new(capacity).unwrap();
        let mut model: VecDeque<u64> = VecDeque::with_capacity(capacity);

        for op in ops {
            match op {
                Op::Add(v) => match buffer.add_timeout(v, Duration::ZERO) {
                    Ok(()) => {
                        prop_assert!(model.len() < capacity, "add succeeded while full");
                        model.push_back(v);
                    }
                    Err(AddError::TimedOut(back)) => {
                        prop_assert_eq!(model.len(), capacity, "add refused while not full");
                        prop_assert_eq!(back, v);
                    }
                    Err(AddError::Cancelled(_)) => {
                        prop_assert!(false, "no token was given");
                    }
                },
                Op::Take => {
                    let got = buffer.take_timeout(Duration::ZERO);
                    prop_assert_eq!(got.ok(), model.pop_front());
                }
                Op::Peek => match buffer.peek_timeout(Duration::ZERO) {
                    Ok(v) => {
                        prop_assert_eq!(Some(&v), model.front());
                    }
                    Err(e) => {
                        prop_assert_eq!(e, WaitError::TimedOut);
                        prop_assert!(model.is_empty());
                    }
                },
            }

            prop_assert_eq!(buffer.size(), model.len());
            prop_assert_eq!(buffer.is_full(), model.len() == capacity);
            prop_assert_eq!(buffer.contents(), model.iter().copied().collect::<Vec<_>>());
            prop_assert!(buffer.slot_layout().issues().is_empty());
        }
    }

    #[test]
    fn prop_fill_drain_preserves_order(
        capacity in 1usize..16,
        values in prop::collection::vec(any::<u64>(), 1..100)
    ) {
        let buffer = BoundedRingBuffer::new(capacity).unwrap();
        let mut taken = Vec::with_capacity(values.len());

        for chunk in values.chunks(capacity) {
            for &v in chunk {
                buffer.add(v);
            }
            while !buffer.is_empty() {
                taken.push(buffer.take());
            }
        }

        prop_assert_eq!(taken, values);
        prop_assert!(buffer.slot_layout().issues().is_empty());
    }
}
