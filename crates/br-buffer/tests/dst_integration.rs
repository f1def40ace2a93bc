//! DST integration tests for the ring buffer.
//!
//! Runs `BoundedRingBuffer` through the DST runner and the producer/consumer
//! harness with fault injection, and checks the bounded-buffer invariants
//! from br-core.
//!
//! ```bash
//! DST_SEED=12345 DST_ITERATIONS=100 cargo test -p br-buffer --test dst_integration
//! ```

#![cfg(not(loom))]

use std::thread;

use br_buffer::{BoundedRingBuffer, CancelToken};
use br_core::Counterexample;
use br_dst::{
    get_or_generate_seed, iterations_or, run_dst_scenario, DstHarness, DstOp, DstRunner,
    FaultConfig, HarnessConfig,
};

type Runner = DstRunner<BoundedRingBuffer<u64>>;

fn assert_runner_holds(runner: &Runner) {
    let failed: Vec<_> = runner
        .check_invariants()
        .into_iter()
        .filter(|r| !r.holds)
        .collect();
    if failed.is_empty() {
        return;
    }

    let report: Vec<_> = failed.iter().map(|r| r.format()).collect();
    let mut ce =
        Counterexample::with_seed(runner.seed().max(1)).with_description(report.join("; "));
    for action in runner.actions() {
        ce.add_action(action.clone());
    }
    panic!("{}", ce.render_diagram());
}

#[test]
fn test_random_ops_with_faults() {
    let seed = get_or_generate_seed();
    let iterations = iterations_or(20);

    for iteration in 0..iterations {
        let run_seed = seed.wrapping_add(iteration).max(1);
        let capacity = 1 + (run_seed % 8) as usize;
        let mut runner: Runner = DstRunner::new(run_seed, capacity);

        let mut next = 0u64;
        let mut choice = run_seed;
        for _ in 0..300 {
            choice = choice.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            match (choice >> 33) % 5 {
                0 | 1 => {
                    next += 1;
                    let _ = runner.add(next);
                }
                2 | 3 => {
                    let _ = runner.take();
                }
                _ => {
                    runner.peek();
                }
            }
        }

        assert_runner_holds(&runner);
        assert!(runner.buffer().size() <= capacity);
    }
}

#[test]
fn test_aggressive_faults_preserve_layout() {
    let seed = get_or_generate_seed();
    let mut runner: Runner = DstRunner::with_fault_config(seed, 3, FaultConfig::aggressive());

    for i in 1..=200 {
        let _ = runner.add(i);
        if i % 3 == 0 {
            let _ = runner.take();
        }
    }
    while runner.buffer().size() > 0 {
        let _ = runner.take();
    }

    assert_runner_holds(&runner);
    assert!(runner.stats().faults_injected > 0, "{}", runner.stats().format());
}

#[test]
fn test_scripted_scenario() {
    let ops = vec![
        DstOp::Add(10),
        DstOp::Add(20),
        DstOp::Add(30),
        DstOp::Take,
        DstOp::Add(40),
        DstOp::Peek,
        DstOp::Take,
        DstOp::Take,
        DstOp::Take,
        DstOp::Take,
    ];

    let result = run_dst_scenario::<BoundedRingBuffer<u64>>(12345, 3, ops);
    assert!(result.passed, "{}", result.format());
}

#[test]
fn test_harness_interleaves_producers_and_consumers() {
    let seed = get_or_generate_seed().max(1);
    let iterations = iterations_or(10);

    for iteration in 0..iterations {
        let run_seed = seed.wrapping_add(iteration).max(1);
        let config = HarnessConfig {
            producers_count: 2,
            consumers_count: 2,
            capacity: 1 + (run_seed % 4) as usize,
            ..HarnessConfig::default()
        };
        let mut harness: DstHarness<BoundedRingBuffer<u64>> = DstHarness::new(run_seed, config);

        let result = harness.run();

        assert!(result.all_invariants_held, "{}", result.format());
        assert!(result.taken_count <= result.added_count);
        assert!(harness.runner().buffer().slot_layout().issues().is_empty());
    }
}

#[test]
fn test_harness_stress_preset() {
    let seed = get_or_generate_seed().max(1);
    let config = HarnessConfig {
        steps_per_role: 500,
        ..HarnessConfig::stress()
    };
    let mut harness: DstHarness<BoundedRingBuffer<u64>> = DstHarness::new(seed, config);

    let result = harness.run();

    assert!(result.all_invariants_held, "{}", result.format());
    assert!(result.parks_count > 0, "{}", result.format());
}

#[test]
fn test_threads_with_cancellation() {
    const PRODUCERS: u64 = 4;
    const PER_PRODUCER: u64 = 500;

    let buffer: BoundedRingBuffer<u64> = BoundedRingBuffer::new(4).unwrap();
    let token = CancelToken::new();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    buffer.add(p * PER_PRODUCER + i);
                }
            })
        })
        .collect();

    let consumer = {
        let buffer = buffer.clone();
        let token = token.clone();
        thread::spawn(move || {
            let mut taken = Vec::new();
            while let Ok(v) = buffer.take_cancellable(&token) {
                taken.push(v);
            }
            taken
        })
    };

    for producer in producers {
        producer.join().unwrap();
    }
    while !buffer.is_empty() {
        thread::yield_now();
    }
    token.cancel();

    let mut taken = consumer.join().unwrap();
    assert_eq!(taken.len() as u64, PRODUCERS * PER_PRODUCER);

    // Per-producer order is preserved.
    for p in 0..PRODUCERS {
        let mine: Vec<_> = taken
            .iter()
            .copied()
            .filter(|v| v / PER_PRODUCER == p)
            .collect();
        assert!(mine.windows(2).all(|w| w[0] < w[1]), "producer {} reordered", p);
    }

    taken.sort_unstable();
    taken.dedup();
    assert_eq!(taken.len() as u64, PRODUCERS * PER_PRODUCER);
    assert!(buffer.slot_layout().issues().is_empty());
}
