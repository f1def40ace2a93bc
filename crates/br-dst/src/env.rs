//! The DST environment: seed, RNG, clock, faults and (optionally) a
//! role scheduler, all derived from one seed.

use std::fmt;

use crate::clock::SimClock;
use crate::fault::{FaultConfig, FaultInjector};
use crate::random::DeterministicRng;
use crate::scheduler::Scheduler;

/// Deterministic simulation environment.
#[derive(Debug)]
pub struct DstEnv {
    seed: u64,
    rng: DeterministicRng,
    clock: SimClock,
    fault: FaultInjector,
    scheduler: Option<Scheduler>,
}

/// Summary of what the environment did during a run.
#[derive(Debug, Clone)]
pub struct EnvStats {
    pub seed: u64,
    pub elapsed_us: u64,
    pub faults_count: u64,
    pub delays_count: u64,
    pub switches_count: u64,
}

impl DstEnv {
    /// Environment with default fault injection.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_fault_config(seed, FaultConfig::default())
    }

    /// Environment with explicit fault configuration.
    #[must_use]
    pub fn with_fault_config(seed: u64, fault_config: FaultConfig) -> Self {
        let mut root = DeterministicRng::new(seed);
        let rng = root.fork();
        let fault = FaultInjector::new(root.fork(), fault_config);
        Self {
            seed,
            rng,
            clock: SimClock::new(),
            fault,
            scheduler: None,
        }
    }

    /// Environment with a role scheduler and the given fault configuration.
    #[must_use]
    pub fn with_scheduler(
        seed: u64,
        roles_count: usize,
        yield_probability: f64,
        fault_config: FaultConfig,
    ) -> Self {
        let mut env = Self::with_fault_config(seed, fault_config);
        let scheduler_rng = DeterministicRng::new(seed.rotate_left(17) ^ 0x9e37_79b9_7f4a_7c15);
        env.scheduler = Some(Scheduler::new(scheduler_rng, roles_count, yield_probability));
        env
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// `DST_SEED=<seed>`, ready to paste into a shell.
    #[must_use]
    pub fn format_seed(&self) -> String {
        format!("DST_SEED={}", self.seed)
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub fn clock(&mut self) -> &mut SimClock {
        &mut self.clock
    }

    pub fn fault(&mut self) -> &mut FaultInjector {
        &mut self.fault
    }

    pub fn scheduler(&mut self) -> Option<&mut Scheduler> {
        self.scheduler.as_mut()
    }

    /// Maybe advance simulated time by an injected delay.
    pub fn maybe_delay(&mut self) -> Option<u64> {
        let delay_us = self.fault.should_delay()?;
        self.clock.advance_us(delay_us);
        Some(delay_us)
    }

    #[must_use]
    pub fn stats(&self) -> EnvStats {
        EnvStats {
            seed: self.seed,
            elapsed_us: self.clock.now_us(),
            faults_count: self.fault.stats().faults_count,
            delays_count: self.fault.stats().delays_count,
            switches_count: self.scheduler.as_ref().map_or(0, Scheduler::switches_count),
        }
    }
}

impl fmt::Display for EnvStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DST_SEED={} elapsed_us={} faults={} delays={} switches={}",
            self.seed, self.elapsed_us, self.faults_count, self.delays_count, self.switches_count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_is_reproducible() {
        let mut a = DstEnv::new(4242);
        let mut b = DstEnv::new(4242);

        for _ in 0..100 {
            assert_eq!(a.rng().gen_range(0..10_u64), b.rng().gen_range(0..10_u64));
            assert_eq!(a.fault().should_fail(), b.fault().should_fail());
            assert_eq!(a.maybe_delay(), b.maybe_delay());
        }
        assert_eq!(a.clock().now_ns(), b.clock().now_ns());
    }

    #[test]
    fn test_format_seed() {
        let env = DstEnv::with_fault_config(17, FaultConfig::none());
        assert_eq!(env.format_seed(), "DST_SEED=17");
        assert!(env.stats().to_string().starts_with("DST_SEED=17"));
    }
}
