//! Probabilistic fault injection driven by a seeded RNG.

use crate::random::DeterministicRng;

/// Fault injection probabilities.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Probability that an operation boundary injects a fault
    pub failure_probability: f64,
    /// Probability that an operation boundary is delayed
    pub delay_probability: f64,
    /// Upper bound for an injected delay, in simulated microseconds
    pub delay_us_max: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            failure_probability: 0.05,
            delay_probability: 0.1,
            delay_us_max: 1_000,
        }
    }
}

impl FaultConfig {
    /// No faults, no delays.
    #[must_use]
    pub fn none() -> Self {
        Self {
            failure_probability: 0.0,
            delay_probability: 0.0,
            delay_us_max: 0,
        }
    }

    /// Frequent faults for stress runs.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            failure_probability: 0.25,
            delay_probability: 0.3,
            delay_us_max: 10_000,
        }
    }
}

/// Counters kept by a `FaultInjector`.
#[derive(Debug, Clone, Default)]
pub struct FaultStats {
    pub checks_count: u64,
    pub faults_count: u64,
    pub delays_count: u64,
}

/// Decides, deterministically, when to inject faults.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    stats: FaultStats,
}

impl FaultInjector {
    #[must_use]
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&config.failure_probability),
            "failure_probability out of range"
        );
        debug_assert!(
            (0.0..=1.0).contains(&config.delay_probability),
            "delay_probability out of range"
        );
        Self {
            rng,
            config,
            stats: FaultStats::default(),
        }
    }

    /// Should the current operation boundary fail?
    pub fn should_fail(&mut self) -> bool {
        self.stats.checks_count += 1;
        let fail = self.config.failure_probability > 0.0
            && self.rng.gen_bool(self.config.failure_probability);
        if fail {
            self.stats.faults_count += 1;
        }
        fail
    }

    /// Delay to inject at this boundary, in microseconds.
    pub fn should_delay(&mut self) -> Option<u64> {
        if self.config.delay_probability <= 0.0 || self.config.delay_us_max == 0 {
            return None;
        }
        if !self.rng.gen_bool(self.config.delay_probability) {
            return None;
        }
        self.stats.delays_count += 1;
        Some(self.rng.gen_range(1..=self.config.delay_us_max))
    }

    #[must_use]
    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> &FaultStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_fails() {
        let mut injector = FaultInjector::new(DeterministicRng::new(1), FaultConfig::none());
        for _ in 0..1000 {
            assert!(!injector.should_fail());
            assert!(injector.should_delay().is_none());
        }
        assert_eq!(injector.stats().faults_count, 0);
        assert_eq!(injector.stats().checks_count, 1000);
    }

    #[test]
    fn test_aggressive_fails_sometimes() {
        let mut injector =
            FaultInjector::new(DeterministicRng::new(1), FaultConfig::aggressive());
        let failures = (0..1000).filter(|_| injector.should_fail()).count();
        assert!(failures > 100 && failures < 400, "failures={}", failures);
    }
}
