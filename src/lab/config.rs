//! Configuration for the lab runtime.
//!
//! The lab configuration controls deterministic execution:
//! - Seed for the `Random` service and for shuffled dispatch
//! - Step budget guarding runaway tests
//! - Per-turn instruction budget of fibers

use crate::runtime::config::DEFAULT_MAX_OPS;
use crate::util::DetRng;

/// Configuration for the lab runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabConfig {
    /// Seed for the `Random` service and dispatch shuffling.
    pub seed: u64,
    /// Maximum number of loop turns before `block_on` gives up.
    pub max_steps: Option<u64>,
    /// Instructions a fiber may run in one turn before it yields.
    pub max_ops: usize,
    /// Pick the next ready task at random instead of first-in first-out.
    pub shuffle: bool,
    /// Log fibers that end with a defect.
    pub report_failures: bool,
}

impl LabConfig {
    /// Creates a new lab configuration with the given seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            max_steps: Some(1_000_000),
            max_ops: DEFAULT_MAX_OPS,
            shuffle: false,
            report_failures: true,
        }
    }

    /// Sets the maximum number of steps.
    #[must_use]
    pub const fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Disables the step limit.
    #[must_use]
    pub const fn no_step_limit(mut self) -> Self {
        self.max_steps = None;
        self
    }

    /// Sets the per-turn instruction budget. Zero is treated as one.
    #[must_use]
    pub const fn max_ops(mut self, ops: usize) -> Self {
        self.max_ops = if ops == 0 { 1 } else { ops };
        self
    }

    /// Enables seed-driven shuffling of ready tasks.
    #[must_use]
    pub const fn shuffle(mut self, value: bool) -> Self {
        self.shuffle = value;
        self
    }

    /// Sets whether fibers ending with a defect are logged.
    #[must_use]
    pub const fn report_failures(mut self, value: bool) -> Self {
        self.report_failures = value;
        self
    }

    /// Creates a deterministic RNG from this configuration.
    #[must_use]
    pub fn rng(&self) -> DetRng {
        DetRng::new(self.seed)
    }
}

impl Default for LabConfig {
    fn default() -> Self {
        Self::new(42)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LabConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.max_ops, 2048);
        assert!(!config.shuffle);
        assert!(config.max_steps.is_some());
    }

    #[test]
    fn setters_chain() {
        let config = LabConfig::new(1).max_ops(0).shuffle(true).no_step_limit();
        assert_eq!(config.max_ops, 1);
        assert!(config.shuffle);
        assert_eq!(config.max_steps, None);
    }

    #[test]
    fn rng_is_deterministic() {
        let config = LabConfig::new(12345);
        let mut rng1 = config.rng();
        let mut rng2 = config.rng();
        assert_eq!(rng1.next_u64(), rng2.next_u64());
    }
}
