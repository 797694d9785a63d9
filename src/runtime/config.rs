//! Runtime configuration.
//!
//! Prefer [`RuntimeBuilder`](super::builder::RuntimeBuilder) over filling in
//! a [`RuntimeConfig`] by hand: the builder validates.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `max_ops` | 2048 |
//! | `report_failures` | true |
//! | `thread_name` | `"fibrous-host"` |
//! | `seed` | `0x5EED` |
//! | `supervisor` | [`NoopSupervisor`] |

use std::sync::Arc;

use crate::error::ConfigError;
use crate::supervision::{NoopSupervisor, Supervisor};

/// Instructions a fiber runs before yielding, unless configured.
pub const DEFAULT_MAX_OPS: usize = 2048;

/// Name of the host thread, unless configured.
pub const DEFAULT_THREAD_NAME: &str = "fibrous-host";

/// Seed of the default `Random` service, unless configured.
pub const DEFAULT_SEED: u64 = 0x5EED;

/// Live runtime configuration.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Instructions a fiber may run in one turn before it yields.
    pub max_ops: usize,
    /// Log fibers that end with a defect.
    pub report_failures: bool,
    /// Name of the host thread.
    pub thread_name: String,
    /// Seed of the default `Random` service.
    pub seed: u64,
    /// Supervisor installed on every root fiber.
    pub supervisor: Arc<dyn Supervisor>,
}

impl RuntimeConfig {
    /// Checks the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ops == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_ops",
                reason: "must be at least 1",
            });
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "thread_name",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_ops: DEFAULT_MAX_OPS,
            report_failures: true,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            seed: DEFAULT_SEED,
            supervisor: Arc::new(NoopSupervisor),
        }
    }
}
