//! Errors reported by the runtimes themselves.
//!
//! An effect's own failures never show up here: they are part of its
//! [`Exit`](crate::Exit) as a [`Cause`](crate::Cause). [`Error`] is what a
//! runtime returns when it cannot produce an exit at all, or refuses to be
//! built.
//!
//! | Variant | Raised by |
//! |---|---|
//! | [`Error::Stalled`] | lab `block_on` with no runnable work and no timers |
//! | [`Error::StepLimit`] | lab `block_on` past `LabConfig::max_steps` |
//! | [`Error::Shutdown`] | live `block_on` after the host loop stopped |
//! | [`Error::Spawn`] | `RuntimeBuilder::build` when the OS refuses a thread |
//! | [`Error::Config`] | `RuntimeBuilder::build` with invalid settings |

use crate::types::Time;

/// A runtime-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The loop ran out of work before the root fiber finished.
    #[error("runtime stalled at {at} after {steps} steps: root fiber can never finish")]
    Stalled {
        /// Virtual time when the loop went quiet.
        at: Time,
        /// Turns taken so far.
        steps: u64,
    },

    /// The lab step budget ran out.
    #[error("step limit of {limit} exceeded")]
    StepLimit {
        /// The configured budget.
        limit: u64,
    },

    /// The host loop stopped before the fiber finished.
    #[error("runtime shut down")]
    Shutdown,

    /// The host thread could not be started.
    #[error("failed to spawn host thread: {reason}")]
    Spawn {
        /// The OS error.
        reason: String,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Invalid runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An override variable holds something that does not parse.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// What the variable should hold.
        expected: &'static str,
        /// What it held.
        value: String,
    },

    /// A builder setting is out of range.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Setting name.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}
