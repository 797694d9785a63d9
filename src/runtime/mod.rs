//! Running effects.
//!
//! - [`scheduler`]: the [`Scheduler`] seam fibers dispatch work through
//! - `executor`: the fiber run loop
//! - `driver`: ready queue, timer heap and time source behind both runtimes
//! - `timer`: deadline heap with cancellation
//! - [`config`], [`env_config`], [`builder`]: configuring and starting the
//!   live [`Runtime`]
//!
//! The deterministic counterpart lives in [`crate::lab`].
//!
//! # Quick Start
//!
//! ```ignore
//! use fibrous::runtime::RuntimeBuilder;
//!
//! let runtime = RuntimeBuilder::new()
//!     .with_env_overrides()?
//!     .build()?;
//! let exit = runtime.block_on(effect)?;
//! ```
//!
//! # Scheduling Model
//!
//! Each runtime has a single host loop. A fiber runs until it suspends,
//! finishes, or uses up `max_ops` instructions, then hands the rest of its
//! work back to the loop with [`Scheduler::dispatch_later`]. Fibers are
//! concurrent, never parallel.

pub mod builder;
pub mod config;
pub(crate) mod driver;
pub mod env_config;
pub(crate) mod executor;
pub(crate) mod platform;
pub mod scheduler;
pub(crate) mod timer;

pub use builder::{Canceler, ExitFuture, Runtime, RuntimeBuilder};
pub use config::RuntimeConfig;
pub use env_config::apply_env_overrides;
pub(crate) use platform::Platform;
pub use scheduler::{Scheduler, Task};
