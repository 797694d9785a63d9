//! fibrous: composable effects run by cooperative fibers.
//!
//! # Overview
//!
//! An [`Effect<A, E>`] describes a computation that may succeed with an `A`
//! or fail with a [`Cause<E>`]. Effects are plain values: building one runs
//! nothing, and the same value can be run many times. A runtime interprets
//! effects on lightweight fibers that share one host loop and yield to each
//! other cooperatively.
//!
//! # Core Guarantees
//!
//! - **Structured interruption**: interrupting a fiber runs every pending
//!   finalizer, and uninterruptible regions always complete
//! - **No lost failures**: concurrent and sequential failures are kept in
//!   one [`Cause`] tree, never dropped
//! - **Scoped children**: forked fibers are interrupted when their parent's
//!   scope closes, unless forked as daemons
//! - **Fairness**: a fiber yields after a bounded number of instructions
//! - **Deterministic testing**: the [`lab`] runtime uses virtual time and a
//!   seed-driven schedule
//!
//! # Module Structure
//!
//! - [`types`]: fiber ids, time, [`Cause`], [`Exit`], [`Defect`]
//! - [`effect`]: the [`Effect`] type, constructors and combinators
//! - [`fiber`]: fiber handles, status and fiber-local references
//! - [`scope`]: finalizer scopes that own fibers and resources
//! - [`combinator`]: race, parallel zip, timeout
//! - [`supervision`]: observing fiber lifecycles
//! - [`services`]: the environment, clock and random services
//! - [`runtime`]: the live runtime and its configuration
//! - [`lab`]: deterministic runtime for tests
//! - [`error`]: runtime-level errors
//!
//! # Example
//!
//! ```ignore
//! use fibrous::{Effect, LabConfig, LabRuntime};
//! use std::time::Duration;
//!
//! let slow = Effect::<u32, String>::succeed(1).delay(Duration::from_millis(50));
//! let fast = Effect::<u32, String>::succeed(2).delay(Duration::from_millis(10));
//! let exit = LabRuntime::new(LabConfig::new(7)).block_on(slow.race(fast))?;
//! assert_eq!(exit.success(), Some(&2));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]

pub mod combinator;
pub mod effect;
pub mod error;
pub mod fiber;
pub mod lab;
pub mod runtime;
pub mod scope;
pub mod services;
pub mod supervision;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod tracing_compat;
pub mod types;
pub mod util;

pub use combinator::collect_all_par;
pub use effect::{Callback, Data, Effect, Registration, Value};
pub use error::{ConfigError, Error};
pub use fiber::{Fiber, FiberDescriptor, FiberRef, FiberStatus};
pub use lab::{LabConfig, LabRuntime};
pub use runtime::{Canceler, ExitFuture, Runtime, RuntimeBuilder, RuntimeConfig};
pub use scope::{Ensured, FiberScope, Key, Scope};
pub use services::Env;
pub use supervision::Supervisor;
pub use types::{Cause, Defect, Exit, FiberId, Time};
