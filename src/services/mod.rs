//! Services threaded through the environment.
//!
//! Every runtime seeds the root environment with a [`Clock`] and a
//! [`Random`] source, stored as `Arc<dyn Clock>` and `Arc<dyn Random>`.
//! Either can be replaced for a region with
//! [`Effect::provide_service`](crate::Effect::provide_service).

pub mod clock;
pub mod env;
pub mod random;

use std::sync::Arc;

pub use clock::{clock, now, Clock, TimerKey};
pub use env::Env;
pub use random::{next_f64, next_in_range, next_u64, random, DetRandom, Random};

/// The root environment of a runtime: `clock` plus a [`DetRandom`] seeded
/// with `seed`.
pub(crate) fn default_env(clock: Arc<dyn Clock>, seed: u64) -> Env {
    let random: Arc<dyn Random> = Arc::new(DetRandom::new(seed));
    Env::empty().with(clock).with(random)
}
