//! Random numbers.

use core::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::effect::Effect;
use crate::util::DetRng;

/// A random number source.
pub trait Random: Send + Sync + fmt::Debug {
    /// A uniformly distributed `u64`.
    fn next_u64(&self) -> u64;

    /// A float in `[0, 1)`.
    fn next_f64(&self) -> f64;

    /// An integer in `[low, high)`.
    fn next_in_range(&self, low: u64, high: u64) -> u64;
}

/// [`Random`] backed by a seeded [`DetRng`].
pub struct DetRandom {
    rng: Mutex<DetRng>,
}

impl DetRandom {
    /// Creates a source seeded with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(DetRng::new(seed)),
        }
    }
}

impl fmt::Debug for DetRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetRandom").finish_non_exhaustive()
    }
}

impl Random for DetRandom {
    fn next_u64(&self) -> u64 {
        self.rng.lock().next_u64()
    }

    fn next_f64(&self) -> f64 {
        self.rng.lock().next_f64()
    }

    fn next_in_range(&self, low: u64, high: u64) -> u64 {
        self.rng.lock().next_in_range(low, high)
    }
}

/// The environment's random source.
pub fn random() -> Effect<Arc<dyn Random>> {
    Effect::service()
}

/// A random `u64`.
pub fn next_u64() -> Effect<u64> {
    random().map(|r| r.next_u64())
}

/// A random float in `[0, 1)`.
pub fn next_f64() -> Effect<f64> {
    random().map(|r| r.next_f64())
}

/// A random integer in `[low, high)`.
pub fn next_in_range(low: u64, high: u64) -> Effect<u64> {
    random().map(move |r| r.next_in_range(low, high))
}
