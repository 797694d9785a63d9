//! Time and sleeping.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::effect::{Data, Effect, Registration};
use crate::runtime::Task;
use crate::types::Time;

/// Identifies a scheduled timer so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerKey(pub(crate) u64);

/// A source of time that can run callbacks at a deadline.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current time.
    fn now(&self) -> Time;

    /// Runs `callback` once `delay` has elapsed. The callback runs on the
    /// host loop and must only hand work off (e.g. resume a fiber).
    fn schedule(&self, delay: Duration, callback: Task) -> TimerKey;

    /// Cancels a pending timer. Returns false if it already fired or was
    /// cancelled.
    fn cancel(&self, key: TimerKey) -> bool;
}

/// The environment's clock.
pub fn clock() -> Effect<Arc<dyn Clock>> {
    Effect::service()
}

/// The current time according to the environment's clock.
pub fn now() -> Effect<Time> {
    clock().map(|c| c.now())
}

impl Effect<()> {
    /// Suspends the fiber for `duration`. Interrupting the sleep cancels the
    /// timer.
    pub fn sleep(duration: Duration) -> Self {
        clock().flat_map(move |clock| {
            Self::async_interrupt(
                move |cb| {
                    let key = clock.schedule(duration, Box::new(move || cb.succeed(())));
                    let clock = Arc::clone(&clock);
                    Registration::Pending(Effect::total(move || {
                        clock.cancel(key);
                    }))
                },
                Vec::new(),
            )
        })
    }
}

impl<A: Data, E: Data> Effect<A, E> {
    /// Runs this effect after `duration`.
    pub fn delay(self, duration: Duration) -> Self {
        Effect::sleep(duration).widen().zip_right(self)
    }
}
