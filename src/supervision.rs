//! Fiber lifecycle observation.
//!
//! A [`Supervisor`] is told about every fiber forked while it is installed
//! (see [`Effect::supervised`](crate::Effect::supervised)) and about every
//! such fiber's exit. Supervisors only observe: they cannot veto a fork or
//! alter an exit.
//!
//! # Composition
//!
//! [`and`] runs two supervisors side by side. Neither sees the other, and no
//! order between their callbacks is promised.
//!
//! # Built-in supervisors
//!
//! - [`NoopSupervisor`]: the default; ignores everything
//! - [`Track`]: remembers the fibers it saw start and not yet end
//! - [`TracingSupervisor`]: emits a `debug` event per start and end

use core::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::effect::{Effect, ExitValue, Value};
use crate::fiber::{Fiber, FiberStatus};
use crate::services::Env;
use crate::tracing_compat::debug;
use crate::types::FiberId;

/// A type-erased fiber handle as seen by supervisors.
pub type FiberHandle = Fiber<Value, Value>;

/// Observer of fiber starts and ends.
///
/// Callbacks run on the thread driving the forking (or finishing) fiber.
/// `on_start` runs in the middle of the parent's turn: the handles may be
/// inspected (`id`, `status_now`, `poll_now`) but the parent cannot make
/// progress until the callback returns. `on_end` runs after the child's
/// exit is published, with no fiber lock held. Neither may block.
pub trait Supervisor: Send + Sync + fmt::Debug {
    /// A fiber was forked. `parent` is `None` for a runtime's root fiber.
    fn on_start(
        &self,
        env: &Env,
        effect: &Effect<Value, Value>,
        parent: Option<&FiberHandle>,
        fiber: &FiberHandle,
    );

    /// A fiber finished with `exit`.
    fn on_end(&self, exit: &ExitValue, fiber: &FiberHandle);
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSupervisor;

impl Supervisor for NoopSupervisor {
    fn on_start(&self, _: &Env, _: &Effect<Value, Value>, _: Option<&FiberHandle>, _: &FiberHandle) {}

    fn on_end(&self, _: &ExitValue, _: &FiberHandle) {}
}

/// Both supervisors, independently.
#[derive(Debug, Clone)]
pub struct Both {
    left: Arc<dyn Supervisor>,
    right: Arc<dyn Supervisor>,
}

impl Supervisor for Both {
    fn on_start(
        &self,
        env: &Env,
        effect: &Effect<Value, Value>,
        parent: Option<&FiberHandle>,
        fiber: &FiberHandle,
    ) {
        self.left.on_start(env, effect, parent, fiber);
        self.right.on_start(env, effect, parent, fiber);
    }

    fn on_end(&self, exit: &ExitValue, fiber: &FiberHandle) {
        self.left.on_end(exit, fiber);
        self.right.on_end(exit, fiber);
    }
}

/// Composes two supervisors.
#[must_use]
pub fn and(left: Arc<dyn Supervisor>, right: Arc<dyn Supervisor>) -> Arc<dyn Supervisor> {
    Arc::new(Both { left, right })
}

/// Keeps the set of live fibers it has seen.
#[derive(Debug, Default)]
pub struct Track {
    live: Mutex<Vec<FiberHandle>>,
}

impl Track {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fibers started and not yet finished, in start order.
    #[must_use]
    pub fn live(&self) -> Vec<FiberHandle> {
        self.live.lock().clone()
    }

    /// Ids of [`Track::live`].
    #[must_use]
    pub fn live_ids(&self) -> Vec<FiberId> {
        self.live.lock().iter().map(Fiber::id).collect()
    }

    /// Snapshot of [`Track::live`] as an effect.
    pub fn value(self: &Arc<Self>) -> Effect<Vec<FiberHandle>> {
        let this = Arc::clone(self);
        Effect::total(move || this.live())
    }
}

impl Supervisor for Track {
    fn on_start(&self, _: &Env, _: &Effect<Value, Value>, _: Option<&FiberHandle>, fiber: &FiberHandle) {
        self.live.lock().push(fiber.clone());
    }

    fn on_end(&self, _: &ExitValue, fiber: &FiberHandle) {
        let id = fiber.id();
        self.live.lock().retain(|f| f.id() != id);
    }
}

/// Logs fiber lifecycle events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSupervisor;

impl Supervisor for TracingSupervisor {
    fn on_start(
        &self,
        _: &Env,
        effect: &Effect<Value, Value>,
        parent: Option<&FiberHandle>,
        fiber: &FiberHandle,
    ) {
        let parent = parent.map_or(FiberId::NONE, Fiber::id);
        debug!(fiber = %fiber.id(), parent = %parent, effect = ?effect, "fiber started");
    }

    fn on_end(&self, exit: &ExitValue, fiber: &FiberHandle) {
        let status = fiber.status_now();
        debug!(
            fiber = %fiber.id(),
            success = exit.is_success(),
            interrupted = exit.is_interrupted(),
            done = matches!(status, FiberStatus::Done),
            "fiber ended"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabConfig, LabRuntime};
    use crate::test_utils::init_test_logging;
    use crate::types::Exit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counting {
        started: AtomicUsize,
        ended: AtomicUsize,
    }

    impl Supervisor for Counting {
        fn on_start(&self, _: &Env, _: &Effect<Value, Value>, _: Option<&FiberHandle>, _: &FiberHandle) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_end(&self, _: &ExitValue, _: &FiberHandle) {
            self.ended.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn supervised_region_sees_forks() {
        init_test_logging();
        crate::test_phase!("supervised_region_sees_forks");
        let counting = Arc::new(Counting::default());
        let sup: Arc<dyn Supervisor> = counting.clone();
        let child = Effect::<i32>::succeed(1);
        let body = child
            .clone()
            .fork()
            .flat_map(|f| f.join())
            .zip(child.fork().flat_map(|f| f.join()))
            .supervised(sup);
        let outside = Effect::<i32>::succeed(3).fork().flat_map(|f| f.join());
        let exit = LabRuntime::new(LabConfig::new(1))
            .block_on(body.zip(outside))
            .unwrap();
        assert_eq!(exit, Exit::succeed(((1, 1), 3)));
        assert_eq!(counting.started.load(Ordering::SeqCst), 2);
        assert_eq!(counting.ended.load(Ordering::SeqCst), 2);
        crate::test_complete!("supervised_region_sees_forks");
    }

    #[test]
    fn track_forgets_finished_fibers() {
        init_test_logging();
        let track = Track::new();
        let both = and(track.clone(), Arc::new(TracingSupervisor));
        let t = Arc::clone(&track);
        let body = Effect::<()>::never()
            .fork()
            .zip(Effect::<()>::unit().fork())
            .flat_map(move |(blocked, quick)| {
                let t = Arc::clone(&t);
                quick.join().zip_right(Effect::yield_now()).flat_map(move |()| {
                    let ids = t.live_ids();
                    blocked.interrupt().as_value(ids)
                })
            })
            .supervised(both);
        let exit = LabRuntime::new(LabConfig::new(2)).block_on(body).unwrap();
        let ids = exit.unwrap();
        assert_eq!(ids.len(), 1);
        assert!(track.live().is_empty());
    }

    #[derive(Debug, Default)]
    struct Inspecting {
        seen: Mutex<Vec<(bool, bool)>>,
    }

    impl Supervisor for Inspecting {
        fn on_start(&self, _: &Env, _: &Effect<Value, Value>, parent: Option<&FiberHandle>, fiber: &FiberHandle) {
            let parent_running = parent.is_some_and(|p| p.poll_now().is_none());
            let _ = fiber.status_now();
            self.seen.lock().push((parent_running, fiber.poll_now().is_none()));
        }

        fn on_end(&self, _: &ExitValue, fiber: &FiberHandle) {
            let _ = fiber.status_now();
        }
    }

    #[test]
    fn on_start_may_inspect_both_handles() {
        init_test_logging();
        let inspecting = Arc::new(Inspecting::default());
        let sup: Arc<dyn Supervisor> = inspecting.clone();
        let body = Effect::<u8>::succeed(4).fork().flat_map(|f| f.join()).supervised(sup);
        let exit = LabRuntime::new(LabConfig::new(3)).block_on(body).unwrap();
        assert_eq!(exit, Exit::succeed(4));
        assert_eq!(*inspecting.seen.lock(), vec![(true, true)]);
    }
}
