//! Lab runtime for deterministic execution.
//!
//! The lab runtime executes fibers with:
//! - Virtual time that jumps to the next timer once nothing is runnable
//! - Deterministic dispatch order (FIFO, or shuffled from the seed)
//! - The loop driven by the calling thread, one turn per step

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::config::LabConfig;
use crate::effect::value::exit_from_value;
use crate::effect::{Data, Effect, ExitValue};
use crate::error::Error;
use crate::fiber::Fiber;
use crate::runtime::driver::{Driver, Turn};
use crate::runtime::executor::FiberContext;
use crate::runtime::{Platform, Scheduler};
use crate::services::{default_env, Clock, Env};
use crate::supervision::{NoopSupervisor, Supervisor};
use crate::tracing_compat::trace;
use crate::types::{Exit, Time};

/// The deterministic lab runtime.
///
/// Same seed, same effect, same outcome: every run interleaves fibers
/// identically and sees identical timestamps.
#[derive(Debug)]
pub struct LabRuntime {
    config: LabConfig,
    driver: Arc<Driver>,
    platform: Arc<Platform>,
    env: Env,
    steps: AtomicU64,
}

impl LabRuntime {
    /// Creates a new lab runtime with the given configuration.
    #[must_use]
    pub fn new(config: LabConfig) -> Self {
        Self::with_supervisor(config, Arc::new(NoopSupervisor))
    }

    /// Creates a lab runtime with the default configuration.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::new(LabConfig::new(seed))
    }

    /// Creates a lab runtime whose root fibers are supervised by
    /// `supervisor`.
    #[must_use]
    pub fn with_supervisor(config: LabConfig, supervisor: Arc<dyn Supervisor>) -> Self {
        let shuffle = config.shuffle.then(|| config.rng());
        let driver = Arc::new(Driver::virtual_time(shuffle));
        let clock: Arc<dyn Clock> = Arc::clone(&driver) as Arc<dyn Clock>;
        let scheduler: Arc<dyn Scheduler> = Arc::clone(&driver) as Arc<dyn Scheduler>;
        let platform = Arc::new(Platform {
            scheduler,
            clock: Arc::clone(&clock),
            max_ops: config.max_ops.max(1),
            report_failures: config.report_failures,
            supervisor,
        });
        let env = default_env(clock, config.seed);
        Self {
            config,
            driver,
            platform,
            env,
            steps: AtomicU64::new(0),
        }
    }

    /// Returns a reference to the configuration.
    #[must_use]
    pub const fn config(&self) -> &LabConfig {
        &self.config
    }

    /// The root environment every fiber starts with.
    #[must_use]
    pub const fn environment(&self) -> &Env {
        &self.env
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.driver.now()
    }

    /// Returns the number of steps executed.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    /// Total number of tasks fibers have dispatched to the loop.
    #[must_use]
    pub fn dispatch_count(&self) -> u64 {
        self.driver.dispatch_count()
    }

    /// Tasks waiting to run right now.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.driver.ready_len()
    }

    /// Timers not yet fired.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.driver.timer_len()
    }

    /// Advances virtual time. Timers that become due fire on the next step.
    pub fn advance(&self, by: Duration) {
        self.driver.advance(by);
    }

    /// Starts `effect` on a new root fiber without running anything yet.
    pub fn spawn<A: Data, E: Data>(&self, effect: Effect<A, E>) -> Fiber<A, E> {
        let context = FiberContext::spawn_root(
            &self.platform,
            self.env.clone(),
            effect.erase(),
            Box::new(|_: &ExitValue| {}),
        );
        Fiber::from_context(context)
    }

    /// Runs `effect` on a new root fiber until it exits.
    ///
    /// Fibers it leaves behind keep their queued work for later calls.
    pub fn block_on<A: Data, E: Data>(&self, effect: Effect<A, E>) -> Result<Exit<A, E>, Error> {
        let slot: Arc<Mutex<Option<ExitValue>>> = Arc::new(Mutex::new(None));
        let writer = Arc::clone(&slot);
        FiberContext::spawn_root(
            &self.platform,
            self.env.clone(),
            effect.erase(),
            Box::new(move |exit: &ExitValue| *writer.lock() = Some(exit.clone())),
        );
        loop {
            if let Some(exit) = slot.lock().take() {
                return Ok(exit_from_value(exit));
            }
            if !self.step()? {
                return Err(Error::Stalled {
                    at: self.now(),
                    steps: self.steps(),
                });
            }
        }
    }

    /// Runs until nothing is runnable and no timer is pending. Returns the
    /// number of steps taken.
    pub fn run_until_quiescent(&self) -> Result<u64, Error> {
        let start = self.steps();
        while self.step()? {}
        Ok(self.steps() - start)
    }

    /// One turn of the loop, jumping virtual time forward when only timers
    /// remain. Returns false once there is nothing left to do.
    fn step(&self) -> Result<bool, Error> {
        if let Some(limit) = self.config.max_steps {
            if self.steps() >= limit {
                return Err(Error::StepLimit { limit });
            }
        }
        match self.driver.turn() {
            Turn::Ran => {
                self.steps.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Turn::Idle(Some(deadline)) => {
                trace!(%deadline, "lab advancing virtual time");
                Ok(self.driver.advance_to_next_timer())
            }
            Turn::Idle(None) => Ok(false),
            Turn::Shutdown => Err(Error::Shutdown),
        }
    }
}

impl Drop for LabRuntime {
    fn drop(&mut self) {
        self.driver.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::now;
    use crate::test_utils::init_test_logging;

    #[test]
    fn advance_time() {
        init_test_logging();
        let runtime = LabRuntime::with_seed(42);
        assert_eq!(runtime.now(), Time::ZERO);
        runtime.advance(Duration::from_millis(1));
        assert_eq!(runtime.now(), Time::from_millis(1));
    }

    #[test]
    fn virtual_time_jumps_to_timers() {
        init_test_logging();
        crate::test_phase!("virtual_time_jumps_to_timers");
        let runtime = LabRuntime::with_seed(42);
        let effect = Effect::<()>::sleep(Duration::from_secs(3600)).zip_right(now());
        let started = std::time::Instant::now();
        let exit = runtime.block_on(effect).unwrap();
        assert_eq!(exit, Exit::succeed(Time::from_secs(3600)));
        assert!(started.elapsed() < Duration::from_secs(60));
        crate::test_complete!("virtual_time_jumps_to_timers");
    }

    #[test]
    fn never_stalls() {
        init_test_logging();
        let runtime = LabRuntime::with_seed(42);
        let err = runtime.block_on(Effect::<u8>::never()).unwrap_err();
        assert!(matches!(err, Error::Stalled { .. }), "{err:?}");
    }

    #[test]
    fn step_limit_stops_runaway_loops() {
        init_test_logging();
        let runtime = LabRuntime::new(LabConfig::new(1).max_steps(100).max_ops(4));
        let spin = Effect::<()>::unit().forever::<()>();
        let err = runtime.block_on(spin).unwrap_err();
        assert_eq!(err, Error::StepLimit { limit: 100 });
    }

    #[test]
    fn spawned_fibers_run_when_stepped() {
        init_test_logging();
        let runtime = LabRuntime::with_seed(42);
        let fiber = runtime.spawn(Effect::<u8, String>::succeed(3).delay(Duration::from_millis(7)));
        assert_eq!(fiber.poll_now(), None);
        let steps = runtime.run_until_quiescent().unwrap();
        assert!(steps > 0);
        assert_eq!(fiber.poll_now(), Some(Exit::succeed(3)));
        assert_eq!(runtime.now(), Time::from_millis(7));
        assert_eq!(runtime.pending_tasks(), 0);
        assert_eq!(runtime.pending_timers(), 0);
    }

    #[test]
    fn same_seed_same_schedule() {
        init_test_logging();
        let run = |seed| {
            let runtime = LabRuntime::new(LabConfig::new(seed).shuffle(true));
            let log = Arc::new(Mutex::new(Vec::new()));
            let effects = (0..6).map(|i| {
                let log = Arc::clone(&log);
                Effect::yield_now()
                    .widen::<String>()
                    .zip_right(Effect::total(move || log.lock().push(i)))
            });
            runtime
                .block_on(crate::combinator::collect_all_par(effects))
                .unwrap();
            let out = log.lock().clone();
            out
        };
        assert_eq!(run(9), run(9));
    }
}
