//! The live runtime and its builder.
//!
//! A [`Runtime`] owns one host thread that drives the cooperative loop on
//! the monotonic clock. Fibers never run on the caller's thread; the entry
//! points below only hand an effect to the loop and report its exit back
//! through a callback, a [`Canceler`], an [`ExitFuture`], or by blocking.
//!
//! ```rust,ignore
//! use fibrous::{Effect, Exit, RuntimeBuilder};
//!
//! let runtime = RuntimeBuilder::new().max_ops(512).build()?;
//! let exit = runtime.block_on(Effect::<u32, String>::succeed(2).map(|n| n * 21))?;
//! assert_eq!(exit, Exit::succeed(42));
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::config::RuntimeConfig;
use super::driver::{Driver, Turn};
use super::env_config::apply_env_overrides;
use super::executor::FiberContext;
use super::platform::Platform;
use super::Scheduler;
use crate::effect::value::exit_from_value;
use crate::effect::{Data, Effect, ExitValue};
use crate::error::Error;
use crate::fiber::Fiber;
use crate::services::{default_env, Clock, Env};
use crate::supervision::{FiberHandle, Supervisor};
use crate::tracing_compat::{debug, trace};
use crate::types::{Exit, FiberId, Time};

/// How often a blocked [`Runtime::block_on`] rechecks for shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Builder for a [`Runtime`].
#[derive(Clone, Debug, Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
}

impl RuntimeBuilder {
    /// A builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions a fiber may run per turn before yielding.
    #[must_use]
    pub fn max_ops(mut self, n: usize) -> Self {
        self.config.max_ops = n;
        self
    }

    /// Log fibers that end with a defect.
    #[must_use]
    pub fn report_failures(mut self, enabled: bool) -> Self {
        self.config.report_failures = enabled;
        self
    }

    /// Name of the host thread.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Seed of the default `Random` service.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Supervisor installed on every root fiber.
    #[must_use]
    pub fn supervisor(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.config.supervisor = supervisor;
        self
    }

    /// Applies `FIBROUS_*` environment variables on top of what was set so
    /// far.
    pub fn with_env_overrides(mut self) -> Result<Self, Error> {
        apply_env_overrides(&mut self.config)?;
        Ok(self)
    }

    /// The configuration built so far.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Starts the host thread.
    pub fn build(self) -> Result<Runtime, Error> {
        Runtime::with_config(self.config)
    }
}

/// A live runtime driving fibers on its own host thread.
///
/// Dropping the runtime stops the loop: fibers still suspended at that
/// point never resume and their callbacks never fire.
pub struct Runtime {
    config: RuntimeConfig,
    driver: Arc<Driver>,
    platform: Arc<Platform>,
    env: Env,
    host: Option<JoinHandle<()>>,
}

impl Runtime {
    /// A runtime with default configuration.
    pub fn new() -> Result<Self, Error> {
        RuntimeBuilder::new().build()
    }

    /// Validates `config` and starts the host thread.
    pub fn with_config(config: RuntimeConfig) -> Result<Self, Error> {
        config.validate()?;
        let driver = Arc::new(Driver::real());
        let clock: Arc<dyn Clock> = Arc::clone(&driver) as Arc<dyn Clock>;
        let scheduler: Arc<dyn Scheduler> = Arc::clone(&driver) as Arc<dyn Scheduler>;
        let platform = Arc::new(Platform {
            scheduler,
            clock: Arc::clone(&clock),
            max_ops: config.max_ops,
            report_failures: config.report_failures,
            supervisor: Arc::clone(&config.supervisor),
        });
        let env = default_env(clock, config.seed);
        let loop_driver = Arc::clone(&driver);
        let host = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || host_loop(&loop_driver))
            .map_err(|e| Error::Spawn {
                reason: e.to_string(),
            })?;
        debug!(thread = %config.thread_name, max_ops = config.max_ops, "runtime started");
        Ok(Self {
            config,
            driver,
            platform,
            env,
            host: Some(host),
        })
    }

    /// The configuration this runtime was built with.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The root environment every fiber starts with.
    #[must_use]
    pub fn environment(&self) -> &Env {
        &self.env
    }

    /// Time since the runtime started.
    #[must_use]
    pub fn now(&self) -> Time {
        self.driver.now()
    }

    /// Runs `effect` on a new root fiber and calls `callback` with its
    /// exit, on the host thread.
    pub fn run_callback<A, E, F>(&self, effect: Effect<A, E>, callback: F) -> Fiber<A, E>
    where
        A: Data,
        E: Data,
        F: FnOnce(Exit<A, E>) + Send + 'static,
    {
        let context = FiberContext::spawn_root(
            &self.platform,
            self.env.clone(),
            effect.erase(),
            Box::new(move |exit: &ExitValue| callback(exit_from_value(exit.clone()))),
        );
        Fiber::from_context(context)
    }

    /// Like [`Runtime::run_callback`], returning a handle that interrupts
    /// the fiber.
    pub fn run_cancel<A, E, F>(&self, effect: Effect<A, E>, callback: F) -> Canceler
    where
        A: Data,
        E: Data,
        F: FnOnce(Exit<A, E>) + Send + 'static,
    {
        Canceler {
            fiber: self.run_callback(effect, callback).erase(),
        }
    }

    /// Runs `effect` and returns a future of its exit. The future can be
    /// polled by any executor; it does not drive the fiber.
    pub fn run_exit_future<A: Data, E: Data>(&self, effect: Effect<A, E>) -> ExitFuture<A, E> {
        let slot = Arc::new(Mutex::new(ExitSlot {
            exit: None,
            waker: None,
        }));
        let writer = Arc::clone(&slot);
        self.run_callback(effect, move |exit| {
            let waker = {
                let mut slot = writer.lock();
                slot.exit = Some(exit);
                slot.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        });
        ExitFuture { slot }
    }

    /// Runs `effect` and blocks the calling thread until it exits.
    ///
    /// Must not be called from inside a fiber of the same runtime: the
    /// host thread would wait on itself.
    pub fn block_on<A: Data, E: Data>(&self, effect: Effect<A, E>) -> Result<Exit<A, E>, Error> {
        let done = Arc::new((Mutex::new(None), Condvar::new()));
        let signal = Arc::clone(&done);
        self.run_callback(effect, move |exit| {
            let (slot, ready) = &*signal;
            *slot.lock() = Some(exit);
            ready.notify_all();
        });
        let (slot, ready) = &*done;
        let mut slot = slot.lock();
        loop {
            if let Some(exit) = slot.take() {
                return Ok(exit);
            }
            if self.driver.is_shutdown() {
                return Err(Error::Shutdown);
            }
            ready.wait_for(&mut slot, SHUTDOWN_POLL);
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.driver.shutdown();
        if let Some(host) = self.host.take() {
            if host.thread().id() != std::thread::current().id() {
                let _ = host.join();
            }
        }
        debug!(thread = %self.config.thread_name, "runtime stopped");
    }
}

/// Shuts the driver down when the host loop exits, including by panic.
struct ShutdownOnExit<'a>(&'a Driver);

impl Drop for ShutdownOnExit<'_> {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

fn host_loop(driver: &Driver) {
    let _guard = ShutdownOnExit(driver);
    loop {
        match driver.turn() {
            Turn::Ran => {}
            Turn::Idle(deadline) => {
                trace!(?deadline, "host loop idle");
                driver.park();
            }
            Turn::Shutdown => break,
        }
    }
}

/// Interrupts a fiber started with [`Runtime::run_cancel`].
#[derive(Debug, Clone)]
pub struct Canceler {
    fiber: FiberHandle,
}

impl Canceler {
    /// The fiber this cancels.
    #[must_use]
    pub fn fiber_id(&self) -> FiberId {
        self.fiber.id()
    }

    /// Requests interruption on behalf of the host. Returns immediately;
    /// the exit is still delivered to the original callback.
    pub fn cancel(&self) {
        self.fiber.interrupt_now(FiberId::NONE);
    }
}

struct ExitSlot<A, E> {
    exit: Option<Exit<A, E>>,
    waker: Option<Waker>,
}

/// The exit of a fiber started with [`Runtime::run_exit_future`].
pub struct ExitFuture<A, E> {
    slot: Arc<Mutex<ExitSlot<A, E>>>,
}

impl<A, E> ExitFuture<A, E> {
    /// True once the fiber has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.slot.lock().exit.is_some()
    }
}

impl<A, E> std::fmt::Debug for ExitFuture<A, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitFuture")
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<A, E> Future for ExitFuture<A, E> {
    type Output = Exit<A, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.lock();
        slot.exit.take().map_or_else(
            || {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            },
            Poll::Ready,
        )
    }
}
