//! Typed handles to running fibers.

use core::fmt;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{FiberRef, FiberStatus};
use crate::effect::value::{exit_from_value, ExitValue};
use crate::effect::{Callback, Data, Effect, Instr, Registration, Value};
use crate::runtime::executor::FiberContext;
use crate::scope::FiberScope;
use crate::types::{Exit, FiberId};

/// A handle to a fiber producing `A` or failing with `E`.
///
/// Handles are cheap to clone. Every operation is safe to call any number
/// of times, before or after the fiber finishes.
pub struct Fiber<A, E = Infallible> {
    context: Arc<FiberContext>,
    _marker: PhantomData<fn() -> (A, E)>,
}

impl<A, E> Clone for Fiber<A, E> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            _marker: PhantomData,
        }
    }
}

impl<A, E> fmt::Debug for Fiber<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("id", &self.context.id())
            .field("status", &self.context.status())
            .finish()
    }
}

impl<A, E> Fiber<A, E> {
    pub(crate) const fn from_context(context: Arc<FiberContext>) -> Self {
        Self {
            context,
            _marker: PhantomData,
        }
    }

    /// The fiber's id.
    #[must_use]
    pub fn id(&self) -> FiberId {
        self.context.id()
    }

    /// The fiber's status right now.
    #[must_use]
    pub fn status_now(&self) -> FiberStatus {
        self.context.status()
    }

    /// The scope the fiber's own children are registered in.
    #[must_use]
    pub fn scope(&self) -> FiberScope {
        self.context.scope().clone()
    }

    /// Forgets the static types.
    #[must_use]
    pub fn erase(self) -> Fiber<Value, Value> {
        Fiber::from_context(self.context)
    }

    /// The fiber's status, as an effect.
    pub fn status(&self) -> Effect<FiberStatus> {
        let context = Arc::clone(&self.context);
        Effect::total(move || context.status())
    }

    /// Joins the fiber's fiber-local values into the calling fiber.
    pub fn inherit_refs(&self) -> Effect<()> {
        Effect::from_instr(Arc::new(Instr::InheritRefs(Arc::clone(&self.context))))
    }

    /// The fiber's value for `fiber_ref`.
    pub fn get_ref<T: Data>(&self, fiber_ref: &FiberRef<T>) -> Effect<T> {
        let context = Arc::clone(&self.context);
        let core = Arc::clone(fiber_ref.core());
        Effect::<Value>::total(move || context.get_local(&core)).flat_map(|v| match v.cast::<T>() {
            Ok(t) => Effect::succeed(t),
            Err(d) => Effect::die(d),
        })
    }

    /// Registers `callback` to run with the exit; runs it right away if the
    /// fiber is already done. For host code outside any fiber.
    pub fn on_done<F>(&self, callback: F)
    where
        A: Data,
        E: Data,
        F: FnOnce(Exit<A, E>) + Send + 'static,
    {
        self.context
            .observe(Box::new(move |exit: &ExitValue| callback(exit_from_value(exit.clone()))));
    }
}

impl<A: Data, E: Data> Fiber<A, E> {
    fn await_value(&self) -> Effect<ExitValue> {
        let context = Arc::clone(&self.context);
        let id = context.id();
        Effect::async_interrupt(
            move |cb: Callback<ExitValue>| {
                if let Some(exit) = context.poll_exit() {
                    return Registration::Ready(Effect::succeed(exit));
                }
                let observer = cb.clone();
                match context.observe(Box::new(move |exit| observer.succeed(exit.clone()))) {
                    Some(key) => {
                        let context = Arc::clone(&context);
                        Registration::Pending(Effect::total(move || context.unobserve(key)))
                    }
                    None => Registration::Pending(Effect::unit()),
                }
            },
            vec![id],
        )
    }

    /// Waits for the fiber to finish and yields its exit.
    pub fn await_exit(&self) -> Effect<Exit<A, E>> {
        self.await_value().map(exit_from_value)
    }

    /// Waits for the fiber and re-raises its outcome. On success the
    /// fiber's fiber-local values are joined into the caller.
    pub fn join(&self) -> Effect<A, E> {
        let inherit = self.inherit_refs();
        self.await_exit().widen::<E>().flat_map(move |exit| match exit {
            Exit::Success(a) => inherit.clone().widen().as_value(a),
            failure @ Exit::Failure(_) => Effect::done(failure),
        })
    }

    /// The exit if the fiber is done, without waiting.
    pub fn poll(&self) -> Effect<Option<Exit<A, E>>> {
        let this = self.clone();
        Effect::total(move || this.poll_now())
    }

    /// The exit if the fiber is done. For host code outside any fiber.
    #[must_use]
    pub fn poll_now(&self) -> Option<Exit<A, E>> {
        self.context.poll_exit().map(exit_from_value)
    }

    /// Interrupts the fiber on behalf of the calling fiber and waits for it
    /// to finish.
    pub fn interrupt(&self) -> Effect<Exit<A, E>> {
        let this = self.clone();
        Effect::fiber_id().flat_map(move |id| this.interrupt_as(id))
    }

    /// Interrupts the fiber on behalf of `by` and waits for it to finish.
    /// Interrupting a finished fiber yields its exit unchanged.
    pub fn interrupt_as(&self, by: FiberId) -> Effect<Exit<A, E>> {
        let context = Arc::clone(&self.context);
        let wait = self.await_exit();
        Effect::suspend(move || {
            context.interrupt_as_unsafe(by);
            wait.clone()
        })
    }

    /// Requests interruption without waiting. For host code outside any
    /// fiber.
    pub fn interrupt_now(&self, by: FiberId) {
        self.context.interrupt_as_unsafe(by);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabConfig, LabRuntime};
    use crate::test_utils::init_test_logging;
    use crate::types::Cause;
    use std::time::Duration;

    fn run<A: Data, E: Data>(effect: Effect<A, E>) -> Exit<A, E> {
        LabRuntime::new(LabConfig::new(21)).block_on(effect).unwrap()
    }

    #[test]
    fn join_reraises_failure_without_wrapping() {
        init_test_logging();
        crate::test_phase!("join_reraises_failure_without_wrapping");
        let e = Effect::<i32, String>::fail("boom".into())
            .fork()
            .widen::<String>()
            .flat_map(|f| f.join());
        assert_eq!(run(e), Exit::fail("boom".to_string()));
        crate::test_complete!("join_reraises_failure_without_wrapping");
    }

    #[test]
    fn await_after_completion() {
        init_test_logging();
        let e = Effect::<i32>::succeed(4).fork().flat_map(|f| {
            let again = f.clone();
            f.await_exit()
                .zip_left(Effect::yield_now())
                .zip(again.await_exit())
                .zip(again.poll())
        });
        assert_eq!(
            run(e),
            Exit::succeed(((Exit::succeed(4), Exit::succeed(4)), Some(Exit::succeed(4))))
        );
    }

    #[test]
    fn interrupting_a_suspended_fiber() {
        init_test_logging();
        let e = Effect::<i32>::never().fork().flat_map(|f| {
            let again = f.clone();
            Effect::fiber_id().flat_map(move |me| {
                let again = again.clone();
                f.interrupt().map(move |exit| (me, exit, again.poll_now()))
            })
        });
        let (me, exit, polled) = run(e).unwrap();
        assert_eq!(exit, Exit::interrupt(me));
        assert_eq!(polled, Some(Exit::interrupt(me)));
    }

    #[test]
    fn interrupt_is_idempotent() {
        init_test_logging();
        let e = Effect::<i32>::never().fork().flat_map(|f| {
            let second = f.clone();
            f.interrupt().zip(second.interrupt())
        });
        let (first, second) = run(e).unwrap();
        assert_eq!(first, second);
        assert!(matches!(&first, Exit::Failure(c) if c.is_interrupted_only()));
    }

    #[test]
    fn interrupting_a_done_fiber_keeps_its_exit() {
        init_test_logging();
        let e = Effect::<i32, String>::fail("done".into()).fork().flat_map(|f| {
            let again = f.clone();
            f.await_exit().zip_right(again.interrupt())
        });
        assert_eq!(run(e), Exit::succeed(Exit::fail("done".to_string())));
    }

    #[test]
    fn uninterruptible_region_completes_before_interrupt() {
        init_test_logging();
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let body = Effect::<()>::sleep(Duration::from_millis(5))
            .zip_right(Effect::total(move || {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
            }))
            .uninterruptible()
            .as_value(7);
        let e = body
            .fork()
            .flat_map(|f| Effect::yield_now().zip_right(f.interrupt()));
        let exit = run(e).unwrap();
        assert!(matches!(exit, Exit::Failure(c) if c.is_interrupted_only()));
        assert!(finished.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn interrupted_while_uninterruptible_then_interruptible() {
        init_test_logging();
        let body = Effect::<()>::yield_now()
            .uninterruptible()
            .zip_right(Effect::<i32>::never());
        let e = body.fork().flat_map(|f| f.interrupt());
        let exit = run(e).unwrap();
        assert!(matches!(exit, Exit::Failure(Cause::Interrupt(_))));
    }

    #[test]
    fn on_done_from_host() {
        init_test_logging();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = Arc::clone(&seen);
        let e = Effect::<u8>::succeed(3).fork().flat_map(move |f| {
            let sink = Arc::clone(&sink);
            f.on_done(move |exit| *sink.lock() = Some(exit));
            f.join()
        });
        assert_eq!(run(e), Exit::succeed(3));
        assert_eq!(*seen.lock(), Some(Exit::succeed(3)));
    }
}
