//! Callback-based suspension.
//!
//! An async effect hands a [`Callback`] to user code, which completes it
//! later from any thread. The fiber stays suspended, and gives the host loop
//! back, until then. Only the first completion counts.

use std::convert::Infallible;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use super::instr::{Instr, Resume};
use super::{Data, Effect, Value};
use crate::types::{Cause, Exit, FiberId};

/// Completes a suspended effect.
pub struct Callback<A, E = Infallible> {
    resume: Resume,
    _marker: PhantomData<fn(A, E)>,
}

impl<A, E> Clone for Callback<A, E> {
    fn clone(&self) -> Self {
        Self {
            resume: self.resume.clone(),
            _marker: PhantomData,
        }
    }
}

impl<A, E> std::fmt::Debug for Callback<A, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Callback").field(&self.resume).finish()
    }
}

impl<A: Data, E: Data> Callback<A, E> {
    pub(crate) const fn new(resume: Resume) -> Self {
        Self {
            resume,
            _marker: PhantomData,
        }
    }

    /// Resumes the fiber with the given effect.
    pub fn resume_with(&self, effect: Effect<A, E>) {
        self.resume.resume(effect.instr());
    }

    /// Resumes with a value.
    pub fn succeed(&self, value: A) {
        self.resume.resume(Instr::pure(Value::new(value)));
    }

    /// Resumes with a typed failure.
    pub fn fail(&self, error: E) {
        self.resume_with(Effect::fail(error));
    }

    /// Resumes with an arbitrary cause.
    pub fn halt(&self, cause: Cause<E>) {
        self.resume_with(Effect::halt(cause));
    }

    /// Resumes with an exit.
    pub fn done(&self, exit: Exit<A, E>) {
        self.resume_with(Effect::done(exit));
    }

    /// The suspended fiber.
    #[must_use]
    pub fn fiber_id(&self) -> FiberId {
        self.resume.fiber_id()
    }
}

/// What an interruptible registration reports back.
pub enum Registration<A, E = Infallible> {
    /// The callback will be completed later; run the canceler if the fiber
    /// is interrupted first.
    Pending(Effect<()>),
    /// The result is already known.
    Ready(Effect<A, E>),
}

impl<A: Data, E: Data> Effect<A, E> {
    /// Suspends until `register` completes the callback. `register` may
    /// instead return the result directly.
    pub fn async_maybe<F>(register: F) -> Self
    where
        F: Fn(Callback<A, E>) -> Option<Self> + Send + Sync + 'static,
    {
        Self::async_blocking_on(register, Vec::new())
    }

    /// Suspends until `register` completes the callback.
    pub fn async_<F>(register: F) -> Self
    where
        F: Fn(Callback<A, E>) + Send + Sync + 'static,
    {
        Self::async_maybe(move |cb| {
            register(cb);
            None
        })
    }

    /// Like [`Effect::async_maybe`], recording which fibers the suspension
    /// waits on for diagnostics.
    pub fn async_blocking_on<F>(register: F, blocking_on: Vec<FiberId>) -> Self
    where
        F: Fn(Callback<A, E>) -> Option<Self> + Send + Sync + 'static,
    {
        Self::from_instr(Arc::new(Instr::Async(
            Arc::new(move |resume| register(Callback::new(resume)).map(|e| e.instr())),
            blocking_on,
        )))
    }

    /// Suspends interruptibly. If the fiber is interrupted while waiting,
    /// the canceler returned in [`Registration::Pending`] runs before the
    /// interruption propagates.
    pub fn async_interrupt<F>(register: F, blocking_on: Vec<FiberId>) -> Self
    where
        F: Fn(Callback<A, E>) -> Registration<A, E> + Send + Sync + 'static,
    {
        let register = Arc::new(register);
        Self::suspend(move || {
            let canceler: Arc<Mutex<Effect<()>>> = Arc::new(Mutex::new(Effect::unit()));
            let slot = Arc::clone(&canceler);
            let register = Arc::clone(&register);
            let wait = Self::async_blocking_on(
                move |cb| match register(cb) {
                    Registration::Pending(cancel) => {
                        *slot.lock() = cancel;
                        None
                    }
                    Registration::Ready(effect) => Some(effect),
                },
                blocking_on.clone(),
            );
            Self::uninterruptible_mask(move |restore| {
                let canceler = Arc::clone(&canceler);
                restore
                    .apply(wait.clone())
                    .on_interrupt(Effect::suspend(move || canceler.lock().clone()))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabConfig, LabRuntime};
    use crate::test_utils::init_test_logging;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn lab() -> LabRuntime {
        LabRuntime::new(LabConfig::new(3))
    }

    #[test]
    fn synchronous_completion() {
        init_test_logging();
        let effect = Effect::<i32, String>::async_maybe(|_| Some(Effect::succeed(7)));
        assert_eq!(lab().block_on(effect).unwrap(), Exit::succeed(7));
    }

    #[test]
    fn callback_from_another_thread() {
        init_test_logging();
        let effect = Effect::<i32, String>::async_(|cb| {
            std::thread::spawn(move || cb.fail("remote".to_string()));
        });
        let runtime = crate::runtime::RuntimeBuilder::new().build().unwrap();
        assert_eq!(runtime.block_on(effect).unwrap(), Exit::fail("remote".to_string()));
    }

    #[test]
    fn only_first_completion_counts() {
        init_test_logging();
        let effect = Effect::<i32>::async_(|cb| {
            cb.succeed(1);
            cb.succeed(2);
        });
        assert_eq!(lab().block_on(effect).unwrap(), Exit::succeed(1));
    }

    #[test]
    fn canceler_runs_on_interrupt() {
        init_test_logging();
        let cancels = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&cancels);
        let waiting = Effect::<i32>::async_interrupt(
            move |_cb| {
                let c = Arc::clone(&c);
                Registration::Pending(Effect::total(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                }))
            },
            Vec::new(),
        );
        let program = waiting
            .fork()
            .flat_map(|fiber| Effect::yield_now().zip_right(fiber.interrupt()));
        let exit = lab().block_on(program).unwrap();
        assert!(matches!(exit, Exit::Success(Exit::Failure(ref c)) if c.is_interrupted_only()));
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }
}
