//! Effect descriptions.
//!
//! An [`Effect<A, E>`] is an immutable description of a computation that,
//! when interpreted by a fiber, either succeeds with an `A` or fails with a
//! [`Cause<E>`]. Building an effect never runs anything; only handing it to a
//! runtime does. Effects are cheap to clone and can be run any number of
//! times, each run independent.
//!
//! # Constructors
//!
//! | Constructor | Meaning |
//! |---|---|
//! | [`Effect::succeed`] | an already known value |
//! | [`Effect::total`] | a side effect that cannot fail |
//! | [`Effect::attempt`] | a side effect returning `Result` |
//! | [`Effect::partial`] | a side effect whose panics become typed failures |
//! | [`Effect::suspend`] | builds the effect lazily |
//! | [`Effect::fail`], [`Effect::die`], [`Effect::halt`] | failures |
//! | [`Effect::async_maybe`], [`Effect::async_interrupt`] | callback-based suspension |
//!
//! Combinators live in `combinators.rs`; fiber-level operations (`fork`,
//! `race`, `zip_par`, `timeout`) are spread over `fiber` and `combinator`.
//!
//! # Error type
//!
//! `E` defaults to [`Infallible`] for effects that cannot fail. Such effects
//! can be used where a fallible one is expected through [`Effect::widen`].

mod callback;
mod combinators;
pub(crate) mod instr;
pub mod value;

use core::fmt;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::fiber::FiberDescriptor;
use crate::services::Env;
use crate::types::{Cause, Defect, Exit, FiberId};

pub use callback::{Callback, Registration};
pub use combinators::InterruptRestore;
pub(crate) use instr::Instr;
pub use value::{Data, ExitValue, Value};

/// A description of a computation producing `A` or failing with `E`.
pub struct Effect<A, E = Infallible> {
    instr: Arc<Instr>,
    _marker: PhantomData<fn() -> (A, E)>,
}

impl<A, E> Clone for Effect<A, E> {
    fn clone(&self) -> Self {
        Self {
            instr: Arc::clone(&self.instr),
            _marker: PhantomData,
        }
    }
}

impl<A, E> fmt::Debug for Effect<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Effect({})", self.instr.tag())
    }
}

impl<A, E> Effect<A, E> {
    pub(crate) const fn from_instr(instr: Arc<Instr>) -> Self {
        Self {
            instr,
            _marker: PhantomData,
        }
    }

    pub(crate) fn instr(&self) -> Arc<Instr> {
        Arc::clone(&self.instr)
    }

    /// Forgets the static types. Used by supervisors, which observe every
    /// fiber regardless of what it computes.
    #[must_use]
    pub fn erase(self) -> Effect<Value, Value> {
        Effect::from_instr(self.instr)
    }
}

impl<A: Data, E: Data> Effect<A, E> {
    /// An effect that succeeds with `value`.
    pub fn succeed(value: A) -> Self {
        Self::from_instr(Instr::pure(Value::new(value)))
    }

    /// An effect that fails with `error`.
    pub fn fail(error: E) -> Self {
        Self::halt(Cause::Fail(error))
    }

    /// An effect that fails with an arbitrary cause.
    pub fn halt(cause: Cause<E>) -> Self {
        Self::from_instr(Instr::fail(cause.map(Value::new)))
    }

    /// An effect that dies with `defect`.
    pub fn die(defect: Defect) -> Self {
        Self::from_instr(Instr::fail(Cause::Die(defect)))
    }

    /// An effect that dies with a message.
    pub fn die_message(message: impl Into<String>) -> Self {
        Self::die(Defect::new(message))
    }

    /// An effect that ends with the given exit.
    pub fn done(exit: Exit<A, E>) -> Self {
        match exit {
            Exit::Success(a) => Self::succeed(a),
            Exit::Failure(c) => Self::halt(c),
        }
    }

    /// Lifts a `Result`.
    pub fn from_result(result: Result<A, E>) -> Self {
        match result {
            Ok(a) => Self::succeed(a),
            Err(e) => Self::fail(e),
        }
    }

    /// A side effect that cannot fail. A panic inside `f` is a defect.
    pub fn total<F>(f: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self::from_instr(Arc::new(Instr::Total(Arc::new(move || Value::new(f())))))
    }

    /// A side effect that reports failure through `Result`.
    pub fn attempt<F>(f: F) -> Self
    where
        F: Fn() -> Result<A, E> + Send + Sync + 'static,
    {
        Self::from_instr(Arc::new(Instr::Partial(Arc::new(move || {
            f().map(Value::new).map_err(Value::new)
        }))))
    }

    /// A side effect that may panic; the panic is captured and turned into a
    /// typed failure by `on_panic`.
    pub fn partial<F, G>(f: F, on_panic: G) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
        G: Fn(Defect) -> E + Send + Sync + 'static,
    {
        Self::attempt(move || {
            panic::catch_unwind(AssertUnwindSafe(&f))
                .map_err(|payload| on_panic(Defect::from_panic(payload.as_ref())))
        })
    }

    /// Defers construction of the effect until it runs.
    pub fn suspend<F>(f: F) -> Self
    where
        F: Fn() -> Self + Send + Sync + 'static,
    {
        Self::from_instr(Arc::new(Instr::Suspend(Arc::new(move || f().instr))))
    }

    /// Fails with an interruption attributed to `id`.
    pub fn interrupt_as(id: FiberId) -> Self {
        Self::halt(Cause::Interrupt(id))
    }

    /// Interrupts the running fiber itself.
    pub fn interrupt() -> Self {
        Effect::fiber_id().widen().flat_map(Self::interrupt_as)
    }

    /// An effect that never completes. It can still be interrupted.
    pub fn never() -> Self {
        Self::async_maybe(|_| None)
    }

    /// Reads the environment and continues with the effect `f` builds.
    pub fn access<F>(f: F) -> Self
    where
        F: Fn(&Env) -> Self + Send + Sync + 'static,
    {
        Self::from_instr(Arc::new(Instr::Read(Arc::new(move |env: &Env| {
            f(env).instr
        }))))
    }

    /// Inspects the running fiber.
    pub fn descriptor_with<F>(f: F) -> Self
    where
        F: Fn(FiberDescriptor) -> Self + Send + Sync + 'static,
    {
        Self::from_instr(Arc::new(Instr::Descriptor(Arc::new(move |d| f(d).instr))))
    }

    /// Continues with an effect chosen from the current interruptibility.
    pub fn check_interruptible<F>(f: F) -> Self
    where
        F: Fn(bool) -> Self + Send + Sync + 'static,
    {
        Self::from_instr(Arc::new(Instr::CheckInterruptible(Arc::new(move |flag| {
            f(flag).instr
        }))))
    }
}

impl<A: Data> Effect<A, Infallible> {
    /// Reuses an effect that cannot fail where a fallible one is expected.
    #[must_use]
    pub fn widen<E: Data>(self) -> Effect<A, E> {
        Effect::from_instr(self.instr)
    }
}

impl<A: Data> Effect<A, Value> {
    /// Recovers static types for an erased effect. A value or error of the
    /// wrong type surfaces as a defect when the effect runs.
    #[must_use]
    pub fn downcast<B: Data, E: Data>(self) -> Effect<B, E> {
        Effect::<Value, Value>::from_instr(self.instr).fold_cause_m(
            |cause| Effect::halt(value::cause_from_value(cause)),
            |v| match v.cast::<B>() {
                Ok(b) => Effect::succeed(b),
                Err(d) => Effect::die(d),
            },
        )
    }
}

impl Effect<()> {
    /// Succeeds with `()`.
    pub fn unit() -> Self {
        Self::from_instr(Instr::unit())
    }

    /// Gives other fibers a turn before continuing.
    pub fn yield_now() -> Self {
        Self::from_instr(Arc::new(Instr::Yield))
    }
}

impl Effect<FiberId> {
    /// The id of the running fiber.
    pub fn fiber_id() -> Self {
        Self::descriptor_with(|d| Effect::succeed(d.id))
    }
}

impl Effect<FiberDescriptor> {
    /// A snapshot of the running fiber.
    pub fn descriptor() -> Self {
        Self::descriptor_with(Effect::succeed)
    }
}

impl Effect<Env> {
    /// The current environment.
    pub fn environment() -> Self {
        Self::access(|env| Effect::succeed(env.clone()))
    }
}
