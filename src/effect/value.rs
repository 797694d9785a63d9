//! Type-erased values flowing through the interpreter.
//!
//! The executor works on one instruction type for every effect, so results,
//! errors and fiber-local values travel as [`Value`]s. The typed
//! [`Effect`](super::Effect) facade erases on the way in and downcasts on the
//! way out; a mismatch surfaces as a defect rather than a panic.

use core::fmt;
use std::any::{Any, TypeId};

use crate::types::{Cause, Defect, Exit};

/// Values an effect may produce, fail with, or store in a fiber ref.
///
/// Values must be cloneable because an exit is delivered to every observer
/// of a fiber, and sendable because fibers may resume on any host thread.
pub trait Data: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Data for T {}

trait AnyValue: Send + Sync {
    fn clone_box(&self) -> Box<dyn AnyValue>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
    fn type_name(&self) -> &'static str;
}

impl<T: Data> AnyValue for T {
    fn clone_box(&self) -> Box<dyn AnyValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A cloneable, type-erased value.
pub struct Value(Box<dyn AnyValue>);

/// The erased exit every fiber produces internally.
pub type ExitValue = Exit<Value, Value>;

impl Value {
    /// Erases `value`. Erasing a `Value` returns it unchanged.
    #[must_use]
    pub fn new<T: Data>(value: T) -> Self {
        let mut slot = Some(value);
        if let Some(inner) = (&mut slot as &mut dyn Any).downcast_mut::<Option<Self>>() {
            if let Some(v) = inner.take() {
                return v;
            }
        }
        match slot {
            Some(v) => Self(Box::new(v)),
            None => Self::unit(),
        }
    }

    /// The erased unit value.
    #[must_use]
    pub fn unit() -> Self {
        Self(Box::new(()))
    }

    /// Recovers the concrete value, or returns `self` unchanged if the type
    /// does not match.
    pub fn downcast<T: Data>(self) -> Result<T, Self> {
        if TypeId::of::<T>() == TypeId::of::<Self>() {
            let boxed: Box<dyn Any> = Box::new(self);
            return boxed.downcast::<T>().map(|b| *b).map_err(|_| Self::unit());
        }
        if !self.0.as_any().is::<T>() {
            return Err(self);
        }
        self.0
            .into_any()
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| Self::unit())
    }

    /// Downcasts, turning a mismatch into a [`Defect`].
    pub fn cast<T: Data>(self) -> Result<T, Defect> {
        self.downcast::<T>().map_err(|v| {
            Defect::type_mismatch(std::any::type_name::<T>(), v.type_name())
        })
    }

    /// Borrows the concrete value if the type matches.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Name of the erased type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>", self.type_name())
    }
}

/// Recovers a typed cause. Failures of the wrong type become defects.
pub(crate) fn cause_from_value<E: Data>(cause: Cause<Value>) -> Cause<E> {
    cause.flat_map(&mut |v: Value| match v.cast::<E>() {
        Ok(e) => Cause::Fail(e),
        Err(d) => Cause::Die(d),
    })
}

/// Recovers a typed exit.
pub(crate) fn exit_from_value<A: Data, E: Data>(exit: ExitValue) -> Exit<A, E> {
    match exit {
        Exit::Success(v) => match v.cast::<A>() {
            Ok(a) => Exit::Success(a),
            Err(d) => Exit::die(d),
        },
        Exit::Failure(c) => Exit::Failure(cause_from_value(c)),
    }
}
