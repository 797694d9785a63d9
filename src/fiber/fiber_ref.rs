//! Fiber-local references.
//!
//! A [`FiberRef`] names a slot that every fiber holds its own value for.
//! A forked child starts from `fork(parent_value)`; when a parent joins a
//! child (or calls [`Fiber::inherit_refs`](super::Fiber::inherit_refs)) the
//! parent's value becomes `join(parent_value, child_value)`.

use core::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::effect::{Data, Effect, Instr, Value};
use crate::types::Defect;

static NEXT_REF_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type ForkFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub(crate) type JoinFn = Arc<dyn Fn(Value, Value) -> Value + Send + Sync>;

/// The erased identity of a fiber ref.
pub(crate) struct RefCore {
    pub(crate) id: u64,
    pub(crate) initial: Value,
    pub(crate) fork: ForkFn,
    pub(crate) join: JoinFn,
}

impl RefCore {
    pub(crate) fn new(initial: Value, fork: ForkFn, join: JoinFn) -> Self {
        Self {
            id: NEXT_REF_ID.fetch_add(1, Ordering::Relaxed),
            initial,
            fork,
            join,
        }
    }
}

impl fmt::Debug for RefCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCore")
            .field("id", &self.id)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

/// A typed fiber-local slot.
pub struct FiberRef<T> {
    core: Arc<RefCore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for FiberRef<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for FiberRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FiberRef({})", self.core.id)
    }
}

impl<T> PartialEq for FiberRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.core.id == other.core.id
    }
}

impl<T> Eq for FiberRef<T> {}

impl<T: Data> FiberRef<T> {
    /// Creates a ref whose children copy the parent's value and whose joins
    /// take the child's value.
    pub fn make(initial: T) -> Effect<Self> {
        Self::make_with(initial, T::clone, |_, child| child.clone())
    }

    /// Creates a ref with explicit fork and join policies.
    pub fn make_with<F, J>(initial: T, fork: F, join: J) -> Effect<Self>
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
        J: Fn(&T, &T) -> T + Send + Sync + 'static,
    {
        Effect::from_instr(Arc::new(Instr::FiberRefNew {
            initial: Value::new(initial),
            fork: Arc::new(move |v: Value| {
                let forked = v.downcast_ref::<T>().map(|t| Value::new(fork(t)));
                forked.unwrap_or(v)
            }),
            join: Arc::new(move |parent: Value, child: Value| {
                let joined = match (parent.downcast_ref::<T>(), child.downcast_ref::<T>()) {
                    (Some(p), Some(c)) => Some(Value::new(join(p, c))),
                    _ => None,
                };
                joined.unwrap_or(child)
            }),
            wrap: Arc::new(|core| {
                Value::new(Self {
                    core,
                    _marker: PhantomData,
                })
            }),
        }))
    }

    pub(crate) fn core(&self) -> &Arc<RefCore> {
        &self.core
    }

    /// Atomically reads and replaces the current fiber's value.
    pub fn modify<B: Data, F>(&self, f: F) -> Effect<B>
    where
        F: Fn(T) -> (B, T) + Send + Sync + 'static,
    {
        Effect::from_instr(Arc::new(Instr::FiberRefModify(
            Arc::clone(&self.core),
            Arc::new(move |v: Value| -> Result<(Value, Value), Defect> {
                let (b, t) = f(v.cast::<T>()?);
                Ok((Value::new(b), Value::new(t)))
            }),
        )))
    }

    /// The current fiber's value.
    pub fn get(&self) -> Effect<T> {
        self.modify(|t| (t.clone(), t))
    }

    /// Replaces the current fiber's value.
    pub fn set(&self, value: T) -> Effect<()> {
        self.modify(move |_| ((), value.clone()))
    }

    /// Replaces the value, returning the old one.
    pub fn get_and_set(&self, value: T) -> Effect<T> {
        self.modify(move |old| (old, value.clone()))
    }

    /// Applies `f` to the current fiber's value.
    pub fn update<F>(&self, f: F) -> Effect<()>
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.modify(move |t| ((), f(t)))
    }

    /// Runs `effect` with the ref temporarily set to `value`; the old value
    /// is restored on every exit path.
    pub fn locally<A: Data, E: Data>(&self, value: T, effect: Effect<A, E>) -> Effect<A, E> {
        let this = self.clone();
        self.get().widen::<E>().flat_map(move |old| {
            let restore = this.clone();
            let effect = effect.clone();
            Effect::bracket(
                this.set(value.clone()).widen(),
                move |()| restore.set(old.clone()),
                move |()| effect.clone(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabConfig, LabRuntime};
    use crate::test_utils::init_test_logging;
    use crate::types::Exit;

    fn run<A: Data, E: Data>(effect: Effect<A, E>) -> Exit<A, E> {
        LabRuntime::new(LabConfig::new(17)).block_on(effect).unwrap()
    }

    #[test]
    fn get_set_update() {
        init_test_logging();
        let e = FiberRef::make(1_i32).flat_map(|r| {
            let r2 = r.clone();
            let r3 = r.clone();
            r.set(5)
                .zip_right(r2.update(|n| n * 2))
                .zip_right(r3.get_and_set(0))
                .zip(r.get())
        });
        assert_eq!(run(e), Exit::succeed((10, 0)));
    }

    #[test]
    fn locally_restores() {
        init_test_logging();
        let e = FiberRef::make("outer".to_string()).flat_map(|r| {
            let inner = r.get();
            r.locally("inner".to_string(), inner).zip(r.get())
        });
        assert_eq!(
            run(e),
            Exit::succeed(("inner".to_string(), "outer".to_string()))
        );
    }

    #[test]
    fn locally_restores_after_failure() {
        init_test_logging();
        let e = FiberRef::make(0_u8).flat_map(|r| {
            r.locally(9, Effect::<(), &'static str>::fail("x"))
                .either()
                .zip_right(r.get())
        });
        assert_eq!(run(e), Exit::succeed(0));
    }

    #[test]
    fn refs_are_distinct() {
        init_test_logging();
        let e = FiberRef::make(0).zip(FiberRef::make(0)).map(|(a, b)| a == b);
        assert_eq!(run(e), Exit::succeed(false));
    }
}
