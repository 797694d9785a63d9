//! Scopes: structured lifetimes with finalizers.
//!
//! A [`Scope`] collects finalizers that must run when it closes. Every fiber
//! owns a local scope; children forked under a non-global scope register a
//! finalizer there that interrupts them, so closing a parent's scope tears
//! down its still-running children and waits for their own finalizers.
//!
//! # Lifecycle
//!
//! ```text
//! Open --close(a)--> Closed(a) --last reference released--> finalizers run
//! ```
//!
//! - The close value is fixed by the first `close`; later closes are no-ops.
//! - Finalizers run once, most recently registered first.
//! - Registering on a closed scope never loses the finalizer: the caller
//!   gets the close value back and must run it immediately
//!   ([`Scope::ensure`] does this).
//! - [`Scope::extend`] keeps a scope alive until another one closes.
//!
//! The [`Scope::global`] scope never closes; finalizers registered there are
//! dropped.

pub(crate) mod finalizer;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::effect::{Data, Effect, ExitValue};
use crate::types::Cause;

pub use finalizer::Finalizer;
use finalizer::FinalizerSet;

/// The scope type fibers are supervised in; closes with the fiber's exit.
pub type FiberScope = Scope<ExitValue>;

static SCOPE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Handle for a registered finalizer, used to withdraw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    scope: u64,
    order: u64,
}

impl Key {
    const GLOBAL: Self = Self { scope: 0, order: 0 };
}

/// Result of registering a finalizer without running anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ensured<A> {
    /// The finalizer was stored.
    Registered(Key),
    /// The scope had already closed with this value; the finalizer was not
    /// stored and the caller is responsible for running it.
    Closed(A),
}

struct LocalState<A> {
    exit: Option<A>,
    finalizers: FinalizerSet<A>,
    references: usize,
}

struct Local<A> {
    id: u64,
    state: Mutex<LocalState<A>>,
}

/// A structured lifetime holding finalizers.
pub struct Scope<A> {
    local: Option<Arc<Local<A>>>,
}

impl<A> Clone for Scope<A> {
    fn clone(&self) -> Self {
        Self {
            local: self.local.clone(),
        }
    }
}

impl<A> fmt::Debug for Scope<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.local {
            None => f.write_str("Scope::Global"),
            Some(local) => {
                let state = local.state.lock();
                f.debug_struct("Scope::Local")
                    .field("id", &local.id)
                    .field("closed", &state.exit.is_some())
                    .field("finalizers", &state.finalizers.len())
                    .field("references", &state.references)
                    .finish()
            }
        }
    }
}

impl<A> PartialEq for Scope<A> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.local, &other.local) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<A: Data> Scope<A> {
    /// The scope that never closes.
    #[must_use]
    pub const fn global() -> Self {
        Self { local: None }
    }

    /// A fresh open scope holding one reference.
    #[must_use]
    pub fn local() -> Self {
        Self {
            local: Some(Arc::new(Local {
                id: SCOPE_SEQ.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(LocalState {
                    exit: None,
                    finalizers: FinalizerSet::new(),
                    references: 1,
                }),
            })),
        }
    }

    /// True for the global scope.
    #[must_use]
    pub const fn is_global(&self) -> bool {
        self.local.is_none()
    }

    /// True once a close value has been recorded.
    #[must_use]
    pub fn unsafe_closed(&self) -> bool {
        self.local
            .as_ref()
            .is_some_and(|local| local.state.lock().exit.is_some())
    }

    /// True once the close value has been recorded and every reference has
    /// been released, i.e. the finalizers have been handed out.
    #[must_use]
    pub fn unsafe_released(&self) -> bool {
        self.local.as_ref().is_some_and(|local| {
            let state = local.state.lock();
            state.exit.is_some() && state.references == 0
        })
    }

    /// Number of finalizers currently registered.
    #[must_use]
    pub fn finalizer_count(&self) -> usize {
        self.local
            .as_ref()
            .map_or(0, |local| local.state.lock().finalizers.len())
    }

    /// Registers `finalizer` without running anything.
    pub fn unsafe_ensure(&self, finalizer: Finalizer<A>) -> Ensured<A> {
        let Some(local) = &self.local else {
            return Ensured::Registered(Key::GLOBAL);
        };
        let mut state = local.state.lock();
        if let Some(exit) = &state.exit {
            return Ensured::Closed(exit.clone());
        }
        let order = state.finalizers.push(finalizer);
        Ensured::Registered(Key {
            scope: local.id,
            order,
        })
    }

    /// Withdraws a finalizer. Returns false if the scope already closed or
    /// the key is unknown.
    pub fn unsafe_deny(&self, key: Key) -> bool {
        let Some(local) = &self.local else {
            return false;
        };
        if key.scope != local.id {
            return false;
        }
        let mut state = local.state.lock();
        state.exit.is_none() && state.finalizers.remove(key.order)
    }

    /// Registers `finalizer`, or runs it right away against the close value
    /// if the scope has already closed. Yields the key when registered.
    pub fn ensure<F>(&self, finalizer: F) -> Effect<Option<Key>>
    where
        F: Fn(A) -> Effect<()> + Send + Sync + 'static,
    {
        let scope = self.clone();
        let finalizer = Arc::new(finalizer);
        Effect::suspend(move || {
            let stored = Arc::clone(&finalizer);
            match scope.unsafe_ensure(Box::new(move |a| stored(a))) {
                Ensured::Registered(key) => Effect::succeed(Some(key)),
                Ensured::Closed(a) => finalizer(a).uninterruptible().as_value(None),
            }
        })
    }

    /// Withdraws a finalizer.
    pub fn deny(&self, key: Key) -> Effect<bool> {
        let scope = self.clone();
        Effect::total(move || scope.unsafe_deny(key))
    }

    /// Records `exit` as the close value and releases this scope's own
    /// reference. Yields true if this call ran the finalizers.
    ///
    /// Every finalizer runs even if an earlier one fails; their failures are
    /// combined with [`Cause::then`] and become the failure of this effect.
    pub fn close(&self, exit: A) -> Effect<bool> {
        let scope = self.clone();
        Effect::suspend(move || {
            let Some(local) = &scope.local else {
                return Effect::succeed(false);
            };
            let drained = {
                let mut state = local.state.lock();
                if state.exit.is_some() {
                    return Effect::succeed(false);
                }
                state.exit = Some(exit.clone());
                Self::release_locked(&mut state)
            };
            match drained {
                Some((value, finalizers)) => run_finalizers(value, finalizers).as_value(true),
                None => Effect::succeed(false),
            }
        })
        .uninterruptible()
    }

    /// Keeps this scope open until `that` closes. Yields false if either
    /// scope has already closed.
    pub fn extend<B: Data>(&self, that: &Scope<B>) -> Effect<bool> {
        let scope = self.clone();
        let that = that.clone();
        Effect::suspend(move || {
            let Some(local) = &scope.local else {
                return Effect::succeed(true);
            };
            {
                let mut state = local.state.lock();
                if state.exit.is_some() {
                    return Effect::succeed(false);
                }
                state.references += 1;
            }
            let releaser = scope.clone();
            match that.unsafe_ensure(Box::new(move |_| releaser.release().as_unit())) {
                Ensured::Registered(_) => Effect::succeed(true),
                Ensured::Closed(_) => scope.release().as_value(false),
            }
        })
    }

    /// Drops one reference. When the last reference goes and a close value
    /// is recorded, runs the finalizers and yields true.
    pub fn release(&self) -> Effect<bool> {
        let scope = self.clone();
        Effect::suspend(move || {
            let Some(local) = &scope.local else {
                return Effect::succeed(false);
            };
            let drained = Self::release_locked(&mut local.state.lock());
            match drained {
                Some((value, finalizers)) => run_finalizers(value, finalizers).as_value(true),
                None => Effect::succeed(false),
            }
        })
        .uninterruptible()
    }

    fn release_locked(state: &mut LocalState<A>) -> Option<(A, Vec<Finalizer<A>>)> {
        if state.references == 0 {
            return None;
        }
        state.references -= 1;
        if state.references > 0 {
            return None;
        }
        let exit = state.exit.clone()?;
        Some((exit, state.finalizers.drain_lifo()))
    }
}

/// Runs every finalizer in order, collecting failures instead of stopping.
fn run_finalizers<A: Data>(value: A, finalizers: Vec<Finalizer<A>>) -> Effect<()> {
    let mut acc: Effect<Cause<std::convert::Infallible>> = Effect::succeed(Cause::Empty);
    for finalizer in finalizers {
        let release = finalizer(value.clone());
        acc = acc.flat_map(move |cause: Cause<std::convert::Infallible>| {
            release.clone().exit().map(move |exit| match exit {
                crate::types::Exit::Success(()) => cause.clone(),
                crate::types::Exit::Failure(c) => cause.clone().then(c),
            })
        });
    }
    acc.flat_map(|cause| {
        if cause.is_empty() {
            Effect::unit()
        } else {
            Effect::halt(cause)
        }
    })
}
