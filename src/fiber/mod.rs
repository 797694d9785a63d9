//! Fibers: handles, status, fiber-local state, and forking.
//!
//! Forking runs an effect on a new fiber and hands back a [`Fiber`] handle
//! at once. Where the child is supervised depends on the variant:
//!
//! | Method | Parent scope |
//! |---|---|
//! | [`Effect::fork`] | the forking fiber's own scope |
//! | [`Effect::fork_daemon`] | the global scope; never interrupted by a parent |
//! | [`Effect::fork_in`] | an explicit scope |
//!
//! A child forked into a non-global scope is interrupted when that scope
//! closes, attributed to the fiber whose interruption closed it (or to the
//! parent), and the closing fiber waits for the child's own finalizers.

pub mod fiber_ref;
mod handle;
pub(crate) mod state;
mod status;

use std::collections::BTreeSet;
use std::sync::Arc;

pub use fiber_ref::FiberRef;
pub use handle::Fiber;
pub use status::FiberStatus;

use crate::effect::{Data, Effect, Instr};
use crate::runtime::executor::FiberContext;
use crate::scope::FiberScope;
use crate::types::FiberId;

/// A snapshot of the running fiber, from [`Effect::descriptor`].
#[derive(Debug, Clone)]
pub struct FiberDescriptor {
    /// The fiber's id.
    pub id: FiberId,
    /// Status at the time of the snapshot.
    pub status: FiberStatus,
    /// Fibers that have requested this fiber's interruption.
    pub interruptors: BTreeSet<FiberId>,
    /// Whether the current region is interruptible.
    pub interruptible: bool,
    /// The fiber's own scope. Children forked with [`Effect::fork`] are
    /// registered here.
    pub scope: FiberScope,
}

impl<A: Data, E: Data> Effect<A, E> {
    fn fork_with(self, scope: Option<FiberScope>) -> Effect<Fiber<A, E>> {
        Effect::<Arc<FiberContext>>::from_instr(Arc::new(Instr::Fork(self.instr(), scope)))
            .map(Fiber::from_context)
    }

    /// Runs this effect on a new child fiber supervised by the current one.
    pub fn fork(self) -> Effect<Fiber<A, E>> {
        self.fork_with(None)
    }

    /// Runs this effect on a new fiber no parent scope will interrupt.
    pub fn fork_daemon(self) -> Effect<Fiber<A, E>> {
        self.fork_with(Some(FiberScope::global()))
    }

    /// Runs this effect on a new fiber supervised by `scope`.
    pub fn fork_in(self, scope: FiberScope) -> Effect<Fiber<A, E>> {
        self.fork_with(Some(scope))
    }
}
