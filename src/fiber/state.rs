//! The cross-fiber state cell.

use std::convert::Infallible;

use super::FiberStatus;
use crate::effect::ExitValue;
use crate::types::Cause;

/// Invoked once with the fiber's exit.
pub(crate) type Observer = Box<dyn FnOnce(&ExitValue) + Send>;

/// The only part of a fiber other fibers touch: interrupt requests and
/// observer registration go through here. `Executing` to `Done` is the only
/// transition.
pub(crate) enum FiberState {
    Executing {
        status: FiberStatus,
        observers: Vec<(u64, Observer)>,
        interrupted: Cause<Infallible>,
    },
    Done(ExitValue),
}

impl FiberState {
    pub(crate) fn initial() -> Self {
        Self::Executing {
            status: FiberStatus::default(),
            observers: Vec::new(),
            interrupted: Cause::Empty,
        }
    }

    pub(crate) fn status(&self) -> FiberStatus {
        match self {
            Self::Executing { status, .. } => status.clone(),
            Self::Done(_) => FiberStatus::Done,
        }
    }

    pub(crate) fn interrupted(&self) -> Cause<Infallible> {
        match self {
            Self::Executing { interrupted, .. } => interrupted.clone(),
            Self::Done(_) => Cause::Empty,
        }
    }

    pub(crate) fn exit(&self) -> Option<&ExitValue> {
        match self {
            Self::Executing { .. } => None,
            Self::Done(exit) => Some(exit),
        }
    }
}

impl std::fmt::Debug for FiberState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Executing {
                status,
                observers,
                interrupted,
            } => f
                .debug_struct("Executing")
                .field("status", status)
                .field("observers", &observers.len())
                .field("interrupted", interrupted)
                .finish(),
            Self::Done(exit) => f.debug_tuple("Done").field(exit).finish(),
        }
    }
}
