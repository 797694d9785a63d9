//! The erased instruction set interpreted by the executor.
//!
//! Every [`Effect`](super::Effect) is a thin typed wrapper over an
//! `Arc<Instr>`. Instructions are immutable descriptions; closures are shared
//! `Fn`s, so one tree can be interpreted any number of times, each run
//! independent of the others.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::fiber::fiber_ref::{ForkFn, JoinFn, RefCore};
use crate::fiber::FiberDescriptor;
use crate::runtime::executor::FiberContext;
use crate::scope::FiberScope;
use crate::services::Env;
use crate::supervision::Supervisor;
use crate::types::{Cause, Defect, FiberId};

use super::value::{ExitValue, Value};

pub(crate) type Cont = Arc<dyn Fn(Value) -> Arc<Instr> + Send + Sync>;
pub(crate) type CauseCont = Arc<dyn Fn(Cause<Value>) -> Arc<Instr> + Send + Sync>;
pub(crate) type RaceCont =
    Arc<dyn Fn(ExitValue, FiberId, Arc<FiberContext>) -> Arc<Instr> + Send + Sync>;
pub(crate) type Register = Arc<dyn Fn(Resume) -> Option<Arc<Instr>> + Send + Sync>;
pub(crate) type RefUpdate = Arc<dyn Fn(Value) -> Result<(Value, Value), Defect> + Send + Sync>;
pub(crate) type RefWrap = Arc<dyn Fn(Arc<RefCore>) -> Value + Send + Sync>;

/// One step of a computation description.
pub(crate) enum Instr {
    /// An already computed value.
    Pure(Value),
    /// A side-effecting thunk that does not fail.
    Total(Arc<dyn Fn() -> Value + Send + Sync>),
    /// A side-effecting thunk that may fail with a typed error.
    Partial(Arc<dyn Fn() -> Result<Value, Value> + Send + Sync>),
    /// Defers building the next instruction until it is interpreted.
    Suspend(Arc<dyn Fn() -> Arc<Instr> + Send + Sync>),
    /// Fails with the given cause.
    Fail(Cause<Value>),
    /// Runs the base, then feeds its value to the continuation.
    Chain(Arc<Instr>, Cont),
    /// Runs the base, then the failure or success handler.
    Fold(Arc<Instr>, CauseCont, Cont),
    /// Suspends until the registered resume function is called. The
    /// registration may complete synchronously by returning an instruction.
    Async(Register, Vec<FiberId>),
    /// Starts a child fiber, optionally in an explicit scope.
    Fork(Arc<Instr>, Option<FiberScope>),
    /// Forks both sides and hands the first exit to the matching
    /// continuation, together with the winner's id and the other fiber.
    Race {
        left: Arc<Instr>,
        right: Arc<Instr>,
        left_wins: RaceCont,
        right_wins: RaceCont,
    },
    /// Inspects whether the current region is interruptible.
    CheckInterruptible(Arc<dyn Fn(bool) -> Arc<Instr> + Send + Sync>),
    /// Runs the inner instruction with the given interruptibility.
    SetInterruptStatus(Arc<Instr>, bool),
    /// Reads the current environment.
    Read(Arc<dyn Fn(&Env) -> Arc<Instr> + Send + Sync>),
    /// Runs the inner instruction under the given environment.
    Give(Arc<Instr>, Env),
    /// Gives other fibers a turn.
    Yield,
    /// Runs the inner instruction with an additional supervisor.
    Supervise(Arc<Instr>, Arc<dyn Supervisor>),
    /// Inspects the running fiber.
    Descriptor(Arc<dyn Fn(FiberDescriptor) -> Arc<Instr> + Send + Sync>),
    /// Allocates a fiber ref and seeds it in the current fiber.
    FiberRefNew {
        initial: Value,
        fork: ForkFn,
        join: JoinFn,
        wrap: RefWrap,
    },
    /// Atomically reads and replaces a fiber ref's local value; yields the
    /// first half of the update's result.
    FiberRefModify(Arc<RefCore>, RefUpdate),
    /// Joins a finished child's fiber-local values into the current fiber.
    InheritRefs(Arc<FiberContext>),
}

impl Instr {
    pub(crate) fn pure(value: Value) -> Arc<Self> {
        Arc::new(Self::Pure(value))
    }

    pub(crate) fn unit() -> Arc<Self> {
        Self::pure(Value::unit())
    }

    pub(crate) fn fail(cause: Cause<Value>) -> Arc<Self> {
        Arc::new(Self::Fail(cause))
    }

    pub(crate) fn tag(&self) -> &'static str {
        match self {
            Self::Pure(_) => "Pure",
            Self::Total(_) => "Total",
            Self::Partial(_) => "Partial",
            Self::Suspend(_) => "Suspend",
            Self::Fail(_) => "Fail",
            Self::Chain(..) => "Chain",
            Self::Fold(..) => "Fold",
            Self::Async(..) => "Async",
            Self::Fork(..) => "Fork",
            Self::Race { .. } => "Race",
            Self::CheckInterruptible(_) => "CheckInterruptible",
            Self::SetInterruptStatus(..) => "SetInterruptStatus",
            Self::Read(_) => "Read",
            Self::Give(..) => "Give",
            Self::Yield => "Yield",
            Self::Supervise(..) => "Supervise",
            Self::Descriptor(_) => "Descriptor",
            Self::FiberRefNew { .. } => "FiberRefNew",
            Self::FiberRefModify(..) => "FiberRefModify",
            Self::InheritRefs(_) => "InheritRefs",
        }
    }
}

impl fmt::Debug for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pure(v) => write!(f, "Pure({v:?})"),
            Self::Fail(c) => write!(f, "Fail({c:?})"),
            other => f.write_str(other.tag()),
        }
    }
}

/// Resume function handed to an async registration.
///
/// Only the first call has any effect, and it is further fenced by the
/// suspension epoch: a resume that arrives after the fiber left the
/// suspension (because it was interrupted, or re-entered through another
/// path) is ignored.
#[derive(Clone)]
pub(crate) struct Resume {
    fiber: Arc<FiberContext>,
    epoch: u64,
    fired: Arc<AtomicBool>,
}

impl Resume {
    pub(crate) fn new(fiber: Arc<FiberContext>, epoch: u64) -> Self {
        Self {
            fiber,
            epoch,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn resume(&self, next: Arc<Instr>) {
        if !self.fired.swap(true, Ordering::AcqRel) {
            self.fiber.resume_async(self.epoch, next);
        }
    }

    pub(crate) fn fiber_id(&self) -> FiberId {
        self.fiber.id()
    }
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resume")
            .field("fiber", &self.fiber.id())
            .field("epoch", &self.epoch)
            .finish()
    }
}
