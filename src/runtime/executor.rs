//! The fiber run loop.
//!
//! A [`FiberContext`] interprets one instruction tree. Its private stacks
//! (continuations, environments, interrupt statuses, supervisors) live in a
//! [`Machine`] that only the turn currently running the fiber locks. Other
//! fibers reach it through [`FiberState`] alone: they record interrupt
//! requests and register exit observers there.
//!
//! # Turns
//!
//! A turn starts when the scheduler runs a task for the fiber and ends when
//! the fiber suspends, yields, exceeds its operation budget, or finishes.
//! Anything that continues the fiber later (an async resume, a fairness
//! yield, an interrupt of a suspended fiber) goes back through
//! [`Scheduler::dispatch_later`](super::Scheduler::dispatch_later); the run
//! loop is never re-entered synchronously.
//!
//! # Interruption
//!
//! Before every instruction the loop checks for a pending interrupt. If one
//! is recorded, the current region is interruptible, and the fiber is not
//! already interrupting, the next instruction is replaced by a failure with
//! the recorded interrupt cause. Unwinding for that failure discards
//! handlers while interruption is still actionable, and strips typed
//! failures from the cause flowing past them.
//!
//! # Completion
//!
//! With an empty stack the fiber closes its own scope first (running
//! finalizers and interrupting children forked into it), merges finalizer
//! failures into its exit, and only then publishes `Done` and notifies
//! observers in registration order.

use std::collections::HashMap;
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::Platform;
use crate::effect::instr::{CauseCont, Cont, RaceCont, Register, Resume};
use crate::effect::value::ExitValue;
use crate::effect::{Effect, Instr, Value};
use crate::fiber::fiber_ref::RefCore;
use crate::fiber::state::{FiberState, Observer};
use crate::fiber::{FiberDescriptor, FiberStatus};
use crate::scope::{Ensured, FiberScope};
use crate::services::Env;
use crate::supervision::{self, FiberHandle, Supervisor};
use crate::tracing_compat::{debug, trace, warn};
use crate::types::{Cause, Defect, Exit, FiberId};

type Locals = HashMap<u64, (Arc<RefCore>, Value)>;

enum Frame {
    Apply(Cont),
    Fold(CauseCont, Cont),
    InterruptExit,
    RestoreEnv,
    PopSupervisor,
}

/// The fiber's private stacks.
struct Machine {
    stack: Vec<Frame>,
    envs: Vec<Env>,
    interrupt_status: Vec<bool>,
    supervisors: Vec<Arc<dyn Supervisor>>,
    async_epoch: u64,
}

impl Machine {
    fn interruptible(&self) -> bool {
        self.interrupt_status.last().copied().unwrap_or(true)
    }

    fn env(&self) -> &Env {
        // The root environment is pushed at construction and never popped.
        &self.envs[self.envs.len() - 1]
    }

    fn supervisor(&self) -> Arc<dyn Supervisor> {
        Arc::clone(&self.supervisors[self.supervisors.len() - 1])
    }
}

/// One fiber: its state cell, its machine, its locals and its scope.
pub(crate) struct FiberContext {
    id: FiberId,
    platform: Arc<Platform>,
    state: Mutex<FiberState>,
    machine: Mutex<Machine>,
    locals: Mutex<Locals>,
    scope: FiberScope,
    next_observer: AtomicU64,
}

impl FiberContext {
    fn new(
        platform: Arc<Platform>,
        env: Env,
        interruptible: bool,
        supervisor: Arc<dyn Supervisor>,
        locals: Locals,
    ) -> Arc<Self> {
        let id = FiberId::new(platform.clock.now());
        Arc::new(Self {
            id,
            platform,
            state: Mutex::new(FiberState::initial()),
            machine: Mutex::new(Machine {
                stack: Vec::new(),
                envs: vec![env],
                interrupt_status: vec![interruptible],
                supervisors: vec![supervisor],
                async_epoch: 0,
            }),
            locals: Mutex::new(locals),
            scope: FiberScope::local(),
            next_observer: AtomicU64::new(0),
        })
    }

    /// Creates a root fiber for `effect`, tells the platform supervisor, and
    /// dispatches its first turn. `observer` sees the exit.
    pub(crate) fn spawn_root(
        platform: &Arc<Platform>,
        env: Env,
        effect: Effect<Value, Value>,
        observer: Observer,
    ) -> Arc<Self> {
        let supervisor = Arc::clone(&platform.supervisor);
        let fiber = Self::new(
            Arc::clone(platform),
            env.clone(),
            true,
            Arc::clone(&supervisor),
            HashMap::new(),
        );
        let handle = FiberHandle::from_context(Arc::clone(&fiber));
        supervisor.on_start(&env, &effect, None, &handle);
        fiber.observe(Box::new(move |exit| supervisor.on_end(exit, &handle)));
        fiber.observe(observer);
        trace!(fiber = %fiber.id, "root fiber started");
        fiber.evaluate_later(effect.instr());
        fiber
    }

    pub(crate) fn id(&self) -> FiberId {
        self.id
    }

    /// Runs `instr` on a later turn.
    pub(crate) fn evaluate_later(self: &Arc<Self>, instr: Arc<Instr>) {
        let fiber = Arc::clone(self);
        self.platform
            .scheduler
            .dispatch_later(Box::new(move || fiber.run_turn(instr)));
    }

    /// One turn of the run loop, starting from `start`.
    fn run_turn(self: &Arc<Self>, start: Arc<Instr>) {
        let mut machine = self.machine.lock();
        let mut op_count = 0_usize;
        let mut current = Some(start);
        while let Some(instr) = current.take() {
            let stepped = panic::catch_unwind(AssertUnwindSafe(|| {
                self.step(&mut machine, instr, &mut op_count)
            }));
            current = match stepped {
                Ok(next) => next,
                Err(payload) => {
                    let defect = Defect::from_panic(payload.as_ref());
                    debug!(fiber = %self.id, defect = %defect, "panic in fiber");
                    self.set_interrupting(true);
                    Some(Instr::fail(Cause::Die(defect)))
                }
            };
        }
    }

    /// Interprets one instruction. `None` ends the turn.
    fn step(
        self: &Arc<Self>,
        m: &mut Machine,
        instr: Arc<Instr>,
        op_count: &mut usize,
    ) -> Option<Arc<Instr>> {
        if self.should_interrupt(m) {
            self.set_interrupting(true);
            *op_count += 1;
            return Some(Instr::fail(self.interrupted().widen()));
        }
        if *op_count >= self.platform.max_ops {
            trace!(fiber = %self.id, ops = *op_count, "operation budget spent, yielding");
            self.evaluate_later(instr);
            return None;
        }
        *op_count += 1;

        match &*instr {
            Instr::Pure(value) => self.next_instr(m, value.clone()),
            Instr::Total(thunk) => self.next_instr(m, thunk()),
            Instr::Partial(thunk) => match thunk() {
                Ok(value) => self.next_instr(m, value),
                Err(error) => Some(Instr::fail(Cause::Fail(error))),
            },
            Instr::Suspend(thunk) => Some(thunk()),
            Instr::Fail(cause) => self.fail(m, cause.clone()),
            Instr::Chain(base, k) => match &**base {
                Instr::Pure(value) => Some(k(value.clone())),
                Instr::Total(thunk) => Some(k(thunk())),
                _ => {
                    m.stack.push(Frame::Apply(Arc::clone(k)));
                    Some(Arc::clone(base))
                }
            },
            Instr::Fold(base, on_failure, on_success) => {
                m.stack
                    .push(Frame::Fold(Arc::clone(on_failure), Arc::clone(on_success)));
                Some(Arc::clone(base))
            }
            Instr::Async(register, blocking_on) => {
                self.suspend_on(m, &instr, register, blocking_on.clone())
            }
            Instr::Fork(body, scope) => {
                let child = self.fork(m, Arc::clone(body), scope.clone());
                self.next_instr(m, Value::new(child))
            }
            Instr::Race {
                left,
                right,
                left_wins,
                right_wins,
            } => Some(self.race(m, left, right, left_wins, right_wins)),
            Instr::CheckInterruptible(f) => Some(f(m.interruptible())),
            Instr::SetInterruptStatus(body, flag) => {
                m.interrupt_status.push(*flag);
                m.stack.push(Frame::InterruptExit);
                Some(Arc::clone(body))
            }
            Instr::Read(f) => Some(f(m.env())),
            Instr::Give(body, env) => {
                m.envs.push(env.clone());
                m.stack.push(Frame::RestoreEnv);
                Some(Arc::clone(body))
            }
            Instr::Yield => {
                self.evaluate_later(Instr::unit());
                None
            }
            Instr::Supervise(body, supervisor) => {
                let combined = supervision::and(m.supervisor(), Arc::clone(supervisor));
                m.supervisors.push(combined);
                m.stack.push(Frame::PopSupervisor);
                Some(Arc::clone(body))
            }
            Instr::Descriptor(f) => Some(f(self.descriptor(m))),
            Instr::FiberRefNew {
                initial,
                fork,
                join,
                wrap,
            } => {
                let core = Arc::new(RefCore::new(
                    initial.clone(),
                    Arc::clone(fork),
                    Arc::clone(join),
                ));
                self.locals
                    .lock()
                    .insert(core.id, (Arc::clone(&core), initial.clone()));
                self.next_instr(m, wrap(core))
            }
            Instr::FiberRefModify(core, update) => {
                let current = self.get_local(core);
                match update(current) {
                    Ok((result, updated)) => {
                        self.locals
                            .lock()
                            .insert(core.id, (Arc::clone(core), updated));
                        self.next_instr(m, result)
                    }
                    Err(defect) => Some(Instr::fail(Cause::Die(defect))),
                }
            }
            Instr::InheritRefs(child) => {
                if !Arc::ptr_eq(child, self) {
                    self.inherit_locals(child);
                }
                self.next_instr(m, Value::unit())
            }
        }
    }

    /// Feeds `value` to the next continuation, or finishes the fiber.
    fn next_instr(self: &Arc<Self>, m: &mut Machine, value: Value) -> Option<Arc<Instr>> {
        match m.stack.pop() {
            None => self.done(Exit::Success(value)),
            Some(Frame::Apply(k) | Frame::Fold(_, k)) => Some(k(value)),
            Some(Frame::InterruptExit) => {
                m.interrupt_status.pop();
                Some(Instr::pure(value))
            }
            Some(Frame::RestoreEnv) => {
                m.envs.pop();
                Some(Instr::pure(value))
            }
            Some(Frame::PopSupervisor) => {
                m.supervisors.pop();
                Some(Instr::pure(value))
            }
        }
    }

    fn fail(self: &Arc<Self>, m: &mut Machine, cause: Cause<Value>) -> Option<Arc<Instr>> {
        let (handler, discarded) = self.unwind_stack(m);
        let cause = if discarded {
            cause.strip_failures()
        } else {
            cause
        };
        if let Some(on_failure) = handler {
            self.set_interrupting(false);
            return Some(on_failure(cause));
        }
        let missing = {
            let present = cause.interruptors();
            self.interrupted()
                .interruptors()
                .into_iter()
                .filter(|id| !present.contains(id))
                .collect::<Vec<_>>()
        };
        let cause = missing
            .into_iter()
            .fold(cause, |acc, id| acc.then(Cause::Interrupt(id)));
        self.set_interrupting(true);
        self.done(Exit::Failure(cause))
    }

    /// Pops frames up to the nearest failure handler. Handlers met while an
    /// interrupt is actionable are discarded; the flag reports whether any
    /// were.
    fn unwind_stack(&self, m: &mut Machine) -> (Option<CauseCont>, bool) {
        let mut discarded = false;
        while let Some(frame) = m.stack.pop() {
            match frame {
                Frame::Apply(_) => {}
                Frame::InterruptExit => {
                    m.interrupt_status.pop();
                }
                Frame::RestoreEnv => {
                    m.envs.pop();
                }
                Frame::PopSupervisor => {
                    m.supervisors.pop();
                }
                Frame::Fold(on_failure, _) => {
                    if self.should_interrupt(m) {
                        discarded = true;
                    } else {
                        return (Some(on_failure), discarded);
                    }
                }
            }
        }
        (None, discarded)
    }

    /// Finishes with `exit`: first closes the fiber's scope (as more
    /// instructions on this fiber), then publishes the exit.
    fn done(self: &Arc<Self>, exit: ExitValue) -> Option<Arc<Instr>> {
        if !self.scope.unsafe_closed() {
            {
                let mut state = self.state.lock();
                if let FiberState::Executing { status, .. } = &mut *state {
                    *status = FiberStatus::Finishing {
                        interrupting: status.is_interrupting(),
                    };
                }
            }
            self.set_interrupting(true);
            let result = exit.clone();
            let closing = self
                .scope
                .close(exit)
                .exit()
                .widen::<Value>()
                .flat_map(move |closed| match (result.clone(), closed) {
                    (exit, Exit::Success(_)) => Effect::<Value, Value>::done(exit),
                    (Exit::Success(_), Exit::Failure(c)) => Effect::halt(c.widen()),
                    (Exit::Failure(c1), Exit::Failure(c2)) => Effect::halt(c1.then(c2.widen())),
                })
                .uninterruptible();
            return Some(closing.instr());
        }

        let observers = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, FiberState::Done(exit.clone())) {
                FiberState::Executing { observers, .. } => observers,
                previous @ FiberState::Done(_) => {
                    *state = previous;
                    return None;
                }
            }
        };
        trace!(fiber = %self.id, success = exit.is_success(), "fiber done");
        self.report_unhandled(&exit);
        for (_, observer) in observers {
            if panic::catch_unwind(AssertUnwindSafe(|| observer(&exit))).is_err() {
                warn!(fiber = %self.id, "exit observer panicked");
            }
        }
        None
    }

    fn report_unhandled(&self, exit: &ExitValue) {
        if !self.platform.report_failures {
            return;
        }
        if let Exit::Failure(cause) = exit {
            if cause.is_die() {
                warn!(fiber = %self.id, cause = ?cause, "fiber died");
            }
        }
    }

    fn suspend_on(
        self: &Arc<Self>,
        m: &mut Machine,
        instr: &Arc<Instr>,
        register: &Register,
        blocking_on: Vec<FiberId>,
    ) -> Option<Arc<Instr>> {
        let epoch = m.async_epoch;
        m.async_epoch += 1;
        self.enter_async(epoch, m.interruptible(), blocking_on);
        if self.should_interrupt(m) {
            // Leave the suspension unregistered; the next check turns the
            // instruction into the interrupt.
            return if self.exit_async(epoch) {
                Some(Arc::clone(instr))
            } else {
                None
            };
        }
        let resume = Resume::new(Arc::clone(self), epoch);
        match panic::catch_unwind(AssertUnwindSafe(|| register(resume))) {
            Ok(Some(next)) if self.exit_async(epoch) => Some(next),
            Ok(_) => None,
            // A callback stored before the panic may already have resumed
            // the fiber; only the side that leaves the suspension continues.
            Err(payload) if self.exit_async(epoch) => {
                let defect = Defect::from_panic(payload.as_ref());
                debug!(fiber = %self.id, defect = %defect, "panic in async registration");
                Some(Instr::fail(Cause::Die(defect)))
            }
            Err(_) => None,
        }
    }

    fn enter_async(&self, epoch: u64, interruptible: bool, blocking_on: Vec<FiberId>) {
        let mut state = self.state.lock();
        if let FiberState::Executing { status, .. } = &mut *state {
            let previous = std::mem::take(status);
            let interruptible = interruptible && !previous.is_interrupting();
            *status = FiberStatus::Suspended {
                previous: Box::new(previous),
                interruptible,
                epoch,
                blocking_on,
            };
        }
    }

    /// Leaves the suspension for `epoch`. False if it was already left.
    fn exit_async(&self, epoch: u64) -> bool {
        let mut state = self.state.lock();
        let FiberState::Executing { status, .. } = &mut *state else {
            return false;
        };
        match std::mem::take(status) {
            FiberStatus::Suspended {
                previous,
                epoch: current,
                ..
            } if current == epoch => {
                *status = *previous;
                true
            }
            other => {
                *status = other;
                false
            }
        }
    }

    /// Continues the fiber with `next` if it is still suspended on `epoch`.
    pub(crate) fn resume_async(self: &Arc<Self>, epoch: u64, next: Arc<Instr>) {
        if self.exit_async(epoch) {
            self.evaluate_later(next);
        }
    }

    fn should_interrupt(&self, m: &Machine) -> bool {
        if !m.interruptible() {
            return false;
        }
        match &*self.state.lock() {
            FiberState::Executing {
                status,
                interrupted,
                ..
            } => !interrupted.is_empty() && !status.is_interrupting(),
            FiberState::Done(_) => false,
        }
    }

    fn set_interrupting(&self, interrupting: bool) {
        let mut state = self.state.lock();
        if let FiberState::Executing { status, .. } = &mut *state {
            *status = std::mem::take(status).with_interrupting(interrupting);
        }
    }

    fn interrupted(&self) -> Cause<Infallible> {
        self.state.lock().interrupted()
    }

    /// Records an interrupt by `by`. A suspended, interruptible fiber is
    /// woken with the interrupt; otherwise it is acted on at the next
    /// instruction boundary where the fiber is interruptible.
    pub(crate) fn interrupt_as_unsafe(self: &Arc<Self>, by: FiberId) {
        let wake = {
            let mut state = self.state.lock();
            let FiberState::Executing {
                status,
                interrupted,
                ..
            } = &mut *state
            else {
                return;
            };
            if !interrupted.interruptors().contains(&by) {
                *interrupted = std::mem::take(interrupted).then(Cause::Interrupt(by));
            }
            match std::mem::take(status) {
                FiberStatus::Suspended {
                    previous,
                    interruptible: true,
                    ..
                } => {
                    *status = previous.with_interrupting(true);
                    true
                }
                other => {
                    *status = other;
                    false
                }
            }
        };
        debug!(fiber = %self.id, by = %by, woken = wake, "interrupt requested");
        if wake {
            self.evaluate_later(Instr::fail(Cause::Interrupt(by)));
        }
    }

    /// Registers `observer` for the exit. If the fiber is already done the
    /// observer runs now and no key is returned.
    pub(crate) fn observe(&self, observer: Observer) -> Option<u64> {
        let exit = {
            let mut state = self.state.lock();
            match &mut *state {
                FiberState::Executing { observers, .. } => {
                    let key = self.next_observer.fetch_add(1, Ordering::Relaxed);
                    observers.push((key, observer));
                    return Some(key);
                }
                FiberState::Done(exit) => exit.clone(),
            }
        };
        observer(&exit);
        None
    }

    pub(crate) fn unobserve(&self, key: u64) {
        if let FiberState::Executing { observers, .. } = &mut *self.state.lock() {
            observers.retain(|(k, _)| *k != key);
        }
    }

    pub(crate) fn poll_exit(&self) -> Option<ExitValue> {
        self.state.lock().exit().cloned()
    }

    pub(crate) fn status(&self) -> FiberStatus {
        self.state.lock().status()
    }

    pub(crate) fn scope(&self) -> &FiberScope {
        &self.scope
    }

    fn descriptor(&self, m: &Machine) -> FiberDescriptor {
        let (status, interrupted) = {
            let state = self.state.lock();
            (state.status(), state.interrupted())
        };
        FiberDescriptor {
            id: self.id,
            status,
            interruptors: interrupted.interruptors(),
            interruptible: m.interruptible(),
            scope: self.scope.clone(),
        }
    }

    /// The value of `core` in this fiber.
    pub(crate) fn get_local(&self, core: &Arc<RefCore>) -> Value {
        self.locals
            .lock()
            .get(&core.id)
            .map_or_else(|| core.initial.clone(), |(_, v)| v.clone())
    }

    fn forked_locals(&self) -> Locals {
        self.locals
            .lock()
            .iter()
            .map(|(id, (core, v))| (*id, (Arc::clone(core), (core.fork)(v.clone()))))
            .collect()
    }

    fn inherit_locals(&self, child: &Self) {
        let child_locals: Vec<(Arc<RefCore>, Value)> = child
            .locals
            .lock()
            .values()
            .map(|(core, v)| (Arc::clone(core), v.clone()))
            .collect();
        let mut locals = self.locals.lock();
        for (core, child_value) in child_locals {
            let parent_value = locals
                .get(&core.id)
                .map_or_else(|| core.initial.clone(), |(_, v)| v.clone());
            let joined = (core.join)(parent_value, child_value);
            locals.insert(core.id, (core, joined));
        }
    }

    /// Starts a child running `body`. The child inherits the environment,
    /// the supervisor, the interruptibility and forked copies of the
    /// locals. Unless its parent scope is global, it is interrupted when
    /// that scope closes.
    fn fork(
        self: &Arc<Self>,
        m: &Machine,
        body: Arc<Instr>,
        scope_override: Option<FiberScope>,
    ) -> Arc<Self> {
        let supervisor = m.supervisor();
        let child = Self::new(
            Arc::clone(&self.platform),
            m.env().clone(),
            m.interruptible(),
            Arc::clone(&supervisor),
            self.forked_locals(),
        );

        let child_handle = FiberHandle::from_context(Arc::clone(&child));
        let parent_handle = FiberHandle::from_context(Arc::clone(self));
        supervisor.on_start(
            m.env(),
            &Effect::from_instr(Arc::clone(&body)),
            Some(&parent_handle),
            &child_handle,
        );
        child.observe(Box::new(move |exit| supervisor.on_end(exit, &child_handle)));

        let parent_scope = scope_override.unwrap_or_else(|| self.scope.clone());
        let mut start = body;
        if !parent_scope.is_global() {
            let weak: Weak<Self> = Arc::downgrade(&child);
            let parent_id = self.id;
            let ensured = parent_scope.unsafe_ensure(Box::new(move |exit: ExitValue| {
                match weak.upgrade() {
                    Some(child) => {
                        let by = first_interruptor(&exit).unwrap_or(parent_id);
                        FiberHandle::from_context(child).interrupt_as(by).as_unit()
                    }
                    None => Effect::unit(),
                }
            }));
            match ensured {
                Ensured::Registered(key) => {
                    let scope = parent_scope.clone();
                    child.observe(Box::new(move |_| {
                        scope.unsafe_deny(key);
                    }));
                }
                Ensured::Closed(exit) => {
                    let by = first_interruptor(&exit).unwrap_or(self.id);
                    start = Instr::fail(Cause::Interrupt(by));
                }
            }
        }

        trace!(parent = %self.id, child = %child.id, "fiber forked");
        child.evaluate_later(start);
        child
    }

    /// Forks both sides and suspends until one finishes. The first to
    /// finish wins; its continuation gets its exit, its id and the other
    /// fiber. Interrupting the racing fiber interrupts both sides.
    fn race(
        self: &Arc<Self>,
        m: &Machine,
        left: &Arc<Instr>,
        right: &Arc<Instr>,
        left_wins: &RaceCont,
        right_wins: &RaceCont,
    ) -> Arc<Instr> {
        let left_fiber = self.fork(m, Arc::clone(left), None);
        let right_fiber = self.fork(m, Arc::clone(right), None);
        let decided = Arc::new(AtomicBool::new(false));

        let (lf, rf) = (Arc::clone(&left_fiber), Arc::clone(&right_fiber));
        let (lw, rw) = (Arc::clone(left_wins), Arc::clone(right_wins));
        let register: Register = Arc::new(move |resume: Resume| {
            arm_race(&lf, &rf, &lw, &decided, &resume);
            arm_race(&rf, &lf, &rw, &decided, &resume);
            None
        });
        let waiting = Effect::<Value, Value>::from_instr(Arc::new(Instr::Async(
            register,
            vec![left_fiber.id, right_fiber.id],
        )));

        let by = self.id;
        let cleanup = FiberHandle::from_context(left_fiber)
            .interrupt_as(by)
            .zip(FiberHandle::from_context(right_fiber).interrupt_as(by))
            .as_unit();
        waiting.on_interrupt(cleanup).instr()
    }
}

fn arm_race(
    winner: &Arc<FiberContext>,
    loser: &Arc<FiberContext>,
    cont: &RaceCont,
    decided: &Arc<AtomicBool>,
    resume: &Resume,
) {
    let (w, l) = (Arc::clone(winner), Arc::clone(loser));
    let (cont, decided, resume) = (Arc::clone(cont), Arc::clone(decided), resume.clone());
    winner.observe(Box::new(move |exit: &ExitValue| {
        if decided.swap(true, Ordering::AcqRel) {
            return;
        }
        let winner_id = w.id;
        let next = cont(exit.clone(), winner_id, l);
        let next = if exit.is_success() {
            Arc::new(Instr::Chain(
                Arc::new(Instr::InheritRefs(w)),
                Arc::new(move |_| Arc::clone(&next)),
            ))
        } else {
            next
        };
        resume.resume(next);
    }));
}

fn first_interruptor(exit: &ExitValue) -> Option<FiberId> {
    exit.cause().and_then(Cause::first_interruptor)
}

impl std::fmt::Debug for FiberContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiberContext")
            .field("id", &self.id)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
