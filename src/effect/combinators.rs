//! Sequencing, error handling, finalization and interruptibility.
//!
//! Everything here is built from three instructions: `Chain`, `Fold` and
//! `SetInterruptStatus`. Finalizing combinators follow one pattern: enter an
//! uninterruptible region, run the body with the caller's interruptibility
//! restored, and observe its exit with a fold so the finalizer runs on every
//! path.

use std::sync::Arc;

use super::instr::Instr;
use super::value::cause_from_value;
use super::{Data, Effect, Value};
use crate::services::Env;
use crate::supervision::Supervisor;
use crate::types::{Cause, Exit};

/// Restores the interruptibility that was in effect outside an
/// [`Effect::uninterruptible_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptRestore {
    interruptible: bool,
}

impl InterruptRestore {
    /// Runs `effect` with the outer interruptibility.
    #[must_use]
    pub fn apply<A: Data, E: Data>(&self, effect: Effect<A, E>) -> Effect<A, E> {
        effect.interrupt_status(self.interruptible)
    }
}

impl<A: Data, E: Data> Effect<A, E> {
    /// Sequences `f` after this effect.
    pub fn flat_map<B: Data, F>(self, f: F) -> Effect<B, E>
    where
        F: Fn(A) -> Effect<B, E> + Send + Sync + 'static,
    {
        Effect::from_instr(Arc::new(Instr::Chain(
            self.instr(),
            Arc::new(move |v: Value| match v.cast::<A>() {
                Ok(a) => f(a).instr(),
                Err(d) => Instr::fail(Cause::Die(d)),
            }),
        )))
    }

    /// Transforms the success value.
    pub fn map<B: Data, F>(self, f: F) -> Effect<B, E>
    where
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        self.flat_map(move |a| Effect::succeed(f(a)))
    }

    /// Replaces the success value.
    pub fn as_value<B: Data>(self, value: B) -> Effect<B, E> {
        self.map(move |_| value.clone())
    }

    /// Discards the success value.
    pub fn as_unit(self) -> Effect<(), E> {
        self.as_value(())
    }

    /// Runs `that` after this effect, keeping both values.
    pub fn zip<B: Data>(self, that: Effect<B, E>) -> Effect<(A, B), E> {
        self.zip_with(that, |a, b| (a, b))
    }

    /// Runs `that` after this effect and combines the values.
    pub fn zip_with<B: Data, C: Data, F>(self, that: Effect<B, E>, f: F) -> Effect<C, E>
    where
        F: Fn(A, B) -> C + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.flat_map(move |a| {
            let f = Arc::clone(&f);
            that.clone().map(move |b| f(a.clone(), b))
        })
    }

    /// Runs `that` after this effect, keeping this value.
    pub fn zip_left<B: Data>(self, that: Effect<B, E>) -> Self {
        self.zip_with(that, |a, _| a)
    }

    /// Runs `that` after this effect, keeping its value.
    pub fn zip_right<B: Data>(self, that: Effect<B, E>) -> Effect<B, E> {
        self.flat_map(move |_| that.clone())
    }

    /// Runs `f` on the value for its effect, keeping the value.
    pub fn tap<B: Data, F>(self, f: F) -> Self
    where
        F: Fn(&A) -> Effect<B, E> + Send + Sync + 'static,
    {
        self.flat_map(move |a| f(&a).as_value(a))
    }

    /// Handles both outcomes with effects; the most general recovery
    /// combinator.
    pub fn fold_cause_m<B: Data, E2: Data, F, G>(self, on_failure: F, on_success: G) -> Effect<B, E2>
    where
        F: Fn(Cause<E>) -> Effect<B, E2> + Send + Sync + 'static,
        G: Fn(A) -> Effect<B, E2> + Send + Sync + 'static,
    {
        Effect::from_instr(Arc::new(Instr::Fold(
            self.instr(),
            Arc::new(move |cause: Cause<Value>| on_failure(cause_from_value(cause)).instr()),
            Arc::new(move |v: Value| match v.cast::<A>() {
                Ok(a) => on_success(a).instr(),
                Err(d) => Instr::fail(Cause::Die(d)),
            }),
        )))
    }

    /// Handles typed failures and success with effects. A cause without
    /// typed failures (defects, interruptions) passes through; otherwise the
    /// handler sees the first failure.
    pub fn fold_m<B: Data, E2: Data, F, G>(self, on_failure: F, on_success: G) -> Effect<B, E2>
    where
        F: Fn(E) -> Effect<B, E2> + Send + Sync + 'static,
        G: Fn(A) -> Effect<B, E2> + Send + Sync + 'static,
    {
        self.fold_cause_m(
            move |cause| match cause.failure() {
                Some(e) => on_failure(e.clone()),
                None => Effect::halt(cause.flat_map(&mut |_| Cause::Empty)),
            },
            on_success,
        )
    }

    /// Handles typed failures and success with plain functions.
    pub fn fold<B: Data, F, G>(self, on_failure: F, on_success: G) -> Effect<B>
    where
        F: Fn(E) -> B + Send + Sync + 'static,
        G: Fn(A) -> B + Send + Sync + 'static,
    {
        self.fold_m(
            move |e| Effect::succeed(on_failure(e)),
            move |a| Effect::succeed(on_success(a)),
        )
    }

    /// Handles every outcome with plain functions; never fails with a typed
    /// error.
    pub fn fold_cause<B: Data, F, G>(self, on_failure: F, on_success: G) -> Effect<B>
    where
        F: Fn(Cause<E>) -> B + Send + Sync + 'static,
        G: Fn(A) -> B + Send + Sync + 'static,
    {
        self.fold_cause_m(
            move |c| Effect::succeed(on_failure(c)),
            move |a| Effect::succeed(on_success(a)),
        )
    }

    /// Recovers from typed failures.
    pub fn catch_all<E2: Data, F>(self, f: F) -> Effect<A, E2>
    where
        F: Fn(E) -> Effect<A, E2> + Send + Sync + 'static,
    {
        self.fold_m(f, Effect::succeed)
    }

    /// Recovers from any failure, including defects and interruptions.
    pub fn catch_all_cause<E2: Data, F>(self, f: F) -> Effect<A, E2>
    where
        F: Fn(Cause<E>) -> Effect<A, E2> + Send + Sync + 'static,
    {
        self.fold_cause_m(f, Effect::succeed)
    }

    /// Transforms typed failures.
    pub fn map_err<E2: Data, F>(self, f: F) -> Effect<A, E2>
    where
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.fold_cause_m(
            move |cause| {
                let f = Arc::clone(&f);
                Effect::halt(cause.map(move |e| f(e)))
            },
            Effect::succeed,
        )
    }

    /// Transforms the whole failure cause.
    pub fn map_error_cause<E2: Data, F>(self, f: F) -> Effect<A, E2>
    where
        F: Fn(Cause<E>) -> Cause<E2> + Send + Sync + 'static,
    {
        self.fold_cause_m(move |cause| Effect::halt(f(cause)), Effect::succeed)
    }

    /// Moves typed failures into the success channel.
    pub fn either(self) -> Effect<Result<A, E>> {
        self.fold_m(
            |e| Effect::succeed(Err(e)),
            |a| Effect::succeed(Ok(a)),
        )
    }

    /// Reifies the outcome. Never fails.
    pub fn exit(self) -> Effect<Exit<A, E>> {
        self.fold_cause(Exit::Failure, Exit::Success)
    }

    /// Turns typed failures into defects.
    pub fn or_die<E2: Data>(self) -> Effect<A, E2>
    where
        E: std::fmt::Debug,
    {
        self.catch_all(|e| Effect::die_message(format!("{e:?}")))
    }

    /// Runs with the given interruptibility.
    pub fn interrupt_status(self, interruptible: bool) -> Self {
        Self::from_instr(Arc::new(Instr::SetInterruptStatus(
            self.instr(),
            interruptible,
        )))
    }

    /// Runs without reacting to interruption. Interrupt requests are
    /// recorded and acted on when the region ends.
    pub fn uninterruptible(self) -> Self {
        self.interrupt_status(false)
    }

    /// Runs interruptibly.
    pub fn interruptible(self) -> Self {
        self.interrupt_status(true)
    }

    /// Runs `f`'s effect uninterruptibly, handing it a way to restore the
    /// outer interruptibility for sub-effects.
    pub fn uninterruptible_mask<F>(f: F) -> Self
    where
        F: Fn(InterruptRestore) -> Self + Send + Sync + 'static,
    {
        Self::check_interruptible(move |interruptible| {
            f(InterruptRestore { interruptible }).uninterruptible()
        })
    }

    /// Runs `finalizer` after this effect however it ends. A failing
    /// finalizer adds its cause after the effect's own.
    pub fn ensuring(self, finalizer: Effect<()>) -> Self {
        Self::uninterruptible_mask(move |restore| {
            let finalizer = finalizer.clone().widen::<E>();
            let on_failure = finalizer.clone();
            restore.apply(self.clone()).fold_cause_m(
                move |cause1| {
                    let keep = cause1.clone();
                    on_failure.clone().fold_cause_m(
                        move |cause2| Effect::halt(keep.clone().then(cause2)),
                        move |()| Effect::halt(cause1.clone()),
                    )
                },
                move |value| {
                    finalizer
                        .clone()
                        .fold_cause_m(Effect::halt, move |()| Effect::succeed(value.clone()))
                },
            )
        })
    }

    /// Runs `cleanup` with the exit after this effect ends.
    pub fn on_exit<F>(self, cleanup: F) -> Self
    where
        F: Fn(Exit<A, E>) -> Effect<()> + Send + Sync + 'static,
    {
        let body = self;
        Effect::<(), E>::succeed(()).bracket_exit(move |(), exit| cleanup(exit), move |()| body.clone())
    }

    /// Runs `cleanup` only if this effect is interrupted.
    pub fn on_interrupt(self, cleanup: Effect<()>) -> Self {
        Self::uninterruptible_mask(move |restore| {
            let cleanup = cleanup.clone();
            restore.apply(self.clone()).fold_cause_m(
                move |cause| {
                    if cause.is_interrupted() {
                        let keep = cause.clone();
                        cleanup.clone().widen::<E>().fold_cause_m(
                            move |c2| Effect::halt(keep.clone().then(c2)),
                            move |()| Effect::halt(cause.clone()),
                        )
                    } else {
                        Effect::halt(cause)
                    }
                },
                Effect::succeed,
            )
        })
    }

    /// Acquires a resource, uses it, and releases it on every exit path.
    /// Acquisition and release are uninterruptible; use keeps the caller's
    /// interruptibility.
    pub fn bracket<R: Data, U, Rel>(acquire: Effect<R, E>, release: Rel, use_: U) -> Self
    where
        Rel: Fn(R) -> Effect<()> + Send + Sync + 'static,
        U: Fn(R) -> Self + Send + Sync + 'static,
    {
        acquire.bracket_exit(move |r, _| release(r), use_)
    }

    /// Runs this effect repeatedly until it fails.
    pub fn forever<B: Data>(self) -> Effect<B, E> {
        let again = self.clone();
        self.flat_map(move |_| again.clone().forever())
    }

    /// Runs this effect, then `n` more times, yielding the last value.
    pub fn repeat_n(self, n: usize) -> Self {
        if n == 0 {
            return self;
        }
        let again = self.clone();
        self.flat_map(move |_| again.clone().repeat_n(n - 1))
    }

    /// Runs under the given environment.
    pub fn provide(self, env: Env) -> Self {
        Self::from_instr(Arc::new(Instr::Give(self.instr(), env)))
    }

    /// Runs with one service added to (or replaced in) the environment.
    pub fn provide_service<S: Send + Sync + 'static>(self, service: S) -> Self
    where
        S: Clone,
    {
        Self::access(move |env| self.clone().provide(env.with(service.clone())))
    }

    /// Runs with `supervisor` observing every fiber forked inside.
    pub fn supervised(self, supervisor: Arc<dyn Supervisor>) -> Self {
        Self::from_instr(Arc::new(Instr::Supervise(self.instr(), supervisor)))
    }
}

impl<R: Data, E: Data> Effect<R, E> {
    /// Acquire/use/release where the release sees the use's exit.
    pub fn bracket_exit<B: Data, Rel, U>(self, release: Rel, use_: U) -> Effect<B, E>
    where
        Rel: Fn(R, Exit<B, E>) -> Effect<()> + Send + Sync + 'static,
        U: Fn(R) -> Effect<B, E> + Send + Sync + 'static,
    {
        let acquire = self;
        let release = Arc::new(release);
        let use_ = Arc::new(use_);
        Effect::uninterruptible_mask(move |restore| {
            let release = Arc::clone(&release);
            let use_ = Arc::clone(&use_);
            acquire.clone().flat_map(move |r| {
                let release = Arc::clone(&release);
                restore.apply(use_(r.clone())).exit().widen::<E>().flat_map(move |exit| {
                    let keep = exit.clone();
                    release(r.clone(), exit.clone()).widen::<E>().fold_cause_m(
                        move |cause2| {
                            Effect::halt(match keep.clone() {
                                Exit::Failure(cause1) => cause1.then(cause2),
                                Exit::Success(_) => cause2,
                            })
                        },
                        move |()| Effect::done(exit.clone()),
                    )
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabConfig, LabRuntime};
    use crate::test_utils::init_test_logging;
    use crate::types::Defect;
    use parking_lot::Mutex;

    fn run<A: Data, E: Data>(effect: Effect<A, E>) -> Exit<A, E> {
        LabRuntime::new(LabConfig::new(5)).block_on(effect).unwrap()
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Effect<()>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (log, move |tag: &str| {
            let sink = Arc::clone(&sink);
            let tag = tag.to_string();
            Effect::total(move || sink.lock().push(tag.clone()))
        })
    }

    #[test]
    fn sequencing() {
        init_test_logging();
        crate::test_phase!("sequencing");
        let e = Effect::<i32, String>::succeed(2)
            .map(|n| n * 10)
            .flat_map(|n| Effect::succeed(n + 1))
            .zip(Effect::succeed("x"))
            .zip_left(Effect::succeed(()))
            .map(|(n, s)| format!("{s}{n}"));
        assert_eq!(run(e), Exit::succeed("x21".to_string()));
        crate::test_complete!("sequencing");
    }

    #[test]
    fn failure_short_circuits() {
        init_test_logging();
        let (log, push) = recorder();
        let e = Effect::<i32, &'static str>::fail("stop")
            .zip_right(push("unreachable").widen())
            .as_value(1);
        assert_eq!(run(e), Exit::fail("stop"));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn recovery() {
        init_test_logging();
        let caught = Effect::<i32, String>::fail("e".into()).catch_all(|e| Effect::<i32, ()>::succeed(e.len() as i32));
        assert_eq!(run(caught), Exit::succeed(1));

        let folded = Effect::<i32, String>::fail("abc".into()).fold(|e| e.len(), |n| n as usize);
        assert_eq!(run(folded), Exit::succeed(3));

        let either = Effect::<i32, String>::fail("z".into()).either();
        assert_eq!(run(either), Exit::succeed(Err("z".to_string())));

        let mapped = Effect::<i32, i32>::fail(2).map_err(|n| n * 100);
        assert_eq!(run(mapped), Exit::fail(200));

        let died = Effect::<i32, String>::die_message("boom").catch_all(|_| Effect::<i32, String>::succeed(0));
        assert_eq!(run(died), Exit::die(Defect::new("boom")));

        let recovered = Effect::<i32, String>::die_message("boom")
            .catch_all_cause(|c| Effect::<i32, String>::succeed(i32::from(c.is_die())));
        assert_eq!(run(recovered), Exit::succeed(1));
    }

    #[test]
    fn exit_reifies_everything() {
        init_test_logging();
        let e = Effect::<i32, String>::fail("bad".into()).exit();
        assert_eq!(run(e), Exit::succeed(Exit::fail("bad".to_string())));
    }

    #[test]
    fn ensuring_runs_on_success_and_failure() {
        init_test_logging();
        let (log, push) = recorder();
        let ok = Effect::<i32, String>::succeed(1).ensuring(push("ok"));
        let bad = Effect::<i32, String>::fail("x".into()).ensuring(push("bad"));
        assert_eq!(run(ok), Exit::succeed(1));
        assert_eq!(run(bad), Exit::fail("x".to_string()));
        assert_eq!(*log.lock(), vec!["ok", "bad"]);
    }

    #[test]
    fn failing_finalizer_is_sequenced_after_failure() {
        init_test_logging();
        let e = Effect::<i32, String>::fail("first".into())
            .ensuring(Effect::die_message("second"));
        assert_eq!(
            run(e),
            Exit::halt(Cause::fail("first".to_string()).then(Cause::die(Defect::new("second"))))
        );
    }

    #[test]
    fn bracket_releases_on_every_path() {
        init_test_logging();
        let (log, push) = recorder();
        let push = Arc::new(push);
        let p1 = Arc::clone(&push);
        let ok = Effect::<i32, String>::bracket(
            Effect::succeed(5),
            move |r| p1(&format!("release {r}")),
            |r| Effect::succeed(r * 2),
        );
        assert_eq!(run(ok), Exit::succeed(10));

        let p2 = Arc::clone(&push);
        let failed = Effect::<i32, String>::bracket(
            Effect::succeed(6),
            move |r| p2(&format!("release {r}")),
            |_| Effect::fail("use failed".into()),
        );
        assert_eq!(run(failed), Exit::fail("use failed".to_string()));

        let p3 = Arc::clone(&push);
        let acquire_failed = Effect::<i32, String>::bracket(
            Effect::<i32, String>::fail("no resource".into()),
            move |r| p3(&format!("release {r}")),
            |r| Effect::succeed(r),
        );
        assert_eq!(run(acquire_failed), Exit::fail("no resource".to_string()));
        assert_eq!(*log.lock(), vec!["release 5", "release 6"]);
    }

    #[test]
    fn on_exit_sees_the_exit() {
        init_test_logging();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let e = Effect::<i32, String>::fail("f".into()).on_exit(move |exit| {
            let sink = Arc::clone(&sink);
            Effect::total(move || *sink.lock() = Some(exit.clone()))
        });
        assert_eq!(run(e), Exit::fail("f".to_string()));
        assert_eq!(*seen.lock(), Some(Exit::fail("f".to_string())));
    }

    #[test]
    fn interruptibility_is_scoped() {
        init_test_logging();
        let probe = Effect::check_interruptible(Effect::<bool>::succeed);
        let e = probe
            .clone()
            .zip(probe.clone().uninterruptible())
            .zip(Effect::uninterruptible_mask(move |restore| {
                probe.clone().zip(restore.apply(probe.clone()))
            }))
            .zip(Effect::check_interruptible(Effect::<bool>::succeed));
        assert_eq!(run(e), Exit::succeed((((true, false), (false, true)), true)));
    }

    #[test]
    fn repeat_and_forever() {
        init_test_logging();
        let counter = Arc::new(Mutex::new(0));
        let c = Arc::clone(&counter);
        let step = Effect::<i32, i32>::attempt(move || {
            let mut n = c.lock();
            *n += 1;
            if *n == 5 { Err(*n) } else { Ok(*n) }
        });
        assert_eq!(run(step.clone().repeat_n(2)), Exit::succeed(3));
        assert_eq!(run(step.forever::<()>()), Exit::fail(5));
    }
}
