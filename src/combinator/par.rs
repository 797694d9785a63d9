//! Parallel composition.

use std::sync::Arc;

use crate::effect::{Data, Effect};
use crate::fiber::Fiber;
use crate::types::{Exit, FiberId};

impl<A: Data, E: Data> Effect<A, E> {
    /// Runs both effects concurrently and combines their values.
    ///
    /// When either side fails the other is interrupted, and the result fails
    /// with both causes, left before right. Fiber-local values set by the
    /// side that finishes second are inherited on success.
    pub fn zip_with_par<B, C, F>(self, that: Effect<B, E>, f: F) -> Effect<C, E>
    where
        B: Data,
        C: Data,
        F: Fn(A, B) -> C + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let g = Arc::clone(&f);
        self.race_with_winner(
            that,
            move |exit, winner, loser| {
                let f = Arc::clone(&f);
                coordinate(exit, winner, loser, true, move |a, b| f(a, b))
            },
            move |exit, winner, loser| {
                let g = Arc::clone(&g);
                coordinate(exit, winner, loser, false, move |b, a| g(a, b))
            },
        )
    }

    /// Runs both effects concurrently and pairs their values.
    pub fn zip_par<B: Data>(self, that: Effect<B, E>) -> Effect<(A, B), E> {
        self.zip_with_par(that, |a, b| (a, b))
    }
}

fn coordinate<X, Y, C, E, F>(
    exit: Exit<X, E>,
    winner: FiberId,
    loser: Fiber<Y, E>,
    left_won: bool,
    f: F,
) -> Effect<C, E>
where
    X: Data,
    Y: Data,
    C: Data,
    E: Data,
    F: Fn(X, Y) -> C + Send + Sync + 'static,
{
    match exit {
        Exit::Success(x) => loser.join().map(move |y| f(x.clone(), y)),
        Exit::Failure(cause) => loser.interrupt_as(winner).widen().flat_map(move |lost| {
            match lost {
                Exit::Success(_) => Effect::halt(cause.clone()),
                Exit::Failure(other) if left_won => Effect::halt(cause.clone().both(other)),
                Exit::Failure(other) => Effect::halt(other.both(cause.clone())),
            }
        }),
    }
}

/// Runs every effect concurrently, collecting values in input order.
///
/// The first failure interrupts everything still running.
pub fn collect_all_par<A, E, I>(effects: I) -> Effect<Vec<A>, E>
where
    A: Data,
    E: Data,
    I: IntoIterator<Item = Effect<A, E>>,
{
    effects
        .into_iter()
        .fold(Effect::succeed(Vec::new()), |acc, effect| {
            acc.zip_with_par(effect, |mut values: Vec<A>, value| {
                values.push(value);
                values
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabConfig, LabRuntime};
    use crate::services::now;
    use crate::test_utils::init_test_logging;
    use crate::types::{Cause, Time};
    use parking_lot::Mutex;
    use std::time::Duration;

    fn lab() -> LabRuntime {
        LabRuntime::new(LabConfig::new(47))
    }

    #[test]
    fn zip_par_runs_both_sides_concurrently() {
        init_test_logging();
        crate::test_phase!("zip_par_runs_both_sides_concurrently");
        let left = Effect::<i32, String>::succeed(1).delay(Duration::from_millis(30));
        let right = Effect::<&'static str, String>::succeed("b").delay(Duration::from_millis(30));
        let e = left
            .zip_par(right)
            .zip(now().widen());
        let exit = lab().block_on(e).unwrap();
        // Sequential composition would need 60ms of virtual time.
        assert_eq!(exit, Exit::succeed(((1, "b"), Time::from_millis(30))));
        crate::test_complete!("zip_par_runs_both_sides_concurrently");
    }

    #[test]
    fn failure_interrupts_the_sibling() {
        init_test_logging();
        let finished = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&finished);
        let slow = Effect::<i32, String>::total(move || {
            *flag.lock() = true;
            2
        })
        .delay(Duration::from_millis(100));
        let fast = Effect::<i32, String>::fail("boom".to_string()).delay(Duration::from_millis(5));
        let exit = lab().block_on(fast.zip_par(slow)).unwrap();
        let cause = exit.cause().cloned().unwrap();
        assert_eq!(cause.failures(), vec![&"boom".to_string()]);
        assert!(cause.is_interrupted());
        assert!(!*finished.lock());
    }

    #[test]
    fn both_failures_combine_left_first() {
        init_test_logging();
        let left = Effect::<i32, String>::fail("left".to_string());
        let right = Effect::<i32, String>::fail("right".to_string()).uninterruptible();
        let exit = lab().block_on(left.zip_par(right)).unwrap();
        let cause = exit.cause().cloned().unwrap();
        assert_eq!(cause.failure(), Some(&"left".to_string()));
        assert!(cause.contains(&Cause::fail("right".to_string())));
    }

    #[test]
    fn collect_all_par_keeps_input_order() {
        init_test_logging();
        let effects = (0..5u64).map(|i| {
            Effect::<u64, String>::succeed(i).delay(Duration::from_millis(50 - i * 10))
        });
        let exit = lab().block_on(collect_all_par(effects)).unwrap();
        assert_eq!(exit, Exit::succeed(vec![0, 1, 2, 3, 4]));
    }

    #[test]
    fn collect_all_par_of_nothing_is_empty() {
        init_test_logging();
        let exit = lab()
            .block_on(collect_all_par(Vec::<Effect<u8, String>>::new()))
            .unwrap();
        assert_eq!(exit, Exit::succeed(Vec::new()));
    }
}
