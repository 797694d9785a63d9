//! Race two effects.

use std::sync::Arc;

use crate::effect::value::exit_from_value;
use crate::effect::{Data, Effect, Instr};
use crate::fiber::Fiber;
use crate::types::{Exit, FiberId};

impl<A: Data, E: Data> Effect<A, E> {
    /// Like [`Effect::race_with`], also passing the winner's id to the
    /// continuation.
    pub(crate) fn race_with_winner<B, E2, C, E3, L, R>(
        self,
        that: Effect<B, E2>,
        left_done: L,
        right_done: R,
    ) -> Effect<C, E3>
    where
        B: Data,
        E2: Data,
        C: Data,
        E3: Data,
        L: Fn(Exit<A, E>, FiberId, Fiber<B, E2>) -> Effect<C, E3> + Send + Sync + 'static,
        R: Fn(Exit<B, E2>, FiberId, Fiber<A, E>) -> Effect<C, E3> + Send + Sync + 'static,
    {
        Effect::from_instr(Arc::new(Instr::Race {
            left: self.instr(),
            right: that.instr(),
            left_wins: Arc::new(move |exit, winner, loser| {
                left_done(exit_from_value(exit), winner, Fiber::from_context(loser)).instr()
            }),
            right_wins: Arc::new(move |exit, winner, loser| {
                right_done(exit_from_value(exit), winner, Fiber::from_context(loser)).instr()
            }),
        }))
    }

    /// Runs both effects on child fibers. Whichever finishes first decides
    /// the result: its continuation receives its exit and the other fiber,
    /// which it may await, interrupt, or leave running.
    ///
    /// If both finish at about the same time, the one whose completion is
    /// observed first wins.
    pub fn race_with<B, E2, C, E3, L, R>(
        self,
        that: Effect<B, E2>,
        left_done: L,
        right_done: R,
    ) -> Effect<C, E3>
    where
        B: Data,
        E2: Data,
        C: Data,
        E3: Data,
        L: Fn(Exit<A, E>, Fiber<B, E2>) -> Effect<C, E3> + Send + Sync + 'static,
        R: Fn(Exit<B, E2>, Fiber<A, E>) -> Effect<C, E3> + Send + Sync + 'static,
    {
        self.race_with_winner(
            that,
            move |exit, _, loser| left_done(exit, loser),
            move |exit, _, loser| right_done(exit, loser),
        )
    }

    /// Returns the first success. The loser is interrupted on behalf of the
    /// winner. If the first to finish failed, waits for the other: its
    /// success wins, and if it fails too both causes are kept with
    /// [`Cause::both`](crate::Cause::both), left first.
    pub fn race(self, that: Self) -> Self {
        self.race_with_winner(
            that,
            |exit, winner, loser| settle(exit, winner, loser, true),
            |exit, winner, loser| settle(exit, winner, loser, false),
        )
    }
}

fn settle<A: Data, E: Data>(
    exit: Exit<A, E>,
    winner: FiberId,
    loser: Fiber<A, E>,
    left_won: bool,
) -> Effect<A, E> {
    match exit {
        Exit::Success(a) => loser.interrupt_as(winner).widen().as_value(a),
        Exit::Failure(cause) => loser.join().map_error_cause(move |other| {
            if left_won {
                cause.clone().both(other)
            } else {
                other.both(cause.clone())
            }
        }),
    }
}
