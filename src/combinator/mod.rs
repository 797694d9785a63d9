//! Concurrent combinators built on the race instruction.
//!
//! Everything here forks its operands as children of the calling fiber and
//! coordinates through the winner/loser protocol of
//! [`Effect::race_with`]: the first child to finish decides what happens to
//! the other. No operand is ever abandoned; a loser is either awaited or
//! interrupted and then awaited.
//!
//! | Combinator | On first success | On first failure |
//! |---|---|---|
//! | [`Effect::race`] | interrupt the loser, keep the value | await the loser; fail with both causes if it fails too |
//! | [`Effect::zip_with_par`] | await the loser, combine values | interrupt the loser, fail with both causes |
//! | [`Effect::timeout`] | keep the value | fail |

mod par;
mod race;
mod timeout;

pub use par::collect_all_par;
