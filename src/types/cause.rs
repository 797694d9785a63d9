//! The algebra of failure.
//!
//! A [`Cause`] describes every reason a computation did not succeed:
//! expected failures, defects, interruptions, and their sequential
//! ([`Cause::Then`]) and parallel ([`Cause::Both`]) compositions.
//!
//! # Normal form
//!
//! The smart constructors [`Cause::then`] and [`Cause::both`] keep causes in
//! a normal form: [`Cause::Empty`] never appears under a composition, and
//! compositions nest to the right. Under that form the composition laws hold
//! structurally, so `==` can be used to compare causes:
//!
//! - `Empty` is a two-sided identity for `then` and `both`
//! - `then` and `both` are associative
//!
//! Interruption causes are never dropped by composition; only
//! [`Cause::strip_failures`] removes nodes, and it keeps interruptions and
//! defects.

use core::fmt;
use std::collections::BTreeSet;
use std::convert::Infallible;

use super::{Defect, FiberId};

/// Why a computation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cause<E> {
    /// No failure. Identity for both compositions.
    Empty,
    /// An expected, typed failure.
    Fail(E),
    /// An unexpected failure.
    Die(Defect),
    /// Interrupted by the given fiber.
    Interrupt(FiberId),
    /// The left cause happened, then the right one (e.g. a failure followed
    /// by a failing finalizer).
    Then(Box<Cause<E>>, Box<Cause<E>>),
    /// Both causes happened concurrently.
    Both(Box<Cause<E>>, Box<Cause<E>>),
}

impl<E> Default for Cause<E> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<E> Cause<E> {
    /// The empty cause.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Empty
    }

    /// A typed failure.
    #[must_use]
    pub const fn fail(error: E) -> Self {
        Self::Fail(error)
    }

    /// A defect.
    #[must_use]
    pub const fn die(defect: Defect) -> Self {
        Self::Die(defect)
    }

    /// Interruption by `id`.
    #[must_use]
    pub const fn interrupt(id: FiberId) -> Self {
        Self::Interrupt(id)
    }

    /// Sequential composition in normal form.
    #[must_use]
    pub fn then(self, right: Self) -> Self {
        if self.is_empty() {
            return right;
        }
        if right.is_empty() {
            return self;
        }
        match self {
            Self::Then(a, b) => (*a).then((*b).then(right)),
            left => Self::Then(Box::new(left), Box::new(right)),
        }
    }

    /// Parallel composition in normal form.
    #[must_use]
    pub fn both(self, right: Self) -> Self {
        if self.is_empty() {
            return right;
        }
        if right.is_empty() {
            return self;
        }
        match self {
            Self::Both(a, b) => (*a).both((*b).both(right)),
            left => Self::Both(Box::new(left), Box::new(right)),
        }
    }

    /// True if the cause contains no failure, defect or interruption.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Fail(_) | Self::Die(_) | Self::Interrupt(_) => false,
            Self::Then(l, r) | Self::Both(l, r) => l.is_empty() && r.is_empty(),
        }
    }

    /// True if at least one typed failure is present.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.any_leaf(&mut |c| matches!(c, Self::Fail(_)))
    }

    /// True if at least one defect is present.
    #[must_use]
    pub fn is_die(&self) -> bool {
        self.any_leaf(&mut |c| matches!(c, Self::Die(_)))
    }

    /// True if at least one interruption is present.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.any_leaf(&mut |c| matches!(c, Self::Interrupt(_)))
    }

    /// True if the cause is non-empty and every leaf is an interruption.
    #[must_use]
    pub fn is_interrupted_only(&self) -> bool {
        !self.is_empty() && !self.any_leaf(&mut |c| matches!(c, Self::Fail(_) | Self::Die(_)))
    }

    /// All typed failures, left to right.
    #[must_use]
    pub fn failures(&self) -> Vec<&E> {
        let mut out = Vec::new();
        self.collect_failures(&mut out);
        out
    }

    /// The leftmost typed failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&E> {
        match self {
            Self::Fail(e) => Some(e),
            Self::Empty | Self::Die(_) | Self::Interrupt(_) => None,
            Self::Then(l, r) | Self::Both(l, r) => l.failure().or_else(|| r.failure()),
        }
    }

    /// The leftmost interruptor, i.e. the first one recorded.
    #[must_use]
    pub fn first_interruptor(&self) -> Option<FiberId> {
        match self {
            Self::Interrupt(id) => Some(*id),
            Self::Empty | Self::Fail(_) | Self::Die(_) => None,
            Self::Then(l, r) | Self::Both(l, r) => {
                l.first_interruptor().or_else(|| r.first_interruptor())
            }
        }
    }

    /// All defects, left to right.
    #[must_use]
    pub fn defects(&self) -> Vec<&Defect> {
        let mut out = Vec::new();
        self.collect_defects(&mut out);
        out
    }

    /// The set of fibers that interrupted this computation.
    #[must_use]
    pub fn interruptors(&self) -> BTreeSet<FiberId> {
        let mut out = BTreeSet::new();
        self.collect_interruptors(&mut out);
        out
    }

    /// Removes typed failures, keeping defects and interruptions.
    ///
    /// Applied to the cause flowing past handlers that were discarded while
    /// the fiber was being interrupted: those handlers never see the
    /// failure, and nothing downstream should either.
    #[must_use]
    pub fn strip_failures(&self) -> Self {
        match self {
            Self::Empty | Self::Fail(_) => Self::Empty,
            Self::Die(d) => Self::Die(d.clone()),
            Self::Interrupt(id) => Self::Interrupt(*id),
            Self::Then(l, r) => l.strip_failures().then(r.strip_failures()),
            Self::Both(l, r) => l.strip_failures().both(r.strip_failures()),
        }
    }

    /// Maps every typed failure.
    pub fn map<F>(self, mut f: impl FnMut(E) -> F) -> Cause<F> {
        self.flat_map(&mut |e| Cause::Fail(f(e)))
    }

    /// Replaces every typed failure with a whole cause.
    pub fn flat_map<F>(self, f: &mut impl FnMut(E) -> Cause<F>) -> Cause<F> {
        match self {
            Self::Empty => Cause::Empty,
            Self::Fail(e) => f(e),
            Self::Die(d) => Cause::Die(d),
            Self::Interrupt(id) => Cause::Interrupt(id),
            Self::Then(l, r) => l.flat_map(f).then(r.flat_map(f)),
            Self::Both(l, r) => l.flat_map(f).both(r.flat_map(f)),
        }
    }

    fn any_leaf(&self, pred: &mut impl FnMut(&Self) -> bool) -> bool {
        match self {
            Self::Then(l, r) | Self::Both(l, r) => l.any_leaf(pred) || r.any_leaf(pred),
            leaf => pred(leaf),
        }
    }

    fn collect_failures<'a>(&'a self, out: &mut Vec<&'a E>) {
        match self {
            Self::Fail(e) => out.push(e),
            Self::Then(l, r) | Self::Both(l, r) => {
                l.collect_failures(out);
                r.collect_failures(out);
            }
            Self::Empty | Self::Die(_) | Self::Interrupt(_) => {}
        }
    }

    fn collect_defects<'a>(&'a self, out: &mut Vec<&'a Defect>) {
        match self {
            Self::Die(d) => out.push(d),
            Self::Then(l, r) | Self::Both(l, r) => {
                l.collect_defects(out);
                r.collect_defects(out);
            }
            Self::Empty | Self::Fail(_) | Self::Interrupt(_) => {}
        }
    }

    fn collect_interruptors(&self, out: &mut BTreeSet<FiberId>) {
        match self {
            Self::Interrupt(id) => {
                out.insert(*id);
            }
            Self::Then(l, r) | Self::Both(l, r) => {
                l.collect_interruptors(out);
                r.collect_interruptors(out);
            }
            Self::Empty | Self::Fail(_) | Self::Die(_) => {}
        }
    }
}

impl<E: PartialEq> Cause<E> {
    /// True if `that` equals this cause or any of its sub-causes.
    #[must_use]
    pub fn contains(&self, that: &Self) -> bool {
        if self == that {
            return true;
        }
        match self {
            Self::Then(l, r) | Self::Both(l, r) => l.contains(that) || r.contains(that),
            Self::Empty | Self::Fail(_) | Self::Die(_) | Self::Interrupt(_) => false,
        }
    }
}

impl Cause<Infallible> {
    /// Widens a failure-free cause to any error type.
    #[must_use]
    pub fn widen<E>(self) -> Cause<E> {
        self.map(|never| match never {})
    }
}

impl<E: fmt::Display> fmt::Display for Cause<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Fail(e) => write!(f, "Fail({e})"),
            Self::Die(d) => write!(f, "Die({})", d.message()),
            Self::Interrupt(id) => write!(f, "Interrupt({id})"),
            Self::Then(l, r) => write!(f, "({l} ; {r})"),
            Self::Both(l, r) => write!(f, "({l} | {r})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Time;

    fn fid() -> FiberId {
        FiberId::new(Time::ZERO)
    }

    #[test]
    fn empty_is_identity() {
        let c: Cause<&str> = Cause::fail("a");
        assert_eq!(Cause::Empty.then(c.clone()), c);
        assert_eq!(c.clone().then(Cause::Empty), c);
        assert_eq!(Cause::Empty.both(c.clone()), c);
        assert_eq!(c.clone().both(Cause::Empty), c);
    }

    #[test]
    fn first_interruptor_follows_recording_order() {
        let (low, high) = (fid(), fid());
        let cause: Cause<u8> = Cause::fail(1)
            .then(Cause::interrupt(high))
            .both(Cause::interrupt(low));
        assert_eq!(cause.first_interruptor(), Some(high));
        assert_eq!(cause.interruptors().into_iter().next(), Some(low));
        assert_eq!(Cause::<u8>::fail(1).first_interruptor(), None);
    }

    #[test]
    fn composition_is_associative() {
        let (a, b, c) = (Cause::fail(1), Cause::die(Defect::new("x")), Cause::interrupt(fid()));
        assert_eq!(
            a.clone().then(b.clone()).then(c.clone()),
            a.clone().then(b.clone().then(c.clone()))
        );
        assert_eq!(a.clone().both(b.clone()).both(c.clone()), a.both(b.both(c)));
    }

    #[test]
    fn unnormalized_input_is_normalized() {
        let raw: Cause<i32> = Cause::Then(
            Box::new(Cause::Then(Box::new(Cause::fail(1)), Box::new(Cause::fail(2)))),
            Box::new(Cause::Empty),
        );
        let normalized = raw.then(Cause::fail(3));
        assert_eq!(
            normalized,
            Cause::fail(1).then(Cause::fail(2).then(Cause::fail(3)))
        );
    }

    #[test]
    fn strip_failures_keeps_interrupts_and_defects() {
        let id = fid();
        let c = Cause::fail("e")
            .then(Cause::interrupt(id))
            .both(Cause::die(Defect::new("d")));
        let stripped = c.strip_failures();
        assert!(!stripped.is_failure());
        assert!(stripped.is_interrupted());
        assert!(stripped.is_die());
        assert_eq!(stripped, Cause::interrupt(id).both(Cause::die(Defect::new("d"))));
        assert!(Cause::fail("only").strip_failures().is_empty());
    }

    #[test]
    fn queries() {
        let (a, b) = (fid(), fid());
        let c = Cause::fail("x")
            .then(Cause::interrupt(b))
            .both(Cause::interrupt(a))
            .then(Cause::interrupt(a));
        assert_eq!(c.failures(), vec![&"x"]);
        assert_eq!(c.failure(), Some(&"x"));
        assert_eq!(c.interruptors().into_iter().collect::<Vec<_>>(), vec![a, b]);
        assert!(!c.is_interrupted_only());
        assert!(Cause::<()>::interrupt(a).then(Cause::interrupt(b)).is_interrupted_only());
        assert!(!Cause::<()>::Empty.is_interrupted_only());
    }

    #[test]
    fn contains_finds_subcauses() {
        let id = fid();
        let c = Cause::fail(1).then(Cause::interrupt(id));
        assert!(c.contains(&Cause::interrupt(id)));
        assert!(c.contains(&c.clone()));
        assert!(!c.contains(&Cause::fail(2)));
    }

    #[test]
    fn map_and_widen() {
        let c = Cause::fail(2).both(Cause::fail(3)).map(|n| n * 10);
        assert_eq!(c.failures(), vec![&20, &30]);
        let never: Cause<Infallible> = Cause::interrupt(FiberId::NONE);
        let widened: Cause<String> = never.widen();
        assert_eq!(widened, Cause::interrupt(FiberId::NONE));
    }

    #[test]
    fn display() {
        let c = Cause::fail("boom").then(Cause::interrupt(FiberId::NONE));
        assert_eq!(c.to_string(), "(Fail(boom) ; Interrupt(F-none))");
    }
}
