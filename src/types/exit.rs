//! Terminal outcome of a fiber.
//!
//! An [`Exit`] is either a success value or a [`Cause`] describing why the
//! computation did not succeed. Exits are immutable once produced; a fiber's
//! exit is shared by every observer of that fiber.

use core::fmt;

use super::{Cause, Defect, FiberId};

/// How a computation terminated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Exit<A, E> {
    /// Completed with a value.
    Success(A),
    /// Did not complete; the cause says why.
    Failure(Cause<E>),
}

impl<A, E> Exit<A, E> {
    /// A successful exit.
    #[must_use]
    pub const fn succeed(value: A) -> Self {
        Self::Success(value)
    }

    /// A failed exit with a single typed failure.
    #[must_use]
    pub const fn fail(error: E) -> Self {
        Self::Failure(Cause::Fail(error))
    }

    /// A failed exit with a single defect.
    #[must_use]
    pub const fn die(defect: Defect) -> Self {
        Self::Failure(Cause::Die(defect))
    }

    /// An exit interrupted by `id`.
    #[must_use]
    pub const fn interrupt(id: FiberId) -> Self {
        Self::Failure(Cause::Interrupt(id))
    }

    /// A failed exit with an arbitrary cause.
    #[must_use]
    pub const fn halt(cause: Cause<E>) -> Self {
        Self::Failure(cause)
    }

    /// Severity for ranking exits: 0 success, 1 typed failure,
    /// 2 interruption, 3 defect. A composite cause ranks as its worst part.
    #[must_use]
    pub fn severity(&self) -> u8 {
        match self {
            Self::Success(_) => 0,
            Self::Failure(c) if c.is_die() => 3,
            Self::Failure(c) if c.is_interrupted() => 2,
            Self::Failure(_) => 1,
        }
    }

    /// True for [`Exit::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// True for [`Exit::Failure`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// True if the exit is a failure whose cause contains an interruption.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Failure(c) if c.is_interrupted())
    }

    /// The success value, if any.
    #[must_use]
    pub const fn success(&self) -> Option<&A> {
        match self {
            Self::Success(a) => Some(a),
            Self::Failure(_) => None,
        }
    }

    /// The failure cause, if any.
    #[must_use]
    pub const fn cause(&self) -> Option<&Cause<E>> {
        match self {
            Self::Success(_) => None,
            Self::Failure(c) => Some(c),
        }
    }

    /// Maps the success value.
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> Exit<B, E> {
        match self {
            Self::Success(a) => Exit::Success(f(a)),
            Self::Failure(c) => Exit::Failure(c),
        }
    }

    /// Maps every typed failure in the cause.
    pub fn map_err<F>(self, f: impl FnMut(E) -> F) -> Exit<A, F> {
        match self {
            Self::Success(a) => Exit::Success(a),
            Self::Failure(c) => Exit::Failure(c.map(f)),
        }
    }

    /// Maps the whole cause.
    pub fn map_cause<F>(self, f: impl FnOnce(Cause<E>) -> Cause<F>) -> Exit<A, F> {
        match self {
            Self::Success(a) => Exit::Success(a),
            Self::Failure(c) => Exit::Failure(f(c)),
        }
    }

    /// Combines two exits. Two successes are merged with `f`; failures are
    /// composed with [`Cause::both`] when `parallel`, otherwise with
    /// [`Cause::then`], keeping left before right.
    pub fn zip_with<B, C>(
        self,
        that: Exit<B, E>,
        parallel: bool,
        f: impl FnOnce(A, B) -> C,
    ) -> Exit<C, E> {
        match (self, that) {
            (Self::Success(a), Exit::Success(b)) => Exit::Success(f(a, b)),
            (Self::Failure(c), Exit::Success(_)) | (Self::Success(_), Exit::Failure(c)) => {
                Exit::Failure(c)
            }
            (Self::Failure(l), Exit::Failure(r)) => {
                Exit::Failure(if parallel { l.both(r) } else { l.then(r) })
            }
        }
    }

    /// Converts into a `Result`, keeping the full cause on failure.
    pub fn into_result(self) -> Result<A, Cause<E>> {
        match self {
            Self::Success(a) => Ok(a),
            Self::Failure(c) => Err(c),
        }
    }

    /// Returns the success value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the exit is a failure.
    #[track_caller]
    pub fn unwrap(self) -> A
    where
        E: fmt::Debug,
    {
        match self {
            Self::Success(a) => a,
            Self::Failure(c) => panic!("called `Exit::unwrap()` on a `Failure` value: {c:?}"),
        }
    }

    /// Returns the success value or `default`.
    pub fn unwrap_or(self, default: A) -> A {
        match self {
            Self::Success(a) => a,
            Self::Failure(_) => default,
        }
    }
}

impl<A, E> From<Result<A, E>> for Exit<A, E> {
    fn from(result: Result<A, E>) -> Self {
        match result {
            Ok(a) => Self::Success(a),
            Err(e) => Self::fail(e),
        }
    }
}

impl<A: fmt::Display, E: fmt::Display> fmt::Display for Exit<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(a) => write!(f, "Success({a})"),
            Self::Failure(c) => write!(f, "Failure({c})"),
        }
    }
}
