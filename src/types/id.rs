//! Identifier and time types.
//!
//! [`FiberId`] tags every fiber and every interruption cause. [`Time`] is the
//! runtime's logical clock reading: wall-clock based in the live runtime,
//! virtual in the lab runtime.

use core::fmt;
use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static FIBER_SEQ: AtomicU64 = AtomicU64::new(1);

/// A process-unique fiber identifier.
///
/// Ordering is by start time, then by sequence number, so ids sort in
/// creation order within one runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId {
    start_millis: u64,
    seq: u64,
}

impl FiberId {
    /// The id used when interruption comes from outside any fiber, e.g. a
    /// host calling a runtime canceler.
    pub const NONE: Self = Self {
        start_millis: 0,
        seq: 0,
    };

    /// Allocates a fresh id stamped with `start`.
    #[must_use]
    pub fn new(start: Time) -> Self {
        Self {
            start_millis: start.as_millis(),
            seq: FIBER_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Millisecond timestamp taken when the fiber was created.
    #[must_use]
    pub const fn start_millis(self) -> u64 {
        self.start_millis
    }

    /// Process-wide sequence number.
    #[must_use]
    pub const fn seq(self) -> u64 {
        self.seq
    }

    /// True for [`FiberId::NONE`].
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.seq == 0
    }
}

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FiberId({}@{}ms)", self.seq, self.start_millis)
    }
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("F-none")
        } else {
            write!(f, "F{}", self.seq)
        }
    }
}

/// A logical timestamp in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(u64);

impl Time {
    /// The zero instant.
    pub const ZERO: Self = Self(0);

    /// The largest representable instant.
    pub const MAX: Self = Self(u64::MAX);

    /// From nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// From milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// From seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Milliseconds, truncated.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    /// Adds nanoseconds, saturating.
    #[must_use]
    pub const fn saturating_add_nanos(self, nanos: u64) -> Self {
        Self(self.0.saturating_add(nanos))
    }

    /// Time elapsed since `earlier`, zero if `earlier` is later.
    #[must_use]
    pub const fn duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Time {
    type Output = Self;

    #[allow(clippy::cast_possible_truncation)]
    fn add(self, rhs: Duration) -> Self::Output {
        self.saturating_add_nanos(rhs.as_nanos().min(u128::from(u64::MAX)) as u64)
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({}ns)", self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000_000_000 {
            write!(
                f,
                "{}.{:03}s",
                self.0 / 1_000_000_000,
                (self.0 / 1_000_000) % 1000
            )
        } else if self.0 >= 1_000_000 {
            write!(f, "{}ms", self.0 / 1_000_000)
        } else if self.0 >= 1_000 {
            write!(f, "{}us", self.0 / 1_000)
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}
