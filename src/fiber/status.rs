//! Observable fiber status.

use core::fmt;

use crate::types::FiberId;

/// Where a fiber is in its lifecycle.
///
/// `Suspended` keeps the status it replaced in `previous`, so nested async
/// regions form a stack that unwinds as the fiber resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FiberStatus {
    /// Interpreting instructions.
    Running {
        /// Interruption has begun and the fiber is unwinding.
        interrupting: bool,
    },
    /// Closing its scope and running finalizers.
    Finishing {
        /// Interruption has begun and the fiber is unwinding.
        interrupting: bool,
    },
    /// Waiting for an async registration to resume it.
    Suspended {
        /// The status before suspension.
        previous: Box<FiberStatus>,
        /// Whether an interrupt request resumes the fiber immediately.
        interruptible: bool,
        /// Identifies this suspension; resumes for other epochs are ignored.
        epoch: u64,
        /// Fibers this suspension waits on, for diagnostics.
        blocking_on: Vec<FiberId>,
    },
    /// Finished.
    Done,
}

impl FiberStatus {
    /// True once interruption has begun.
    #[must_use]
    pub fn is_interrupting(&self) -> bool {
        match self {
            Self::Running { interrupting } | Self::Finishing { interrupting } => *interrupting,
            Self::Suspended { previous, .. } => previous.is_interrupting(),
            Self::Done => false,
        }
    }

    /// The same status with the interrupting flag replaced.
    #[must_use]
    pub fn with_interrupting(self, interrupting: bool) -> Self {
        match self {
            Self::Running { .. } => Self::Running { interrupting },
            Self::Finishing { .. } => Self::Finishing { interrupting },
            Self::Suspended {
                previous,
                interruptible,
                epoch,
                blocking_on,
            } => Self::Suspended {
                previous: Box::new(previous.with_interrupting(interrupting)),
                interruptible,
                epoch,
                blocking_on,
            },
            Self::Done => Self::Done,
        }
    }

    /// True for [`FiberStatus::Done`].
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// True for [`FiberStatus::Suspended`].
    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }
}

impl Default for FiberStatus {
    fn default() -> Self {
        Self::Running {
            interrupting: false,
        }
    }
}

impl fmt::Display for FiberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running { interrupting } => write!(f, "Running(interrupting={interrupting})"),
            Self::Finishing { interrupting } => {
                write!(f, "Finishing(interrupting={interrupting})")
            }
            Self::Suspended {
                interruptible,
                epoch,
                blocking_on,
                ..
            } => {
                write!(f, "Suspended(epoch={epoch}, interruptible={interruptible}")?;
                if !blocking_on.is_empty() {
                    f.write_str(", on=[")?;
                    for (i, id) in blocking_on.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{id}")?;
                    }
                    f.write_str("]")?;
                }
                f.write_str(")")
            }
            Self::Done => f.write_str("Done"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suspended(previous: FiberStatus) -> FiberStatus {
        FiberStatus::Suspended {
            previous: Box::new(previous),
            interruptible: true,
            epoch: 3,
            blocking_on: Vec::new(),
        }
    }

    #[test]
    fn interrupting_flag_follows_the_stack() {
        let s = suspended(FiberStatus::Running { interrupting: false });
        assert!(!s.is_interrupting());
        let s = s.with_interrupting(true);
        assert!(s.is_interrupting());
        match s {
            FiberStatus::Suspended { previous, epoch, .. } => {
                assert_eq!(epoch, 3);
                assert_eq!(*previous, FiberStatus::Running { interrupting: true });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn done_is_never_interrupting() {
        assert!(!FiberStatus::Done.with_interrupting(true).is_interrupting());
        assert!(FiberStatus::Done.is_done());
    }

    #[test]
    fn display() {
        assert_eq!(FiberStatus::default().to_string(), "Running(interrupting=false)");
        assert_eq!(
            suspended(FiberStatus::default()).to_string(),
            "Suspended(epoch=3, interruptible=true)"
        );
    }
}
