//! The scheduling seam between fibers and the host loop.

/// A unit of work handed to the host loop.
pub type Task = Box<dyn FnOnce() + Send>;

/// Runs tasks on a later turn of the host loop.
///
/// Implementations must never run `task` synchronously inside
/// `dispatch_later`: the caller may hold a fiber's machine lock. No
/// ordering between tasks is promised, only that each one eventually runs.
pub trait Scheduler: Send + Sync {
    /// Queues `task` for a later turn.
    fn dispatch_later(&self, task: Task);
}
