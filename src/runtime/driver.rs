//! The cooperative host loop shared by the live and lab runtimes.
//!
//! A [`Driver`] owns the ready queue and the timer heap. It is both the
//! [`Scheduler`] fibers dispatch onto and the [`Clock`] they sleep on. Who
//! calls [`Driver::turn`] differs: the live runtime runs it on a dedicated
//! host thread against the monotonic clock, the lab runtime runs it on the
//! test thread against virtual time.
//!
//! Timer callbacks and tasks always run with the driver lock released, so a
//! task may dispatch more tasks or schedule timers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::timer::TimerHeap;
use super::{Scheduler, Task};
use crate::services::{Clock, TimerKey};
use crate::types::Time;
use crate::util::DetRng;

#[derive(Debug)]
enum TimeSource {
    Real(Instant),
    Virtual(AtomicU64),
}

struct DriverState {
    ready: VecDeque<Task>,
    timers: TimerHeap,
    shuffle: Option<DetRng>,
    shutdown: bool,
}

impl DriverState {
    fn pop_ready(&mut self) -> Option<Task> {
        match &mut self.shuffle {
            Some(rng) if self.ready.len() > 1 => {
                let index = rng.next_usize(self.ready.len());
                self.ready.remove(index)
            }
            _ => self.ready.pop_front(),
        }
    }
}

/// Outcome of one [`Driver::turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Turn {
    /// A task or a batch of expired timers ran.
    Ran,
    /// Nothing to do now; the earliest pending deadline, if any.
    Idle(Option<Time>),
    /// The driver was shut down.
    Shutdown,
}

/// Ready queue, timers and time source.
pub(crate) struct Driver {
    state: Mutex<DriverState>,
    wake: Condvar,
    time: TimeSource,
    dispatched: AtomicU64,
}

impl Driver {
    /// A driver on the monotonic clock, dispatching first-in first-out.
    pub(crate) fn real() -> Self {
        Self::with_time(TimeSource::Real(Instant::now()), None)
    }

    /// A driver on virtual time starting at zero, optionally shuffling the
    /// ready queue.
    pub(crate) fn virtual_time(shuffle: Option<DetRng>) -> Self {
        Self::with_time(TimeSource::Virtual(AtomicU64::new(0)), shuffle)
    }

    fn with_time(time: TimeSource, shuffle: Option<DetRng>) -> Self {
        Self {
            state: Mutex::new(DriverState {
                ready: VecDeque::new(),
                timers: TimerHeap::new(),
                shuffle,
                shutdown: false,
            }),
            wake: Condvar::new(),
            time,
            dispatched: AtomicU64::new(0),
        }
    }

    /// Total number of `dispatch_later` calls so far.
    pub(crate) fn dispatch_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Number of tasks waiting to run.
    pub(crate) fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Number of pending timers.
    pub(crate) fn timer_len(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Runs expired timers, or else one ready task.
    pub(crate) fn turn(&self) -> Turn {
        let now = self.now();
        let (expired, task) = {
            let mut state = self.state.lock();
            if state.shutdown {
                return Turn::Shutdown;
            }
            let expired = state.timers.pop_expired(now);
            if expired.is_empty() {
                match state.pop_ready() {
                    Some(task) => (expired, Some(task)),
                    None => return Turn::Idle(state.timers.peek_deadline()),
                }
            } else {
                (expired, None)
            }
        };
        for callback in expired {
            callback();
        }
        if let Some(task) = task {
            task();
        }
        Turn::Ran
    }

    /// Blocks the calling thread until a task is ready, the earliest timer
    /// is due, or the driver shuts down.
    pub(crate) fn park(&self) {
        let mut state = self.state.lock();
        if state.shutdown || !state.ready.is_empty() {
            return;
        }
        match state.timers.peek_deadline() {
            Some(deadline) => {
                let now = self.now();
                if deadline > now {
                    let wait = deadline.duration_since(now);
                    self.wake.wait_for(&mut state, wait);
                }
            }
            None => self.wake.wait(&mut state),
        }
    }

    /// Moves virtual time to the earliest pending deadline. Returns false
    /// if there is none, or if time is real.
    pub(crate) fn advance_to_next_timer(&self) -> bool {
        let TimeSource::Virtual(nanos) = &self.time else {
            return false;
        };
        let deadline = self.state.lock().timers.peek_deadline();
        match deadline {
            Some(deadline) => {
                nanos.fetch_max(deadline.as_nanos(), Ordering::AcqRel);
                true
            }
            None => false,
        }
    }

    /// Moves virtual time forward by `by`. No effect on a real clock.
    pub(crate) fn advance(&self, by: Duration) {
        if let TimeSource::Virtual(nanos) = &self.time {
            let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
            let _ = nanos.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(by))
            });
        }
    }

    /// True once [`Driver::shutdown`] ran.
    pub(crate) fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Stops the loop and drops every queued task and timer.
    pub(crate) fn shutdown(&self) {
        let (ready, timers) = {
            let mut state = self.state.lock();
            state.shutdown = true;
            (
                std::mem::take(&mut state.ready),
                std::mem::take(&mut state.timers),
            )
        };
        self.wake.notify_all();
        drop(ready);
        drop(timers);
    }
}

impl Scheduler for Driver {
    fn dispatch_later(&self, task: Task) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        state.ready.push_back(task);
        drop(state);
        self.wake.notify_one();
    }
}

impl Clock for Driver {
    fn now(&self) -> Time {
        match &self.time {
            TimeSource::Real(start) => {
                let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
                Time::from_nanos(nanos)
            }
            TimeSource::Virtual(nanos) => Time::from_nanos(nanos.load(Ordering::Acquire)),
        }
    }

    fn schedule(&self, delay: Duration, callback: Task) -> TimerKey {
        let deadline = self.now() + delay;
        let key = self.state.lock().timers.insert(deadline, callback);
        self.wake.notify_one();
        key
    }

    fn cancel(&self, key: TimerKey) -> bool {
        self.state.lock().timers.cancel(key)
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Driver")
            .field("time", &self.time)
            .field("ready", &state.ready.len())
            .field("timers", &state.timers)
            .field("shutdown", &state.shutdown)
            .field("dispatched", &self.dispatch_count())
            .finish()
    }
}
