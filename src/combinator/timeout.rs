//! Deadlines.

use std::time::Duration;

use crate::effect::{Data, Effect};
use crate::types::Exit;

impl<A: Data, E: Data> Effect<A, E> {
    /// Returns `None` if this effect does not finish within `duration`, in
    /// which case it is interrupted. Failures that happen in time are kept.
    pub fn timeout(self, duration: Duration) -> Effect<Option<A>, E> {
        let work = self.map(Some).exit();
        let deadline = Effect::sleep(duration)
            .interruptible()
            .as_value(Exit::succeed(None));
        work.race(deadline).widen().flat_map(Effect::done)
    }

    /// Like [`Effect::timeout`], failing with `error` on expiry.
    pub fn timeout_fail(self, error: E, duration: Duration) -> Self {
        self.timeout(duration).flat_map(move |found| match found {
            Some(a) => Effect::succeed(a),
            None => Effect::fail(error.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::{LabConfig, LabRuntime};
    use crate::services::now;
    use crate::test_utils::init_test_logging;
    use crate::types::Time;

    fn lab() -> LabRuntime {
        LabRuntime::new(LabConfig::new(3))
    }

    #[test]
    fn finishes_in_time() {
        init_test_logging();
        let e = Effect::<i32, String>::succeed(9)
            .delay(Duration::from_millis(10))
            .timeout(Duration::from_millis(100));
        assert_eq!(lab().block_on(e).unwrap(), Exit::succeed(Some(9)));
    }

    #[test]
    fn expires_and_stops_waiting() {
        init_test_logging();
        crate::test_phase!("expires_and_stops_waiting");
        let e = Effect::<i32, String>::never()
            .timeout(Duration::from_millis(25))
            .zip(now().widen());
        assert_eq!(
            lab().block_on(e).unwrap(),
            Exit::succeed((None, Time::from_millis(25)))
        );
        crate::test_complete!("expires_and_stops_waiting");
    }

    #[test]
    fn failure_in_time_is_kept() {
        init_test_logging();
        let e = Effect::<i32, String>::fail("bad".to_string()).timeout(Duration::from_secs(1));
        assert_eq!(lab().block_on(e).unwrap(), Exit::fail("bad".to_string()));
    }

    #[test]
    fn timeout_fail_uses_the_given_error() {
        init_test_logging();
        let e = Effect::<i32, String>::never()
            .timeout_fail("late".to_string(), Duration::from_millis(1));
        assert_eq!(lab().block_on(e).unwrap(), Exit::fail("late".to_string()));
    }
}
