//! What every fiber of one runtime shares.

use std::sync::Arc;

use super::Scheduler;
use crate::services::Clock;
use crate::supervision::Supervisor;

/// Shared runtime services seen by the executor.
pub(crate) struct Platform {
    pub(crate) scheduler: Arc<dyn Scheduler>,
    /// Stamps fiber ids.
    pub(crate) clock: Arc<dyn Clock>,
    /// Instructions a fiber may run in one turn before it yields.
    pub(crate) max_ops: usize,
    /// Log fibers that end with a defect.
    pub(crate) report_failures: bool,
    /// Supervisor of root fibers.
    pub(crate) supervisor: Arc<dyn Supervisor>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("max_ops", &self.max_ops)
            .field("report_failures", &self.report_failures)
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}
