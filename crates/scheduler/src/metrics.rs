use std::collections::HashMap;

use serde::Serialize;

use crate::priority::PriorityLevel;

/// Scheduler operational counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Tasks submitted, ready or delayed.
    pub tasks_scheduled: u64,
    /// Tasks whose callback ran to completion.
    pub tasks_executed: u64,
    /// Completed tasks by priority level.
    pub executed_by_priority: HashMap<PriorityLevel, u64>,
    /// Cancelled tasks dropped when traversal reached them.
    pub tombstones_discarded: u64,
    /// Callbacks that returned a continuation.
    pub continuations: u64,
    /// Times the work loop stopped because the slice ran out.
    pub yields: u64,
    /// Delayed tasks moved into the ready queue.
    pub timers_promoted: u64,
    /// Work loop entries.
    pub flushes: u64,
    /// Host timeouts armed.
    pub host_timeouts_armed: u64,
    /// Callbacks that returned an error.
    pub callback_failures: u64,
}

impl SchedulerMetrics {
    /// Record a task that finished without a continuation.
    pub fn record_execution(&mut self, priority: PriorityLevel) {
        self.tasks_executed += 1;
        *self.executed_by_priority.entry(priority).or_default() += 1;
    }
}
