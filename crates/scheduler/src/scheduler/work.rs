use std::rc::Rc;

use coslice_core::SchedulerError;
use tracing::{debug, trace, warn};

use crate::host::{Host, Timestamp};
use crate::priority::PriorityLevel;
use crate::task::{Continuation, RunContext, Task, TaskCallback};

use super::core::SchedulerInner;

/// Holds the "performing work" flag for the duration of a flush and restores
/// the current task and priority on every exit path, unwinding included.
struct WorkGuard<'a, H: Host> {
    inner: &'a SchedulerInner<H>,
    previous_priority: PriorityLevel,
}

impl<'a, H: Host> WorkGuard<'a, H> {
    fn enter(inner: &'a SchedulerInner<H>) -> Self {
        let previous_priority = {
            let mut state = inner.state.borrow_mut();
            state.is_performing_work = true;
            state.current_priority
        };
        Self {
            inner,
            previous_priority,
        }
    }
}

impl<H: Host> Drop for WorkGuard<'_, H> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.state.try_borrow_mut() {
            state.current_task = None;
            state.current_priority = self.previous_priority;
            state.is_performing_work = false;
        }
    }
}

impl<H: Host> SchedulerInner<H> {
    /// Host callback body: run ready tasks until the queue drains or the
    /// slice runs out. Returns whether more work remains.
    pub(super) fn flush_work(
        &self,
        has_time_remaining: bool,
        initial_time: Timestamp,
    ) -> Result<bool, SchedulerError> {
        self.state.borrow_mut().is_host_callback_scheduled = false;
        // Ready work runs now; the pending promotion is redone by the loop.
        self.cancel_host_timeout();

        let _guard = WorkGuard::enter(self);
        self.metrics.borrow_mut().flushes += 1;
        trace!(initial_time, "flush started");
        self.work_loop(has_time_remaining, initial_time)
    }

    fn peek_ready(&self) -> Option<Rc<Task>> {
        self.state.borrow().task_queue.peek().cloned()
    }

    fn pop_if_root(&self, task: &Rc<Task>) {
        let mut state = self.state.borrow_mut();
        if state.task_queue.peek().is_some_and(|root| Rc::ptr_eq(root, task)) {
            state.task_queue.pop();
        }
    }

    fn work_loop(
        &self,
        has_time_remaining: bool,
        initial_time: Timestamp,
    ) -> Result<bool, SchedulerError> {
        let mut current_time = initial_time;
        self.advance_timers(current_time);

        while let Some(task) = self.peek_ready() {
            if task.expiration_time > current_time
                && (!has_time_remaining || self.should_yield_to_host())
            {
                debug!(task_id = task.id, current_time, "slice exhausted, yielding to host");
                self.metrics.borrow_mut().yields += 1;
                return Ok(true);
            }

            let callback = task.callback.borrow_mut().take();
            let Some(callback) = callback else {
                trace!(task_id = task.id, "discarding cancelled task");
                self.state.borrow_mut().task_queue.pop();
                self.metrics.borrow_mut().tombstones_discarded += 1;
                continue;
            };

            {
                let mut state = self.state.borrow_mut();
                state.current_task = Some(Rc::clone(&task));
                state.current_priority = task.priority;
            }
            let context = RunContext {
                did_timeout: task.expiration_time <= current_time,
                has_time_remaining,
                current_time,
            };
            trace!(task_id = task.id, priority = %task.priority, did_timeout = context.did_timeout, "running task");

            let result = callback(context);
            current_time = self.host.now();

            match result {
                Ok(Continuation::Resume(next)) => {
                    *task.callback.borrow_mut() = TaskCallback::Continuation(next);
                    self.metrics.borrow_mut().continuations += 1;
                    trace!(task_id = task.id, "task returned a continuation");
                    self.advance_timers(current_time);
                    return Ok(true);
                }
                Ok(Continuation::Done) => {
                    self.pop_if_root(&task);
                    self.metrics.borrow_mut().record_execution(task.priority);
                    self.advance_timers(current_time);
                }
                Err(source) => {
                    self.metrics.borrow_mut().callback_failures += 1;
                    warn!(task_id = task.id, "task callback failed: {}", source);
                    return Err(SchedulerError::Task {
                        task_id: task.id,
                        source,
                    });
                }
            }
        }

        if let Some(delay) = self.next_timer_delay(current_time) {
            self.rearm_host_timeout(delay);
        }
        trace!(current_time, "ready queue drained");
        Ok(false)
    }

    /// True once the current slice has lasted at least the yield interval.
    pub(super) fn should_yield_to_host(&self) -> bool {
        let slice_start = self.driver.borrow().slice_start;
        let yield_interval = self.state.borrow().yield_interval;
        self.host.now().saturating_sub(slice_start) >= yield_interval
    }
}
