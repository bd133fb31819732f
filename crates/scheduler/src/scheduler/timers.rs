use tracing::{debug, trace};

use crate::host::{Host, Timestamp};

use super::core::SchedulerInner;

impl<H: Host> SchedulerInner<H> {
    /// Move every delayed task whose start time has passed into the ready
    /// queue, dropping cancelled timers on the way.
    pub(super) fn advance_timers(&self, current_time: Timestamp) {
        let mut promoted = 0;
        let mut discarded = 0;
        {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            while let Some(timer) = state.timer_queue.peek() {
                if timer.is_cancelled() {
                    state.timer_queue.pop();
                    discarded += 1;
                } else if timer.start_time <= current_time {
                    if let Some(task) = state.timer_queue.pop() {
                        trace!(task_id = task.id, "timer promoted");
                        task.sort_index.set(task.expiration_time);
                        state.task_queue.push(task);
                        promoted += 1;
                    }
                } else {
                    break;
                }
            }
        }

        if promoted > 0 || discarded > 0 {
            let mut metrics = self.metrics.borrow_mut();
            metrics.timers_promoted += promoted;
            metrics.tombstones_discarded += discarded;
        }
    }

    /// Arm the host timeout. No-op while one is already outstanding.
    pub(super) fn request_host_timeout(&self, delay: Timestamp) {
        if self.state.borrow().host_timeout.is_some() {
            return;
        }

        let this = self.this.clone();
        let id = self.host.set_timeout(
            Box::new(move || {
                if let Some(inner) = this.upgrade() {
                    let now = inner.host.now();
                    inner.handle_timeout(now);
                }
            }),
            delay,
        );
        self.state.borrow_mut().host_timeout = Some(id);
        self.metrics.borrow_mut().host_timeouts_armed += 1;
        debug!(timeout_id = id, delay_ms = delay, "host timeout armed");
    }

    pub(super) fn cancel_host_timeout(&self) {
        let armed = self.state.borrow_mut().host_timeout.take();
        if let Some(id) = armed {
            self.host.clear_timeout(id);
            trace!(timeout_id = id, "host timeout cancelled");
        }
    }

    /// Replace any outstanding host timeout with one firing after `delay`.
    pub(super) fn rearm_host_timeout(&self, delay: Timestamp) {
        self.cancel_host_timeout();
        self.request_host_timeout(delay);
    }

    /// Host timeout fired: promote due timers, then either ask for a work
    /// turn or wait for the next timer.
    pub(super) fn handle_timeout(&self, current_time: Timestamp) {
        self.state.borrow_mut().host_timeout = None;
        self.advance_timers(current_time);

        let (has_ready, next_start) = {
            let state = self.state.borrow();
            if state.is_host_callback_scheduled {
                return;
            }
            (
                !state.task_queue.is_empty(),
                state.timer_queue.peek().map(|timer| timer.start_time),
            )
        };

        if has_ready {
            self.state.borrow_mut().is_host_callback_scheduled = true;
            self.request_host_callback();
        } else if let Some(next_start) = next_start {
            self.request_host_timeout(next_start.saturating_sub(current_time));
        }
    }

    /// Delay until the earliest delayed task starts, if any.
    pub(super) fn next_timer_delay(&self, current_time: Timestamp) -> Option<Timestamp> {
        self.state
            .borrow()
            .timer_queue
            .peek()
            .map(|timer| timer.start_time.saturating_sub(current_time))
    }
}
