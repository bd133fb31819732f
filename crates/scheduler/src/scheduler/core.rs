use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use coslice_core::{ConfigError, SchedulerConfig};
use tracing::{debug, error};

use crate::heap::MinHeap;
use crate::host::{Host, TimeoutId, Timestamp};
use crate::metrics::SchedulerMetrics;
use crate::priority::PriorityLevel;
use crate::task::{Callback, RunContext, Task, TaskCallback, TaskHandle, TaskId, TaskResult};

use super::driver::TurnDriver;

/// A cooperative, single-threaded scheduler.
///
/// Tasks are submitted with a [`PriorityLevel`] and an optional delay, and run
/// in short slices on the host's turns. Cloning yields another handle to the
/// same scheduler; independent schedulers are independent values.
pub struct Scheduler<H: Host> {
    pub(super) inner: Rc<SchedulerInner<H>>,
}

impl<H: Host> Clone for Scheduler<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

pub(super) struct SchedulerInner<H: Host> {
    /// Self reference handed to host turns and timeouts.
    pub(super) this: Weak<SchedulerInner<H>>,
    pub(super) host: H,
    pub(super) config: SchedulerConfig,
    pub(super) state: RefCell<SchedulerState>,
    pub(super) driver: RefCell<TurnDriver>,
    pub(super) metrics: RefCell<SchedulerMetrics>,
}

pub(super) struct SchedulerState {
    /// Ready tasks keyed by expiration time.
    pub(super) task_queue: MinHeap<Rc<Task>>,
    /// Delayed tasks keyed by start time.
    pub(super) timer_queue: MinHeap<Rc<Task>>,
    pub(super) next_task_id: TaskId,
    pub(super) current_task: Option<Rc<Task>>,
    pub(super) current_priority: PriorityLevel,
    pub(super) is_host_callback_scheduled: bool,
    pub(super) is_performing_work: bool,
    /// The one outstanding host timeout, if armed.
    pub(super) host_timeout: Option<TimeoutId>,
    /// Slice length in milliseconds.
    pub(super) yield_interval: Timestamp,
}

impl SchedulerState {
    fn new(yield_interval: Timestamp) -> Self {
        Self {
            task_queue: MinHeap::new(),
            timer_queue: MinHeap::new(),
            next_task_id: 1,
            current_task: None,
            current_priority: PriorityLevel::Normal,
            is_host_callback_scheduled: false,
            is_performing_work: false,
            host_timeout: None,
            yield_interval,
        }
    }
}

fn duration_to_millis(duration: Duration) -> Timestamp {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl<H: Host> Scheduler<H> {
    /// Create a scheduler with the default config.
    pub fn new(host: H) -> Self {
        Self::build(host, SchedulerConfig::default())
    }

    /// Create a scheduler with a validated config.
    pub fn with_config(host: H, config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(host, config))
    }

    fn build(host: H, config: SchedulerConfig) -> Self {
        debug!("Scheduler created (yield interval: {}ms)", config.yield_interval_ms);
        let state = SchedulerState::new(config.yield_interval_ms);
        let inner = Rc::new_cyclic(|this| SchedulerInner {
            this: this.clone(),
            host,
            config,
            state: RefCell::new(state),
            driver: RefCell::new(TurnDriver::default()),
            metrics: RefCell::new(SchedulerMetrics::default()),
        });
        Self { inner }
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// Current reading of the host clock.
    pub fn now(&self) -> Timestamp {
        self.inner.host.now()
    }

    /// Submit a task that is ready now.
    pub fn schedule_callback<F>(&self, priority: PriorityLevel, callback: F) -> TaskHandle
    where
        F: FnOnce(RunContext) -> TaskResult + 'static,
    {
        self.inner.schedule(priority, Box::new(callback), 0)
    }

    /// Submit a task that becomes eligible after `delay`.
    pub fn schedule_callback_with_delay<F>(
        &self,
        priority: PriorityLevel,
        callback: F,
        delay: Duration,
    ) -> TaskHandle
    where
        F: FnOnce(RunContext) -> TaskResult + 'static,
    {
        self.inner.schedule(priority, Box::new(callback), duration_to_millis(delay))
    }

    /// Cancel a task. The entry stays queued and is dropped when reached.
    /// No-op for tasks already cancelled or finished.
    pub fn cancel_callback(&self, handle: &TaskHandle) {
        let previous = std::mem::replace(
            &mut *handle.task().callback.borrow_mut(),
            TaskCallback::Cancelled,
        );
        if !previous.is_cancelled() {
            debug!(task_id = handle.id(), "task cancelled");
        }
    }

    /// Priority of the running task, or `Normal` outside of any task.
    pub fn current_priority_level(&self) -> PriorityLevel {
        self.inner.state.borrow().current_priority
    }

    /// Run `f` with the current priority level set to `priority`.
    pub fn run_with_priority<R>(&self, priority: PriorityLevel, f: impl FnOnce() -> R) -> R {
        let previous = std::mem::replace(&mut self.inner.state.borrow_mut().current_priority, priority);
        let _restore = PriorityRestore {
            state: &self.inner.state,
            previous,
        };
        f()
    }

    /// Run `f` at the current level, lowered to at most `Normal`.
    pub fn next<R>(&self, f: impl FnOnce() -> R) -> R {
        let priority = match self.current_priority_level() {
            PriorityLevel::Immediate | PriorityLevel::UserBlocking | PriorityLevel::Normal => {
                PriorityLevel::Normal
            }
            other => other,
        };
        self.run_with_priority(priority, f)
    }

    /// True once the current slice is used up. Long callbacks can poll this
    /// and return a continuation.
    pub fn should_yield(&self) -> bool {
        self.inner.should_yield_to_host()
    }

    /// The task at the head of the ready queue, if any.
    pub fn first_callback_node(&self) -> Option<TaskHandle> {
        self.inner
            .state
            .borrow()
            .task_queue
            .peek()
            .map(|task| TaskHandle::new(Rc::clone(task)))
    }

    /// Set the slice length to fit `fps` frames per second. `0` restores the
    /// configured default; rates above the configured maximum are ignored.
    pub fn force_frame_rate(&self, fps: u32) {
        let max = self.inner.config.max_frame_rate;
        if fps > max {
            error!(
                "force_frame_rate takes a frame rate between 0 and {}, got {}; ignoring",
                max, fps
            );
            return;
        }
        let interval = if fps > 0 {
            1000 / u64::from(fps)
        } else {
            self.inner.config.yield_interval_ms
        };
        self.inner.state.borrow_mut().yield_interval = interval;
        debug!("Yield interval set to {}ms", interval);
    }

    /// Current slice length.
    pub fn yield_interval(&self) -> Duration {
        Duration::from_millis(self.inner.state.borrow().yield_interval)
    }

    /// Whether any task, ready or delayed, is still queued.
    pub fn has_pending_work(&self) -> bool {
        let state = self.inner.state.borrow();
        !state.task_queue.is_empty() || !state.timer_queue.is_empty()
    }

    /// Snapshot of the scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.inner.metrics.borrow().clone()
    }
}

/// Puts the previous priority level back when dropped.
struct PriorityRestore<'a> {
    state: &'a RefCell<SchedulerState>,
    previous: PriorityLevel,
}

impl Drop for PriorityRestore<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.current_priority = self.previous;
        }
    }
}

impl<H: Host> SchedulerInner<H> {
    pub(super) fn schedule(&self, priority: PriorityLevel, callback: Callback, delay: Timestamp) -> TaskHandle {
        let current_time = self.host.now();
        let start_time = current_time.saturating_add(delay);
        let expiration_time = start_time.saturating_add(priority.timeout());

        let mut state = self.state.borrow_mut();
        let id = state.next_task_id;
        state.next_task_id += 1;
        let task = Rc::new(Task::new(id, priority, callback, start_time, expiration_time));
        self.metrics.borrow_mut().tasks_scheduled += 1;

        if start_time > current_time {
            task.sort_index.set(start_time);
            state.timer_queue.push(Rc::clone(&task));
            let is_earliest_timer = state.task_queue.is_empty()
                && state.timer_queue.peek().is_some_and(|root| Rc::ptr_eq(root, &task));
            drop(state);

            debug!(task_id = id, %priority, start_time, "delayed task scheduled");
            if is_earliest_timer {
                self.rearm_host_timeout(start_time - current_time);
            }
        } else {
            task.sort_index.set(expiration_time);
            state.task_queue.push(Rc::clone(&task));
            let needs_host_callback = !state.is_host_callback_scheduled && !state.is_performing_work;
            if needs_host_callback {
                state.is_host_callback_scheduled = true;
            }
            drop(state);

            debug!(task_id = id, %priority, expiration_time, "task scheduled");
            if needs_host_callback {
                self.request_host_callback();
            }
        }

        TaskHandle::new(task)
    }
}
