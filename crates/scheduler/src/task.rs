use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use coslice_core::TaskError;

use crate::heap::HeapNode;
use crate::host::Timestamp;
use crate::priority::PriorityLevel;

/// Process-unique (per scheduler) task identifier, strictly increasing.
pub type TaskId = u64;

/// Outcome of one callback invocation.
pub type TaskResult = Result<Continuation, TaskError>;

/// A unit of deferred work.
pub type Callback = Box<dyn FnOnce(RunContext) -> TaskResult>;

/// What a callback is told when it is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    /// The task's expiration time has passed; it ran regardless of the slice.
    pub did_timeout: bool,
    /// The host granted time for this slice.
    pub has_time_remaining: bool,
    /// Scheduler clock at the moment the callback was picked.
    pub current_time: Timestamp,
}

/// Returned by a callback: either finished, or more work to resume later
/// under the same task identity.
pub enum Continuation {
    Done,
    Resume(Callback),
}

impl Continuation {
    pub fn resume<F>(callback: F) -> Self
    where
        F: FnOnce(RunContext) -> TaskResult + 'static,
    {
        Continuation::Resume(Box::new(callback))
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Continuation::Done => write!(f, "Done"),
            Continuation::Resume(_) => write!(f, "Resume(..)"),
        }
    }
}

/// The callback slot of a task.
///
/// A slot whose callback is currently executing also reads as `Cancelled`:
/// the callback is moved out before it runs.
pub(crate) enum TaskCallback {
    Pending(Callback),
    Continuation(Callback),
    Cancelled,
}

impl TaskCallback {
    /// Move the callback out, leaving the slot cleared.
    pub(crate) fn take(&mut self) -> Option<Callback> {
        match std::mem::replace(self, TaskCallback::Cancelled) {
            TaskCallback::Pending(callback) | TaskCallback::Continuation(callback) => Some(callback),
            TaskCallback::Cancelled => None,
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(self, TaskCallback::Cancelled)
    }
}

pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) priority: PriorityLevel,
    pub(crate) start_time: Timestamp,
    pub(crate) expiration_time: Timestamp,
    /// `start_time` while delayed, `expiration_time` once ready.
    pub(crate) sort_index: Cell<Timestamp>,
    pub(crate) callback: RefCell<TaskCallback>,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        priority: PriorityLevel,
        callback: Callback,
        start_time: Timestamp,
        expiration_time: Timestamp,
    ) -> Self {
        Self {
            id,
            priority,
            start_time,
            expiration_time,
            sort_index: Cell::new(start_time),
            callback: RefCell::new(TaskCallback::Pending(callback)),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.callback.borrow().is_cancelled()
    }
}

impl HeapNode for Task {
    fn sort_index(&self) -> u64 {
        self.sort_index.get()
    }

    fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("start_time", &self.start_time)
            .field("expiration_time", &self.expiration_time)
            .field("sort_index", &self.sort_index.get())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Opaque handle to a scheduled task, used for cancellation and inspection.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    task: Rc<Task>,
}

impl TaskHandle {
    pub(crate) fn new(task: Rc<Task>) -> Self {
        Self { task }
    }

    pub(crate) fn task(&self) -> &Rc<Task> {
        &self.task
    }

    pub fn id(&self) -> TaskId {
        self.task.id
    }

    pub fn priority(&self) -> PriorityLevel {
        self.task.priority
    }

    pub fn start_time(&self) -> Timestamp {
        self.task.start_time
    }

    pub fn expiration_time(&self) -> Timestamp {
        self.task.expiration_time
    }

    /// True once the task was cancelled, has finished, or is running right now.
    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.task, &other.task)
    }
}

impl Eq for TaskHandle {}
