//! Cooperative, single-threaded task scheduler.
//!
//! Work is submitted as callbacks with a [`PriorityLevel`] and runs in short
//! time slices on the turns of an injected [`Host`], yielding between
//! callbacks so the host thread is never blocked for long.

pub mod heap;
pub mod host;
pub mod metrics;
pub mod priority;
pub mod scheduler;
pub mod task;

pub use coslice_core::{SchedulerConfig, SchedulerError, TaskError};
pub use host::{Host, ManualHost, TimeoutId, Timestamp, TokioHost};
pub use metrics::SchedulerMetrics;
pub use priority::PriorityLevel;
pub use scheduler::Scheduler;
pub use task::{Callback, Continuation, RunContext, TaskHandle, TaskId, TaskResult};
