use thiserror::Error;

/// Failure reported by a task callback.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors surfaced by a host turn of the scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("task {task_id} failed: {source}")]
    Task {
        task_id: u64,
        #[source]
        source: TaskError,
    },
}

impl SchedulerError {
    /// Id of the task whose callback failed.
    pub fn task_id(&self) -> u64 {
        match self {
            SchedulerError::Task { task_id, .. } => *task_id,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
