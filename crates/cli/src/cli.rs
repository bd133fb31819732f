use clap::Parser;

/// Run a synthetic workload through the cooperative scheduler.
///
/// Tasks cycle through every priority level; every fourth one is delayed and
/// each is split into `--steps` continuation steps. Metrics are printed as
/// JSON when the queue drains.
#[derive(Parser, Debug)]
#[command(name = "coslice", version, about)]
pub struct CliArgs {
    /// Number of tasks to submit.
    #[arg(long, env = "COSLICE_TASKS", default_value_t = 200)]
    pub tasks: usize,

    /// Continuation steps per task.
    #[arg(long, env = "COSLICE_STEPS", default_value_t = 3)]
    pub steps: u32,

    /// Simulated busy time per step, in milliseconds.
    #[arg(long, env = "COSLICE_WORK_MS", default_value_t = 1)]
    pub work_ms: u64,

    /// Delay for every fourth task, in milliseconds.
    #[arg(long, env = "COSLICE_DELAY_MS", default_value_t = 20)]
    pub delay_ms: u64,

    /// Override the slice length to fit this frame rate (0 = config default).
    #[arg(long, env = "COSLICE_FRAME_RATE")]
    pub frame_rate: Option<u32>,

    /// Give up if the queue has not drained after this many seconds.
    #[arg(long, env = "COSLICE_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,
}
