//! Synthetic workload: a mix of priorities, delayed tasks and multi-step
//! tasks that hand back continuations.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use coslice_scheduler::{Callback, Continuation, Host, PriorityLevel, Scheduler};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub tasks: usize,
    /// Steps per multi-step task (1 = plain task).
    pub steps: u32,
    /// Simulated busy time per step.
    pub work: Duration,
    /// Delay applied to every fourth task.
    pub delay: Duration,
}

/// Per-run outcome, filled in as tasks finish.
#[derive(Debug, Default, Serialize)]
pub struct WorkloadReport {
    pub submitted: usize,
    pub completed: usize,
    pub steps_run: u64,
    pub timed_out_steps: u64,
}

#[derive(Default)]
struct Counters {
    completed: Cell<usize>,
    steps_run: Cell<u64>,
    timed_out_steps: Cell<u64>,
}

pub struct Workload {
    counters: Rc<Counters>,
    submitted: usize,
}

impl Workload {
    /// Submit every task of `spec` to `scheduler`.
    pub fn submit<H: Host>(scheduler: &Scheduler<H>, spec: &WorkloadSpec) -> Self {
        let counters = Rc::new(Counters::default());

        for n in 0..spec.tasks {
            let priority = PriorityLevel::ALL[n % PriorityLevel::ALL.len()];
            let callback = step(Rc::clone(&counters), spec.work, spec.steps.max(1));
            if n % 4 == 0 && !spec.delay.is_zero() {
                scheduler.schedule_callback_with_delay(priority, callback, spec.delay);
            } else {
                scheduler.schedule_callback(priority, callback);
            }
        }
        debug!("Submitted {} tasks", spec.tasks);

        Self {
            counters,
            submitted: spec.tasks,
        }
    }

    pub fn report(&self) -> WorkloadReport {
        WorkloadReport {
            submitted: self.submitted,
            completed: self.counters.completed.get(),
            steps_run: self.counters.steps_run.get(),
            timed_out_steps: self.counters.timed_out_steps.get(),
        }
    }
}

fn step(counters: Rc<Counters>, work: Duration, remaining: u32) -> Callback {
    Box::new(move |ctx| {
        if !work.is_zero() {
            std::thread::sleep(work);
        }
        counters.steps_run.set(counters.steps_run.get() + 1);
        if ctx.did_timeout {
            counters.timed_out_steps.set(counters.timed_out_steps.get() + 1);
        }

        if remaining > 1 {
            let next = step(Rc::clone(&counters), work, remaining - 1);
            Ok(Continuation::Resume(next))
        } else {
            counters.completed.set(counters.completed.get() + 1);
            Ok(Continuation::Done)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coslice_scheduler::ManualHost;

    #[test]
    fn every_task_completes_on_a_manual_host() {
        let host = ManualHost::new();
        let scheduler = Scheduler::new(host.clone());
        let spec = WorkloadSpec {
            tasks: 10,
            steps: 3,
            work: Duration::ZERO,
            delay: Duration::from_millis(25),
        };

        let workload = Workload::submit(&scheduler, &spec);
        host.advance_and_run(25).unwrap();

        let report = workload.report();
        assert_eq!(report.submitted, 10);
        assert_eq!(report.completed, 10);
        assert_eq!(report.steps_run, 30);
        assert_eq!(scheduler.metrics().continuations, 20);
    }
}
