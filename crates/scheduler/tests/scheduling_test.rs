//! Integration tests for ordering, delays, cancellation, continuations and
//! time slicing, driven through the public API on a deterministic host.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use coslice_scheduler::{Callback, Continuation, ManualHost, PriorityLevel, RunContext, Scheduler, TaskResult};

type Log = Rc<RefCell<Vec<String>>>;

fn setup() -> (ManualHost, Scheduler<ManualHost>, Log) {
    let host = ManualHost::new();
    let scheduler = Scheduler::new(host.clone());
    (host, scheduler, Rc::new(RefCell::new(Vec::new())))
}

fn record(log: &Log, name: &str) -> impl FnOnce(RunContext) -> TaskResult + 'static {
    let log = Rc::clone(log);
    let name = name.to_string();
    move |_| {
        log.borrow_mut().push(name);
        Ok(Continuation::Done)
    }
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

#[test]
fn smaller_sort_index_runs_first_regardless_of_submission_order() {
    let (host, scheduler, log) = setup();

    scheduler.schedule_callback(PriorityLevel::Idle, record(&log, "idle"));
    scheduler.schedule_callback(PriorityLevel::Low, record(&log, "low"));
    scheduler.schedule_callback(PriorityLevel::Normal, record(&log, "normal"));
    scheduler.schedule_callback(PriorityLevel::UserBlocking, record(&log, "user-blocking"));

    host.run_until_idle().unwrap();
    assert_eq!(entries(&log), vec!["user-blocking", "normal", "low", "idle"]);
}

#[test]
fn equal_priority_tasks_run_in_submission_order() {
    let (host, scheduler, log) = setup();

    let names: Vec<String> = (0..8).map(|n| format!("task-{n}")).collect();
    for name in &names {
        scheduler.schedule_callback(PriorityLevel::Normal, record(&log, name));
    }

    host.run_until_idle().unwrap();
    assert_eq!(entries(&log), names);
}

#[test]
fn immediate_runs_before_idle_submitted_at_the_same_instant() {
    let (host, scheduler, log) = setup();

    scheduler.schedule_callback(PriorityLevel::Immediate, record(&log, "cbA"));
    scheduler.schedule_callback(PriorityLevel::Idle, record(&log, "cbB"));

    host.run_until_idle().unwrap();
    assert_eq!(entries(&log), vec!["cbA", "cbB"]);
}

#[test]
fn delayed_task_runs_once_after_its_start_time() {
    let (host, scheduler, log) = setup();

    scheduler.schedule_callback_with_delay(PriorityLevel::Normal, record(&log, "cbC"), Duration::from_millis(50));

    host.advance_and_run(40).unwrap();
    assert!(entries(&log).is_empty(), "must not run before t=50");

    host.advance_and_run(20).unwrap();
    assert_eq!(entries(&log), vec!["cbC"]);

    host.advance_and_run(100).unwrap();
    assert_eq!(entries(&log), vec!["cbC"], "runs exactly once");
}

#[test]
fn cancellation_skips_the_task_and_keeps_the_rest_in_order() {
    let (host, scheduler, log) = setup();

    scheduler.schedule_callback(PriorityLevel::Normal, record(&log, "first"));
    let doomed = scheduler.schedule_callback(PriorityLevel::Normal, record(&log, "doomed"));
    scheduler.schedule_callback(PriorityLevel::Normal, record(&log, "third"));
    scheduler.schedule_callback(PriorityLevel::UserBlocking, record(&log, "urgent"));
    scheduler.cancel_callback(&doomed);

    host.run_until_idle().unwrap();
    assert_eq!(entries(&log), vec!["urgent", "first", "third"]);
}

#[test]
fn continuation_yields_and_resumes_same_task_before_lower_priority() {
    let (host, scheduler, log) = setup();

    let step_log = Rc::clone(&log);
    let multi = scheduler.schedule_callback(PriorityLevel::Normal, move |_| {
        step_log.borrow_mut().push("step-1".to_string());
        let step_log = Rc::clone(&step_log);
        Ok(Continuation::resume(move |_| {
            step_log.borrow_mut().push("step-2".to_string());
            Ok(Continuation::Done)
        }))
    });
    scheduler.schedule_callback(PriorityLevel::Low, record(&log, "low"));

    host.run_next_turn().unwrap().unwrap();
    assert_eq!(entries(&log), vec!["step-1"], "yields right after the continuation");
    assert_eq!(scheduler.first_callback_node(), Some(multi.clone()), "same task, same identity");
    assert!(!multi.is_cancelled());
    assert_eq!(host.pending_turns(), 1);

    host.run_until_idle().unwrap();
    assert_eq!(entries(&log), vec!["step-1", "step-2", "low"]);
    assert_eq!(scheduler.metrics().continuations, 1);
    assert_eq!(scheduler.metrics().tasks_executed, 2);
}

#[test]
fn long_callback_defers_the_next_task_to_another_flush() {
    let (host, scheduler, log) = setup();

    let busy_host = host.clone();
    let busy_log = Rc::clone(&log);
    scheduler.schedule_callback(PriorityLevel::Normal, move |_| {
        busy_log.borrow_mut().push("long".to_string());
        busy_host.advance(10);
        Ok(Continuation::Done)
    });
    scheduler.schedule_callback(PriorityLevel::Normal, record(&log, "next"));

    host.run_next_turn().unwrap().unwrap();
    assert_eq!(entries(&log), vec!["long"]);
    assert_eq!(scheduler.metrics().flushes, 1);
    assert_eq!(scheduler.metrics().yields, 1);

    host.run_next_turn().unwrap().unwrap();
    assert_eq!(entries(&log), vec!["long", "next"]);
    assert_eq!(scheduler.metrics().flushes, 2);
}

#[test]
fn short_callbacks_share_a_single_flush() {
    let (host, scheduler, log) = setup();

    for n in 0..20 {
        scheduler.schedule_callback(PriorityLevel::Normal, record(&log, &format!("t{n}")));
    }

    host.run_until_idle().unwrap();
    assert_eq!(entries(&log).len(), 20);
    assert_eq!(scheduler.metrics().flushes, 1);
}

#[test]
fn multi_step_task_polls_should_yield() {
    let (host, scheduler, log) = setup();

    fn chunk(
        scheduler: Scheduler<ManualHost>,
        host: ManualHost,
        log: Log,
        remaining: u32,
    ) -> Callback {
        Box::new(move |_| {
            let mut remaining = remaining;
            while remaining > 0 {
                log.borrow_mut().push(format!("chunk-{remaining}"));
                host.advance(2);
                remaining -= 1;
                if scheduler.should_yield() && remaining > 0 {
                    let next = chunk(scheduler.clone(), host.clone(), Rc::clone(&log), remaining);
                    return Ok(Continuation::Resume(next));
                }
            }
            Ok(Continuation::Done)
        })
    }

    scheduler.schedule_callback(
        PriorityLevel::Normal,
        chunk(scheduler.clone(), host.clone(), Rc::clone(&log), 6),
    );

    host.run_until_idle().unwrap();
    assert_eq!(entries(&log).len(), 6);
    // 2ms per chunk against a 5ms slice: three chunks per turn.
    assert_eq!(host.turns_run(), 2);
    assert_eq!(scheduler.metrics().continuations, 1);
}

#[test]
fn timer_promoted_mid_flush_joins_the_ready_queue() {
    let (host, scheduler, log) = setup();

    scheduler.schedule_callback_with_delay(PriorityLevel::UserBlocking, record(&log, "timer"), Duration::from_millis(3));

    let busy_host = host.clone();
    let busy_log = Rc::clone(&log);
    scheduler.schedule_callback(PriorityLevel::Low, move |_| {
        busy_log.borrow_mut().push("busy".to_string());
        busy_host.advance(4);
        Ok(Continuation::Done)
    });
    scheduler.schedule_callback(PriorityLevel::Low, record(&log, "low"));

    host.run_until_idle().unwrap();
    assert_eq!(entries(&log), vec!["busy", "timer", "low"]);
    assert_eq!(scheduler.metrics().timers_promoted, 1);
}
