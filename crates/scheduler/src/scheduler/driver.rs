use std::rc::Rc;

use coslice_core::SchedulerError;
use tracing::{debug, trace};

use crate::host::{Host, Timestamp};

use super::core::SchedulerInner;

/// Callback invoked once per turn: `(has_time_remaining, current_time)`,
/// returning whether more work remains.
pub(super) type HostCallback = Rc<dyn Fn(bool, Timestamp) -> Result<bool, SchedulerError>>;

/// Turn driver state: keeps the work loop running across host turns.
#[derive(Default)]
pub(super) struct TurnDriver {
    pub(super) scheduled_host_callback: Option<HostCallback>,
    pub(super) is_message_loop_running: bool,
    /// When the current slice began.
    pub(super) slice_start: Timestamp,
}

impl<H: Host> SchedulerInner<H> {
    /// Install the flush routine as the host callback and start the turn
    /// loop if it is not already running.
    pub(super) fn request_host_callback(&self) {
        let this = self.this.clone();
        let callback: HostCallback = Rc::new(move |has_time_remaining: bool, initial_time: Timestamp| {
            match this.upgrade() {
                Some(inner) => inner.flush_work(has_time_remaining, initial_time),
                None => Ok(false),
            }
        });

        let start_loop = {
            let mut driver = self.driver.borrow_mut();
            driver.scheduled_host_callback = Some(callback);
            !std::mem::replace(&mut driver.is_message_loop_running, true)
        };
        if start_loop {
            trace!("turn loop started");
            self.schedule_perform_work_until_deadline();
        }
    }

    fn schedule_perform_work_until_deadline(&self) {
        let this = self.this.clone();
        self.host.request_turn(Box::new(move || match this.upgrade() {
            Some(inner) => inner.perform_work_until_deadline(),
            None => Ok(()),
        }));
    }

    /// One host turn: start a new slice and run the host callback. More work,
    /// a failure or a panic requests another turn; otherwise the loop stops.
    fn perform_work_until_deadline(&self) -> Result<(), SchedulerError> {
        let callback = self.driver.borrow().scheduled_host_callback.clone();
        let Some(callback) = callback else {
            self.driver.borrow_mut().is_message_loop_running = false;
            return Ok(());
        };

        let current_time = self.host.now();
        self.driver.borrow_mut().slice_start = current_time;

        let mut next_turn = NextTurn {
            inner: self,
            more_work: true,
        };
        match callback(true, current_time) {
            Ok(true) => Ok(()),
            Ok(false) => {
                next_turn.more_work = false;
                let mut driver = self.driver.borrow_mut();
                driver.is_message_loop_running = false;
                driver.scheduled_host_callback = None;
                trace!("turn loop stopped");
                Ok(())
            }
            Err(e) => {
                debug!(task_id = e.task_id(), "turn failed, requesting another turn");
                Err(e)
            }
        }
    }
}

/// Requests the next turn when dropped unless the loop was stopped, so an
/// unwinding callback leaves the turn loop running.
struct NextTurn<'a, H: Host> {
    inner: &'a SchedulerInner<H>,
    more_work: bool,
}

impl<H: Host> Drop for NextTurn<'_, H> {
    fn drop(&mut self) {
        if self.more_work {
            self.inner.schedule_perform_work_until_deadline();
        }
    }
}
