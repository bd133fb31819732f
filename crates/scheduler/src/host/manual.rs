use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use coslice_core::SchedulerError;

use super::{Host, HostTimeout, HostTurn, TimeoutId, Timestamp};

/// Deterministic host: the clock only moves when told to, turns and timers
/// only run when pumped.
///
/// Cloning yields another handle to the same host, so a test can keep one
/// while the scheduler owns the other.
#[derive(Clone, Default)]
pub struct ManualHost {
    inner: Rc<ManualHostInner>,
}

#[derive(Default)]
struct ManualHostInner {
    now: Cell<Timestamp>,
    turns: RefCell<VecDeque<HostTurn>>,
    /// Keyed by (fire time, id) so equal fire times keep arming order.
    timers: RefCell<BTreeMap<(Timestamp, TimeoutId), HostTimeout>>,
    next_timeout_id: Cell<TimeoutId>,
    turns_run: Cell<usize>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: Timestamp) -> Self {
        let host = Self::default();
        host.inner.now.set(now);
        host
    }

    /// Move the clock forward. Nothing fires; see [`ManualHost::run_until_idle`].
    pub fn advance(&self, ms: Timestamp) {
        self.inner.now.set(self.inner.now.get() + ms);
    }

    pub fn pending_turns(&self) -> usize {
        self.inner.turns.borrow().len()
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Fire time of the earliest armed timeout.
    pub fn next_timer_at(&self) -> Option<Timestamp> {
        self.inner.timers.borrow().keys().next().map(|(at, _)| *at)
    }

    /// Total turns executed so far.
    pub fn turns_run(&self) -> usize {
        self.inner.turns_run.get()
    }

    /// Fire every timeout due at the current time, earliest first.
    pub fn fire_due_timers(&self) -> usize {
        let mut fired = 0;
        loop {
            let due = {
                let mut timers = self.inner.timers.borrow_mut();
                let now = self.inner.now.get();
                match timers.keys().next().copied() {
                    Some(key) if key.0 <= now => timers.remove(&key),
                    _ => None,
                }
            };
            match due {
                Some(callback) => {
                    callback();
                    fired += 1;
                }
                None => return fired,
            }
        }
    }

    /// Run the oldest queued turn. `None` when no turn is queued.
    pub fn run_next_turn(&self) -> Option<Result<(), SchedulerError>> {
        let turn = self.inner.turns.borrow_mut().pop_front()?;
        self.inner.turns_run.set(self.inner.turns_run.get() + 1);
        Some(turn())
    }

    /// Fire due timers and run turns until neither is left. Stops at the
    /// first failing turn. Returns the number of turns run.
    pub fn run_until_idle(&self) -> Result<usize, SchedulerError> {
        let mut ran = 0;
        loop {
            self.fire_due_timers();
            match self.run_next_turn() {
                Some(result) => {
                    result?;
                    ran += 1;
                }
                None => return Ok(ran),
            }
        }
    }

    /// Advance the clock, then [`ManualHost::run_until_idle`].
    pub fn advance_and_run(&self, ms: Timestamp) -> Result<usize, SchedulerError> {
        self.advance(ms);
        self.run_until_idle()
    }
}

impl Host for ManualHost {
    fn now(&self) -> Timestamp {
        self.inner.now.get()
    }

    fn request_turn(&self, turn: HostTurn) {
        self.inner.turns.borrow_mut().push_back(turn);
    }

    fn set_timeout(&self, callback: HostTimeout, delay: Timestamp) -> TimeoutId {
        let id = self.inner.next_timeout_id.get() + 1;
        self.inner.next_timeout_id.set(id);
        let at = self.inner.now.get() + delay;
        self.inner.timers.borrow_mut().insert((at, id), callback);
        id
    }

    fn clear_timeout(&self, id: TimeoutId) {
        self.inner.timers.borrow_mut().retain(|(_, timer), _| *timer != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_run_in_fifo_order() {
        let host = ManualHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let log = Rc::clone(&log);
            host.request_turn(Box::new(move || {
                log.borrow_mut().push(n);
                Ok(())
            }));
        }

        assert_eq!(host.run_until_idle().unwrap(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(host.turns_run(), 3);
    }

    #[test]
    fn timers_fire_only_when_due() {
        let host = ManualHost::new();
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        host.set_timeout(Box::new(move || flag.set(true)), 10);

        host.advance(9);
        assert_eq!(host.fire_due_timers(), 0);
        host.advance(1);
        assert_eq!(host.fire_due_timers(), 1);
        assert!(fired.get());
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn cleared_timer_never_fires() {
        let host = ManualHost::starting_at(100);
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let id = host.set_timeout(Box::new(move || flag.set(true)), 5);
        assert_eq!(host.next_timer_at(), Some(105));

        host.clear_timeout(id);
        host.advance(50);
        host.fire_due_timers();
        assert!(!fired.get());
    }
}
