use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{error, trace};

use super::{Host, HostTimeout, HostTurn, TimeoutId, Timestamp};

/// Host backed by a tokio `LocalSet`.
///
/// Turns and timeouts are spawned with `spawn_local`, so every method except
/// [`Host::now`] must be called from inside a `LocalSet` context on a
/// current-thread runtime. A spawned turn runs on a later poll of the set,
/// after the caller's stack has unwound.
pub struct TokioHost {
    origin: Instant,
    timers: Rc<RefCell<HashMap<TimeoutId, JoinHandle<()>>>>,
    next_timeout_id: Cell<TimeoutId>,
    failed_turns: Rc<Cell<u64>>,
}

impl Default for TokioHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioHost {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            timers: Rc::new(RefCell::new(HashMap::new())),
            next_timeout_id: Cell::new(0),
            failed_turns: Rc::new(Cell::new(0)),
        }
    }

    /// Turns whose host callback returned an error.
    pub fn failed_turns(&self) -> u64 {
        self.failed_turns.get()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Host for TokioHost {
    fn now(&self) -> Timestamp {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn request_turn(&self, turn: HostTurn) {
        let failed_turns = Rc::clone(&self.failed_turns);
        tokio::task::spawn_local(async move {
            if let Err(e) = turn() {
                failed_turns.set(failed_turns.get() + 1);
                error!("Scheduler turn failed: {}", e);
            }
        });
    }

    fn set_timeout(&self, callback: HostTimeout, delay: Timestamp) -> TimeoutId {
        let id = self.next_timeout_id.get() + 1;
        self.next_timeout_id.set(id);

        let timers = Rc::clone(&self.timers);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            timers.borrow_mut().remove(&id);
            callback();
        });
        self.timers.borrow_mut().insert(id, handle);
        trace!(timeout_id = id, delay_ms = delay, "host timeout armed");
        id
    }

    fn clear_timeout(&self, id: TimeoutId) {
        if let Some(handle) = self.timers.borrow_mut().remove(&id) {
            handle.abort();
            trace!(timeout_id = id, "host timeout cleared");
        }
    }
}
