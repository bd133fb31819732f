//! Capabilities the scheduler needs from its environment.
//!
//! The scheduler never touches a platform clock, timer or event loop directly.
//! Everything goes through [`Host`], so any environment offering the same
//! schedule/cancel/run-after-current-call-stack semantics can drive it:
//! - [`ManualHost`]: virtual clock and explicit turn/timer pumping, for tests
//!   and simulations.
//! - [`TokioHost`]: a tokio `LocalSet` on a current-thread runtime.

mod manual;
mod tokio_host;

pub use manual::ManualHost;
pub use tokio_host::TokioHost;

use coslice_core::SchedulerError;

/// Milliseconds on the host's monotonic clock.
pub type Timestamp = u64;

/// Identity of an armed host timeout.
pub type TimeoutId = u64;

/// Work to run once on the next host turn. Errors are reported to the host.
pub type HostTurn = Box<dyn FnOnce() -> Result<(), SchedulerError>>;

/// One-shot callback fired by a host timeout.
pub type HostTimeout = Box<dyn FnOnce()>;

pub trait Host: 'static {
    /// Current time on a monotonic clock.
    fn now(&self) -> Timestamp;

    /// Run `turn` once on the next host turn, after the current call stack
    /// unwinds and behind any work already queued by the host.
    fn request_turn(&self, turn: HostTurn);

    /// Fire `callback` once after `delay` milliseconds.
    fn set_timeout(&self, callback: HostTimeout, delay: Timestamp) -> TimeoutId;

    /// Cancel a timeout that has not fired yet. Unknown ids are ignored.
    fn clear_timeout(&self, id: TimeoutId);
}
