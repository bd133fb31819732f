//! Cooperative time-sliced scheduler.
//!
//! Split into focused submodules:
//! - `core`: Scheduler handle, shared state, submission, cancellation and
//!   priority helpers
//! - `timers`: delayed-task promotion and the single outstanding host timeout
//! - `work`: flush entry point, work loop and yield check
//! - `driver`: turn driver that re-enters the work loop on the next host turn

mod core;
mod driver;
mod timers;
mod work;

pub use self::core::Scheduler;
