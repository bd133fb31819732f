use serde::{Deserialize, Serialize};

use crate::host::Timestamp;

/// Timeout budget for [`PriorityLevel::Immediate`]: expires the moment it starts.
pub const IMMEDIATE_PRIORITY_TIMEOUT: Timestamp = 0;
/// Timeout budget for [`PriorityLevel::UserBlocking`].
pub const USER_BLOCKING_PRIORITY_TIMEOUT: Timestamp = 250;
/// Timeout budget for [`PriorityLevel::Normal`].
pub const NORMAL_PRIORITY_TIMEOUT: Timestamp = 5000;
/// Timeout budget for [`PriorityLevel::Low`].
pub const LOW_PRIORITY_TIMEOUT: Timestamp = 10000;
/// Timeout budget for [`PriorityLevel::Idle`]. Max signed 31-bit integer, never
/// reached in practice.
pub const IDLE_PRIORITY_TIMEOUT: Timestamp = 1_073_741_823;

/// Task priority. Declaration order is urgency order: `Immediate < Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default)]
pub enum PriorityLevel {
    /// Must run right away; never deferred by the yield check.
    Immediate = 1,
    /// Input handling and other work the user is waiting on.
    UserBlocking = 2,
    #[default]
    Normal = 3,
    Low = 4,
    /// Runs only when nothing else is pending.
    Idle = 5,
}

impl PriorityLevel {
    pub const ALL: [PriorityLevel; 5] = [
        PriorityLevel::Immediate,
        PriorityLevel::UserBlocking,
        PriorityLevel::Normal,
        PriorityLevel::Low,
        PriorityLevel::Idle,
    ];

    /// Milliseconds added to a task's start time to get its expiration time.
    pub const fn timeout(self) -> Timestamp {
        match self {
            PriorityLevel::Immediate => IMMEDIATE_PRIORITY_TIMEOUT,
            PriorityLevel::UserBlocking => USER_BLOCKING_PRIORITY_TIMEOUT,
            PriorityLevel::Normal => NORMAL_PRIORITY_TIMEOUT,
            PriorityLevel::Low => LOW_PRIORITY_TIMEOUT,
            PriorityLevel::Idle => IDLE_PRIORITY_TIMEOUT,
        }
    }
}

impl std::fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityLevel::Immediate => write!(f, "Immediate"),
            PriorityLevel::UserBlocking => write!(f, "UserBlocking"),
            PriorityLevel::Normal => write!(f, "Normal"),
            PriorityLevel::Low => write!(f, "Low"),
            PriorityLevel::Idle => write!(f, "Idle"),
        }
    }
}
