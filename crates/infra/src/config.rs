//! Transfer coordination settings.

use std::time::Duration;

/// Bounds on how long and how often a transfer may try before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Maximum wait for both account locks.
    pub lock_timeout: Duration,
    /// Maximum time for one read-check-commit attempt once the locks are held.
    pub operation_timeout: Duration,
    /// Extra attempts after a version conflict before reporting `Conflict`.
    pub max_retries: u32,
}

impl CoordinatorConfig {
    pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
            operation_timeout: Self::DEFAULT_OPERATION_TIMEOUT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }
}
