//! Runtime policy for acquisition and adjustment.

use std::time::Duration;

/// How a waiter polls for a semaphore that may still be mid-creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Total number of open attempts before giving up.
    pub attempts: u32,

    /// Pause between two failed attempts.
    pub interval: Duration,
}

/// Default number of open attempts.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 9;

/// Default pause between open attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

impl PollPolicy {
    /// Creates a policy with explicit bounds.
    #[must_use]
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL)
    }
}

/// What an adjustment does when a decrement cannot proceed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdjustMode {
    /// Wait in the kernel until the decrement can be applied.
    #[default]
    Blocking,

    /// Fail with an adjust error and leave the counter unchanged.
    NoWait,
}

impl AdjustMode {
    /// Whether the kernel should be asked not to block.
    #[must_use]
    pub const fn is_nowait(self) -> bool {
        matches!(self, Self::NoWait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_poll_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.attempts, 9);
        assert_eq!(policy.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_default_adjust_mode_blocks() {
        assert_eq!(AdjustMode::default(), AdjustMode::Blocking);
        assert!(!AdjustMode::Blocking.is_nowait());
        assert!(AdjustMode::NoWait.is_nowait());
    }
}
