//! Visibility states of a semaphore.
//!
//! The state lives entirely in the permission bits of the kernel object. A
//! semaphore is created write-only for its owner (`Initializing`) and is only
//! widened to world-readable (`Ready`) once its value has been set. Opening a
//! semaphore for read fails with `EACCES` while it is initializing, which is
//! how waiters tell "not ready yet" apart from "ready".

/// Permission bits while the semaphore is being initialized: owner
/// write-only.
pub const MODE_INITIALIZING: u32 = 0o200;

/// Permission bits once the semaphore is ready: owner read/write, group and
/// other read-only.
pub const MODE_READY: u32 = 0o644;

/// Permission bits requested when a waiter opens the semaphore.
pub const MODE_OPEN_READ: u32 = 0o444;

const MODE_BITS: u32 = 0o777;
const READ_BITS: u32 = 0o444;

/// Access-permission state of a semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    /// Created but not yet initialized; unreadable.
    Initializing,
    /// Initialized and readable.
    Ready,
}

impl VisibilityState {
    /// Permission bits for this state.
    #[must_use]
    pub const fn mode(self) -> u32 {
        match self {
            Self::Initializing => MODE_INITIALIZING,
            Self::Ready => MODE_READY,
        }
    }

    /// Classifies raw permission bits.
    ///
    /// Any mode granting read access to someone counts as ready.
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        if mode & MODE_BITS & READ_BITS == 0 {
            Self::Initializing
        } else {
            Self::Ready
        }
    }
}
