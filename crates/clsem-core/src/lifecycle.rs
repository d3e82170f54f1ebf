//! Semaphore lifecycle: gated-visibility creation, poll-and-wait acquisition
//! and the post-creation operations.
//!
//! # Creation
//!
//! [`SemaphoreManager::create`] runs a two-phase protocol:
//!
//! 1. exclusively create the semaphore write-only for the owner
//!    ([`VisibilityState::Initializing`]),
//! 2. set its value to zero,
//! 3. widen the permissions to [`VisibilityState::Ready`] and set owner and
//!    group to the caller's credentials.
//!
//! Until step 3 completes the semaphore either does not exist or cannot be
//! opened for read, so no other process can observe an uninitialized value.
//! If step 2 or 3 fails the semaphore is removed again; otherwise it would be
//! unreadable to waiters and would block every later exclusive create.
//!
//! Cleanup is best effort and racy: a concurrent process may already hold
//! the id of the half-created semaphore when it is removed. There is no
//! shared lock to close that window.
//!
//! # Acquisition
//!
//! [`SemaphoreManager::acquire`] opens the semaphore requesting read access.
//! `ENOENT` (not created yet) and `EACCES` (still initializing) are treated
//! as "not ready": the manager pauses and retries, up to
//! [`PollPolicy::attempts`] attempts in total. Any other failure is fatal
//! immediately.

use std::io;

use tracing::{debug, error, info, warn};

use crate::config::{AdjustMode, PollPolicy};
use crate::error::{ClsemError, Result};
use crate::ipc::{IpcBackend, Owner, SemaphoreHandle, SysV};
use crate::key::SemaphoreKey;
use crate::visibility::{MODE_OPEN_READ, VisibilityState};

/// Whether an open failure means the semaphore is not ready yet.
fn is_not_ready(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::ENOENT | libc::EACCES))
}

/// Whether an operation failure means the semaphore no longer exists.
fn is_gone(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EINVAL | libc::EIDRM))
}

/// Creates, locates and operates on semaphores through an [`IpcBackend`].
#[derive(Debug, Clone, Default)]
pub struct SemaphoreManager<B = SysV> {
    backend: B,
    poll: PollPolicy,
    adjust_mode: AdjustMode,
}

impl SemaphoreManager<SysV> {
    /// Manager for System V semaphores with default policies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: IpcBackend> SemaphoreManager<B> {
    /// Manager over an explicit backend with default policies.
    #[must_use]
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            poll: PollPolicy::default(),
            adjust_mode: AdjustMode::default(),
        }
    }

    /// Sets the acquisition poll policy.
    #[must_use]
    pub fn poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Sets what adjustments do when a decrement cannot proceed.
    #[must_use]
    pub fn adjust_mode(mut self, adjust_mode: AdjustMode) -> Self {
        self.adjust_mode = adjust_mode;
        self
    }

    /// The underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Creates a new semaphore for `key` with value zero.
    ///
    /// # Errors
    ///
    /// - [`ClsemError::AlreadyExists`] if a semaphore for `key` exists.
    /// - [`ClsemError::System`] if a creation step fails; the partial
    ///   semaphore has been removed.
    /// - [`ClsemError::Orphaned`] if a creation step fails and the partial
    ///   semaphore could not be removed.
    pub fn create(&self, key: &SemaphoreKey) -> Result<Semaphore<'_, B>> {
        let handle = self
            .backend
            .create_exclusive(key.raw(), VisibilityState::Initializing.mode())
            .map_err(|source| {
                if source.raw_os_error() == Some(libc::EEXIST) {
                    ClsemError::AlreadyExists {
                        path: key.path().to_path_buf(),
                        id: key.id().as_char(),
                    }
                } else {
                    system_error("create", key, source)
                }
            })?;
        debug!(sem_id = %handle, key = %key, "created semaphore in initializing state");

        if let Err(source) = self.backend.set_value(handle, 0) {
            return Err(self.abort_create("initialize", key, handle, source));
        }

        if let Err(source) = self.backend.set_owner_and_mode(
            handle,
            Owner::current(),
            VisibilityState::Ready.mode(),
        ) {
            return Err(self.abort_create("set permissions of", key, handle, source));
        }

        info!(
            sem_id = %handle,
            path = %key.path().display(),
            id = %key.id(),
            "semaphore ready"
        );
        Ok(Semaphore::new(self, key.clone(), handle))
    }

    /// Removes a half-created semaphore and builds the error to report.
    fn abort_create(
        &self,
        op: &'static str,
        key: &SemaphoreKey,
        handle: SemaphoreHandle,
        source: io::Error,
    ) -> ClsemError {
        match self.backend.remove(handle) {
            Ok(()) => {
                debug!(sem_id = %handle, "removed partially created semaphore");
                system_error(op, key, source)
            },
            Err(cleanup) => {
                error!(
                    sem_id = %handle,
                    error = %cleanup,
                    "could not remove partially created semaphore"
                );
                ClsemError::Orphaned {
                    op,
                    path: key.path().to_path_buf(),
                    id: key.id().as_char(),
                    sem_id: handle.as_raw(),
                    source,
                    cleanup,
                }
            },
        }
    }

    /// Opens the semaphore for `key`, waiting for a concurrent creator to
    /// finish.
    ///
    /// # Errors
    ///
    /// - [`ClsemError::AcquisitionTimeout`] if the semaphore is still
    ///   missing or initializing after the last attempt.
    /// - [`ClsemError::System`] on any other open failure.
    pub fn acquire(&self, key: &SemaphoreKey) -> Result<Semaphore<'_, B>> {
        let attempts = self.poll.attempts;
        for attempt in 1..=attempts {
            match self.backend.open(key.raw(), MODE_OPEN_READ) {
                Ok(handle) => {
                    debug!(sem_id = %handle, attempt, "acquired semaphore");
                    return Ok(Semaphore::new(self, key.clone(), handle));
                },
                Err(err) if is_not_ready(&err) => {
                    debug!(attempt, attempts, error = %err, "semaphore not ready");
                    if attempt < attempts {
                        self.backend.pause(self.poll.interval);
                    }
                },
                Err(source) => return Err(system_error("get", key, source)),
            }
        }

        warn!(
            path = %key.path().display(),
            id = %key.id(),
            attempts,
            "gave up waiting for semaphore"
        );
        Err(ClsemError::AcquisitionTimeout {
            path: key.path().to_path_buf(),
            id: key.id().as_char(),
            attempts,
        })
    }
}

fn system_error(op: &'static str, key: &SemaphoreKey, source: io::Error) -> ClsemError {
    ClsemError::System {
        op,
        path: key.path().to_path_buf(),
        id: key.id().as_char(),
        source,
    }
}

fn not_found(op: &'static str, key: &SemaphoreKey) -> ClsemError {
    ClsemError::NotFound {
        op,
        path: key.path().to_path_buf(),
        id: key.id().as_char(),
    }
}

/// An open semaphore, valid for one invocation.
#[derive(Debug)]
pub struct Semaphore<'a, B = SysV> {
    manager: &'a SemaphoreManager<B>,
    key: SemaphoreKey,
    handle: SemaphoreHandle,
}

impl<'a, B: IpcBackend> Semaphore<'a, B> {
    fn new(manager: &'a SemaphoreManager<B>, key: SemaphoreKey, handle: SemaphoreHandle) -> Self {
        Self {
            manager,
            key,
            handle,
        }
    }

    /// Kernel handle of the semaphore.
    #[must_use]
    pub const fn handle(&self) -> SemaphoreHandle {
        self.handle
    }

    /// Key the semaphore was located by.
    #[must_use]
    pub const fn key(&self) -> &SemaphoreKey {
        &self.key
    }

    /// Atomically adds `delta` to the counter.
    ///
    /// A negative delta that would take the counter below zero waits (or
    /// fails, under [`AdjustMode::NoWait`]). A zero delta waits for the
    /// counter to reach zero.
    ///
    /// # Errors
    ///
    /// - [`ClsemError::NotFound`] if the semaphore was removed.
    /// - [`ClsemError::Adjust`] if the kernel rejects the change; the counter
    ///   is unchanged.
    pub fn adjust(&self, delta: i16) -> Result<()> {
        let nowait = self.manager.adjust_mode.is_nowait();
        self.manager
            .backend
            .adjust(self.handle, delta, nowait)
            .map_err(|source| {
                if is_gone(&source) {
                    not_found("adjust", &self.key)
                } else {
                    ClsemError::Adjust {
                        path: self.key.path().to_path_buf(),
                        id: self.key.id().as_char(),
                        delta,
                        source,
                    }
                }
            })?;
        debug!(sem_id = %self.handle, delta, "adjusted semaphore");
        Ok(())
    }

    /// Current counter value. A snapshot; concurrent adjusts may already
    /// have changed it.
    ///
    /// # Errors
    ///
    /// [`ClsemError::NotFound`] if the semaphore was removed, otherwise
    /// [`ClsemError::System`].
    pub fn value(&self) -> Result<i32> {
        self.manager.backend.value(self.handle).map_err(|source| {
            if is_gone(&source) {
                not_found("get value of", &self.key)
            } else {
                system_error("get value of", &self.key, source)
            }
        })
    }

    /// Visibility state derived from the permission bits.
    ///
    /// # Errors
    ///
    /// [`ClsemError::NotFound`] if the semaphore was removed, otherwise
    /// [`ClsemError::System`].
    pub fn visibility(&self) -> Result<VisibilityState> {
        self.manager
            .backend
            .mode(self.handle)
            .map(VisibilityState::from_mode)
            .map_err(|source| {
                if is_gone(&source) {
                    not_found("stat", &self.key)
                } else {
                    system_error("stat", &self.key, source)
                }
            })
    }

    /// Removes the semaphore. Every other handle to it becomes invalid.
    ///
    /// # Errors
    ///
    /// [`ClsemError::NotFound`] if it was already removed, otherwise
    /// [`ClsemError::System`].
    pub fn delete(self) -> Result<()> {
        self.manager.backend.remove(self.handle).map_err(|source| {
            if is_gone(&source) {
                not_found("delete", &self.key)
            } else {
                system_error("delete", &self.key, source)
            }
        })?;
        info!(
            sem_id = %self.handle,
            path = %self.key.path().display(),
            id = %self.key.id(),
            "deleted semaphore"
        );
        Ok(())
    }
}
