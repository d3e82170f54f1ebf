//! Error types for semaphore resolution, creation and use.
//!
//! Every error is terminal to the invocation. Variants carry the operation,
//! the key path and the discriminator so that a rendered error identifies
//! exactly which semaphore was involved.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Exit code for usage errors (bad arguments).
pub const EXIT_USAGE: u8 = 2;

/// Exit code for every other failure.
pub const EXIT_FAILURE: u8 = 1;

/// Errors that can occur while resolving, creating or operating on a
/// semaphore.
#[derive(Debug, Error)]
pub enum ClsemError {
    /// Bad arguments: wrong arity, malformed delta, multi-character id.
    #[error("{reason}")]
    Usage {
        /// What was wrong with the arguments.
        reason: String,
    },

    /// The key could not be derived from the path.
    #[error("could not get key for path {}, id {id}: {source}", path.display())]
    Resolution {
        /// Path used for key derivation.
        path: PathBuf,
        /// Discriminator used for key derivation.
        id: char,
        /// Underlying system error.
        #[source]
        source: io::Error,
    },

    /// Exclusive creation found an existing semaphore for the key.
    #[error("could not create new semaphore for path {}, id {id}: semaphore already exists", path.display())]
    AlreadyExists {
        /// Path used for key derivation.
        path: PathBuf,
        /// Discriminator used for key derivation.
        id: char,
    },

    /// The semaphore never became ready within the poll bound.
    #[error("gave up waiting for semaphore for path {}, id {id} after {attempts} attempts", path.display())]
    AcquisitionTimeout {
        /// Path used for key derivation.
        path: PathBuf,
        /// Discriminator used for key derivation.
        id: char,
        /// Number of open attempts made.
        attempts: u32,
    },

    /// The kernel rejected the counter mutation.
    #[error("could not adjust semaphore for path {}, id {id}, by {delta}: {source}", path.display())]
    Adjust {
        /// Path used for key derivation.
        path: PathBuf,
        /// Discriminator used for key derivation.
        id: char,
        /// Requested delta.
        delta: i16,
        /// Underlying system error.
        #[source]
        source: io::Error,
    },

    /// The semaphore does not exist (or was removed mid-operation).
    #[error("could not {op} semaphore for path {}, id {id}: semaphore does not exist", path.display())]
    NotFound {
        /// Operation that was attempted.
        op: &'static str,
        /// Path used for key derivation.
        path: PathBuf,
        /// Discriminator used for key derivation.
        id: char,
    },

    /// Any other kernel-reported failure.
    #[error("could not {op} semaphore for path {}, id {id}: {source}", path.display())]
    System {
        /// Operation that was attempted.
        op: &'static str,
        /// Path used for key derivation.
        path: PathBuf,
        /// Discriminator used for key derivation.
        id: char,
        /// Underlying system error.
        #[source]
        source: io::Error,
    },

    /// A creation step failed and the partially created semaphore could not
    /// be removed either.
    #[error(
        "could not {op} new semaphore for path {}, id {id}: {source}; \
         removing it also failed ({cleanup}), please remove it with `ipcrm -s {sem_id}`",
        path.display()
    )]
    Orphaned {
        /// Creation step that failed.
        op: &'static str,
        /// Path used for key derivation.
        path: PathBuf,
        /// Discriminator used for key derivation.
        id: char,
        /// Kernel id of the leaked semaphore.
        sem_id: i32,
        /// Error from the failed creation step.
        #[source]
        source: io::Error,
        /// Error from the failed removal.
        cleanup: io::Error,
    },
}

impl ClsemError {
    /// Creates a new usage error.
    #[must_use]
    pub fn usage(reason: impl Into<String>) -> Self {
        Self::Usage {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors caused by bad arguments.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. })
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        if self.is_usage() {
            EXIT_USAGE
        } else {
            EXIT_FAILURE
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClsemError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_exit_code() {
        let err = ClsemError::usage("key id must be one character");
        assert!(err.is_usage());
        assert_eq!(err.exit_code(), EXIT_USAGE);
        assert_eq!(err.to_string(), "key id must be one character");
    }

    #[test]
    fn test_failure_exit_code() {
        let err = ClsemError::AlreadyExists {
            path: PathBuf::from("/tmp/x"),
            id: '1',
        };
        assert!(!err.is_usage());
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_message_names_operation_path_and_id() {
        let err = ClsemError::System {
            op: "read",
            path: PathBuf::from("/tmp/x"),
            id: 'a',
            source: io::Error::from_raw_os_error(libc::EPERM),
        };
        let msg = err.to_string();
        assert!(msg.contains("could not read semaphore"));
        assert!(msg.contains("/tmp/x"));
        assert!(msg.contains("id a"));
    }

    #[test]
    fn test_orphaned_message_has_ipcrm_hint() {
        let err = ClsemError::Orphaned {
            op: "initialize",
            path: PathBuf::from("/tmp/x"),
            id: '1',
            sem_id: 42,
            source: io::Error::from_raw_os_error(libc::ERANGE),
            cleanup: io::Error::from_raw_os_error(libc::EPERM),
        };
        assert!(err.to_string().contains("ipcrm -s 42"));
    }
}
