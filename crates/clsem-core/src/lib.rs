//! # clsem-core
//!
//! Race-safe creation and use of a named System V semaphore.
//!
//! A semaphore is addressed by a filesystem path plus a one-character
//! discriminator, resolved to an IPC key with `ftok(3)`. Independent,
//! unsynchronized processes may create and use the same semaphore at the same
//! time; two protocols make that safe without any shared lock:
//!
//! - **Gated visibility** ([`SemaphoreManager::create`]): the creator makes
//!   the semaphore write-only, sets its value, then widens the permissions.
//! - **Poll-and-wait** ([`SemaphoreManager::acquire`]): users open it for
//!   read and retry a bounded number of times while it is missing or still
//!   unreadable.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use clsem_core::{Discriminator, SemaphoreManager, resolve};
//!
//! # fn main() -> clsem_core::Result<()> {
//! let key = resolve(Path::new("/tmp/x"), Discriminator::default())?;
//! let manager = SemaphoreManager::new();
//!
//! let created = manager.create(&key)?;
//! println!("{}", created.handle());
//!
//! let sem = manager.acquire(&key)?;
//! sem.adjust(5)?;
//! assert_eq!(sem.value()?, 5);
//! sem.delete()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ipc;
pub mod key;
pub mod lifecycle;
pub mod operation;
pub mod visibility;

#[cfg(test)]
mod testing;

pub use config::{AdjustMode, PollPolicy};
pub use error::{ClsemError, Result};
pub use ipc::{IpcBackend, Owner, SemaphoreHandle, SysV};
pub use key::{DEFAULT_DISCRIMINATOR, Discriminator, SemaphoreKey, resolve, resolve_str};
pub use lifecycle::{Semaphore, SemaphoreManager};
pub use operation::Operation;
pub use visibility::VisibilityState;
