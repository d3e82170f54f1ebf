//! Operations of the `clsem` command.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Any resolution, protocol or kernel failure
//! - 2: Usage error (bad arguments)

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clsem_core::{AdjustMode, ClsemError, SemaphoreManager, resolve_str};
pub use clsem_core::operation::{Operation, PROGRAM};

/// Exit codes for the `clsem` command.
pub mod exit_codes {
    pub use clsem_core::error::{EXIT_FAILURE as FAILURE, EXIT_USAGE as USAGE};

    /// Operation completed.
    pub const SUCCESS: u8 = 0;
}

/// Returns the key path an operation needs.
///
/// # Errors
///
/// Returns the operation's usage line if the path is missing.
pub fn require_path(op: Operation, path: Option<&Path>) -> Result<&Path, ClsemError> {
    path.ok_or_else(|| ClsemError::usage(op.usage()))
}

/// Print name and version.
pub fn version(out: &mut impl Write) -> Result<()> {
    writeln!(out, "{PROGRAM} {}", env!("CARGO_PKG_VERSION")).context("failed to write version")
}

/// Create the semaphore and print its kernel id.
pub fn create(out: &mut impl Write, path: &Path, id: &str) -> Result<()> {
    let key = resolve_str(path, id)?;
    let manager = SemaphoreManager::new();
    let sem = manager.create(&key)?;
    writeln!(out, "{}", sem.handle()).context("failed to write semaphore id")
}

/// Adjust the semaphore by `delta`.
pub fn adjust(path: &Path, id: &str, delta: i16, mode: AdjustMode) -> Result<()> {
    let key = resolve_str(path, id)?;
    let manager = SemaphoreManager::new().adjust_mode(mode);
    let sem = manager.acquire(&key)?;
    sem.adjust(delta)?;
    Ok(())
}

/// Print the semaphore value.
pub fn value(out: &mut impl Write, path: &Path, id: &str) -> Result<()> {
    let key = resolve_str(path, id)?;
    let manager = SemaphoreManager::new();
    let sem = manager.acquire(&key)?;
    let value = sem.value()?;
    writeln!(out, "{value}").context("failed to write semaphore value")
}

/// Delete the semaphore.
pub fn delete(path: &Path, id: &str) -> Result<()> {
    let key = resolve_str(path, id)?;
    let manager = SemaphoreManager::new();
    let sem = manager.acquire(&key)?;
    sem.delete()?;
    Ok(())
}

/// Exit code for an error returned by one of the operations.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<ClsemError>()
        .map_or(exit_codes::FAILURE, ClsemError::exit_code)
}

/// Renders an error for the diagnostic line.
///
/// Library errors already carry their system error text; anything else is
/// printed with its full context chain.
#[must_use]
pub fn render(err: &anyhow::Error) -> String {
    err.downcast_ref::<ClsemError>()
        .map_or_else(|| format!("{err:#}"), ToString::to_string)
}
