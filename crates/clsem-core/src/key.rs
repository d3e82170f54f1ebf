//! Key resolution.
//!
//! A semaphore is addressed only by a filesystem path plus a one-character
//! discriminator. The pair is turned into a System V IPC key with `ftok(3)`,
//! which derives the key from the inode and device numbers of the path and
//! the low byte of the discriminator. The file contents are irrelevant.
//!
//! Resolution happens independently in every process that touches the
//! semaphore, so it must be deterministic: the same path and discriminator on
//! the same filesystem always yield the same key.

use std::ffi::CString;
use std::fmt;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::error::{ClsemError, Result};

/// Discriminator used when the caller does not supply one.
pub const DEFAULT_DISCRIMINATOR: char = '1';

/// A validated one-character key discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Discriminator(u8);

impl Discriminator {
    /// Validates a discriminator argument.
    ///
    /// # Errors
    ///
    /// Returns [`ClsemError::Usage`] unless `id` is exactly one non-NUL
    /// ASCII character.
    pub fn parse(id: &str) -> Result<Self> {
        let mut chars = id.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Err(ClsemError::usage("key id must be one character"));
        };
        Self::try_from(c)
    }

    /// The discriminator as a character.
    #[must_use]
    pub const fn as_char(self) -> char {
        self.0 as char
    }
}

impl Default for Discriminator {
    fn default() -> Self {
        Self(DEFAULT_DISCRIMINATOR as u8)
    }
}

impl TryFrom<char> for Discriminator {
    type Error = ClsemError;

    fn try_from(c: char) -> Result<Self> {
        if !c.is_ascii() || c == '\0' {
            return Err(ClsemError::usage(format!(
                "key id must be a single ASCII character, got {c:?}"
            )));
        }
        // ASCII checked above.
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(c as u8))
    }
}

impl fmt::Display for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A resolved IPC key, together with the inputs it was derived from.
///
/// The inputs are kept only so that diagnostics can name the semaphore the
/// way the user did; the key itself is the `raw` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemaphoreKey {
    raw: libc::key_t,
    path: PathBuf,
    id: Discriminator,
}

impl SemaphoreKey {
    /// The numeric IPC key.
    #[must_use]
    pub const fn raw(&self) -> libc::key_t {
        self.raw
    }

    /// The path the key was derived from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The discriminator the key was derived from.
    #[must_use]
    pub const fn id(&self) -> Discriminator {
        self.id
    }

    /// Builds a key from an already computed raw value.
    #[cfg(test)]
    pub(crate) fn from_raw(raw: libc::key_t, path: impl Into<PathBuf>, id: Discriminator) -> Self {
        Self {
            raw,
            path: path.into(),
            id,
        }
    }
}

impl fmt::Display for SemaphoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.raw)
    }
}

/// Resolves `(path, id)` to an IPC key.
///
/// # Errors
///
/// Returns [`ClsemError::Resolution`] if the path cannot be stat-ed or
/// contains an interior NUL byte.
pub fn resolve(path: &Path, id: Discriminator) -> Result<SemaphoreKey> {
    let resolution_error = |source| ClsemError::Resolution {
        path: path.to_path_buf(),
        id: id.as_char(),
        source,
    };

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        resolution_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path contains a NUL byte",
        ))
    })?;

    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the
    // call. ftok only stats the path.
    #[allow(unsafe_code)]
    let raw = unsafe { libc::ftok(c_path.as_ptr(), libc::c_int::from(id.0)) };
    if raw == -1 {
        return Err(resolution_error(io::Error::last_os_error()));
    }

    tracing::debug!(path = %path.display(), id = %id, key = raw, "resolved semaphore key");
    Ok(SemaphoreKey {
        raw,
        path: path.to_path_buf(),
        id,
    })
}

/// Validates `id` and resolves `(path, id)`.
///
/// The discriminator is validated before the filesystem is touched, so a bad
/// id is always reported as a usage error.
///
/// # Errors
///
/// Returns [`ClsemError::Usage`] for a bad discriminator and
/// [`ClsemError::Resolution`] if the path cannot be stat-ed.
pub fn resolve_str(path: &Path, id: &str) -> Result<SemaphoreKey> {
    let id = Discriminator::parse(id)?;
    resolve(path, id)
}
