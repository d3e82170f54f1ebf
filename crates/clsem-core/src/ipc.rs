//! Kernel IPC backend.
//!
//! [`IpcBackend`] is the seam between the lifecycle protocol and the kernel
//! semaphore primitive. [`SysV`] implements it with System V semaphore sets
//! holding a single counter.

use std::fmt;
use std::io;
use std::mem;
use std::time::Duration;

/// Kernel-assigned identifier of a semaphore set.
///
/// Valid for the lifetime of the kernel object; every invocation re-resolves
/// it from the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreHandle(libc::c_int);

impl SemaphoreHandle {
    /// Wraps a raw kernel id.
    #[must_use]
    pub const fn from_raw(id: libc::c_int) -> Self {
        Self(id)
    }

    /// The raw kernel id, as shown by `ipcs -s`.
    #[must_use]
    pub const fn as_raw(self) -> libc::c_int {
        self.0
    }
}

impl fmt::Display for SemaphoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owner credentials applied when a semaphore becomes ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    /// Owning user id.
    pub uid: libc::uid_t,
    /// Owning group id.
    pub gid: libc::gid_t,
}

impl Owner {
    /// Credentials of the calling process.
    #[must_use]
    pub fn current() -> Self {
        Self {
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        }
    }
}

/// Kernel semaphore primitive used by the lifecycle protocol.
///
/// Every method maps to a single kernel call and reports the raw OS error;
/// classifying errors is left to the caller.
pub trait IpcBackend {
    /// Exclusively creates a single-counter semaphore for `key` with the
    /// given permission bits. Fails with `EEXIST` if one already exists.
    fn create_exclusive(&self, key: libc::key_t, mode: u32) -> io::Result<SemaphoreHandle>;

    /// Opens the existing semaphore for `key`, requesting the access in
    /// `mode`. Fails with `ENOENT` if it does not exist and `EACCES` if the
    /// requested access is not granted.
    fn open(&self, key: libc::key_t, mode: u32) -> io::Result<SemaphoreHandle>;

    /// Sets the counter value.
    fn set_value(&self, handle: SemaphoreHandle, value: i32) -> io::Result<()>;

    /// Reads the counter value.
    fn value(&self, handle: SemaphoreHandle) -> io::Result<i32>;

    /// Sets owner, group and permission bits.
    fn set_owner_and_mode(&self, handle: SemaphoreHandle, owner: Owner, mode: u32)
    -> io::Result<()>;

    /// Reads the permission bits.
    fn mode(&self, handle: SemaphoreHandle) -> io::Result<u32>;

    /// Atomically adds `delta` to the counter. With `nowait` a decrement that
    /// would block fails with `EAGAIN` instead.
    fn adjust(&self, handle: SemaphoreHandle, delta: i16, nowait: bool) -> io::Result<()>;

    /// Removes the semaphore.
    fn remove(&self, handle: SemaphoreHandle) -> io::Result<()>;

    /// Pauses between acquisition attempts.
    fn pause(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// System V semaphore backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysV;

/// Converts a `-1`-on-error return into an `io::Result`.
fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn semget(key: libc::key_t, flags: libc::c_int) -> io::Result<SemaphoreHandle> {
    // SAFETY: semget takes only scalar arguments.
    #[allow(unsafe_code)]
    let id = unsafe { libc::semget(key, 1, flags) };
    check(id).map(SemaphoreHandle)
}

fn stat(handle: SemaphoreHandle) -> io::Result<libc::semid_ds> {
    // SAFETY: semid_ds is plain old data; all-zero is a valid value.
    #[allow(unsafe_code)]
    let mut ds: libc::semid_ds = unsafe { mem::zeroed() };
    // SAFETY: IPC_STAT writes into `ds`, which is a valid, exclusively
    // borrowed semid_ds for the duration of the call.
    #[allow(unsafe_code)]
    let ret = unsafe {
        libc::semctl(
            handle.0,
            0,
            libc::IPC_STAT,
            std::ptr::addr_of_mut!(ds),
        )
    };
    check(ret)?;
    Ok(ds)
}

/// Converts permission bits to the `semget` flag representation.
#[allow(clippy::cast_possible_wrap)] // permission bits are at most 0o777
const fn mode_flags(mode: u32) -> libc::c_int {
    (mode & 0o777) as libc::c_int
}

impl IpcBackend for SysV {
    fn create_exclusive(&self, key: libc::key_t, mode: u32) -> io::Result<SemaphoreHandle> {
        semget(key, libc::IPC_CREAT | libc::IPC_EXCL | mode_flags(mode))
    }

    fn open(&self, key: libc::key_t, mode: u32) -> io::Result<SemaphoreHandle> {
        semget(key, mode_flags(mode))
    }

    fn set_value(&self, handle: SemaphoreHandle, value: i32) -> io::Result<()> {
        // SAFETY: SETVAL reads the fourth argument as `union semun.val`;
        // passing a c_int is the documented calling convention.
        #[allow(unsafe_code)]
        let ret = unsafe { libc::semctl(handle.0, 0, libc::SETVAL, value) };
        check(ret).map(drop)
    }

    fn value(&self, handle: SemaphoreHandle) -> io::Result<i32> {
        // SAFETY: GETVAL takes no fourth argument.
        #[allow(unsafe_code)]
        let ret = unsafe { libc::semctl(handle.0, 0, libc::GETVAL) };
        check(ret)
    }

    fn set_owner_and_mode(
        &self,
        handle: SemaphoreHandle,
        owner: Owner,
        mode: u32,
    ) -> io::Result<()> {
        // IPC_SET only reads uid, gid and mode from the buffer.
        // SAFETY: semid_ds is plain old data; all-zero is a valid value.
        #[allow(unsafe_code)]
        let mut ds: libc::semid_ds = unsafe { mem::zeroed() };
        ds.sem_perm.uid = owner.uid;
        ds.sem_perm.gid = owner.gid;
        #[allow(clippy::cast_possible_truncation)]
        let mode_bits = (mode & 0o777) as _;
        ds.sem_perm.mode = mode_bits;
        // SAFETY: IPC_SET reads from `ds`, which is valid for the duration
        // of the call.
        #[allow(unsafe_code)]
        let ret = unsafe {
            libc::semctl(
                handle.0,
                0,
                libc::IPC_SET,
                std::ptr::addr_of_mut!(ds),
            )
        };
        check(ret).map(drop)
    }

    fn mode(&self, handle: SemaphoreHandle) -> io::Result<u32> {
        let ds = stat(handle)?;
        Ok(u32::from(ds.sem_perm.mode) & 0o777)
    }

    fn adjust(&self, handle: SemaphoreHandle, delta: i16, nowait: bool) -> io::Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let flags = if nowait {
            libc::IPC_NOWAIT as libc::c_short
        } else {
            0
        };
        let mut op = libc::sembuf {
            sem_num: 0,
            sem_op: delta,
            sem_flg: flags,
        };
        loop {
            // SAFETY: `op` is a valid sembuf and we pass a count of one.
            #[allow(unsafe_code)]
            let ret = unsafe { libc::semop(handle.0, std::ptr::addr_of_mut!(op), 1) };
            match check(ret) {
                Ok(_) => return Ok(()),
                // A blocked decrement interrupted by a signal has not been
                // applied; try again.
                Err(err) if err.raw_os_error() == Some(libc::EINTR) => {},
                Err(err) => return Err(err),
            }
        }
    }

    fn remove(&self, handle: SemaphoreHandle) -> io::Result<()> {
        // SAFETY: IPC_RMID takes no fourth argument.
        #[allow(unsafe_code)]
        let ret = unsafe { libc::semctl(handle.0, 0, libc::IPC_RMID) };
        check(ret).map(drop)
    }
}
