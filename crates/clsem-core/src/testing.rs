//! In-memory [`IpcBackend`] for protocol tests.
//!
//! Semaphores live in a map keyed by IPC key. Permission checks are made
//! from the owner's point of view. Decrements never block: anything the
//! kernel would wait on fails with `EAGAIN`. Faults can be injected per
//! kernel call, and concurrent creators are simulated by state changes that
//! fire after a given number of pauses.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use crate::ipc::{IpcBackend, Owner, SemaphoreHandle};
use crate::visibility::MODE_READY;

const SEMVMX: i32 = 32_767;

/// Kernel calls recorded by the fake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    CreateExclusive,
    Open,
    SetValue,
    Value,
    SetOwnerAndMode,
    Mode,
    Adjust,
    Remove,
}

#[derive(Debug)]
struct Entry {
    id: libc::c_int,
    mode: u32,
    value: i32,
}

#[derive(Debug, Default)]
struct Faults {
    create: Option<i32>,
    open: Option<i32>,
    set_value: Option<i32>,
    set_mode: Option<i32>,
    remove: Option<i32>,
}

#[derive(Debug, Default)]
struct State {
    next_id: libc::c_int,
    sems: HashMap<libc::key_t, Entry>,
    faults: Faults,
    calls: Vec<Call>,
    pauses: Vec<Duration>,
    mode_at_set_value: Option<u32>,
    ready_after_pauses: Option<usize>,
    appear_after_pauses: Option<(usize, libc::key_t)>,
}

impl State {
    fn by_id(&mut self, handle: SemaphoreHandle) -> io::Result<&mut Entry> {
        self.sems
            .values_mut()
            .find(|entry| entry.id == handle.as_raw())
            .ok_or_else(|| os_error(libc::EINVAL))
    }
}

fn os_error(errno: i32) -> io::Error {
    io::Error::from_raw_os_error(errno)
}

fn fault(injected: Option<i32>) -> io::Result<()> {
    injected.map_or(Ok(()), |errno| Err(os_error(errno)))
}

/// Fake kernel semaphore table.
#[derive(Debug, Default)]
pub(crate) struct FakeIpc {
    state: Mutex<State>,
}

impl FakeIpc {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().expect("fake ipc lock poisoned");
        f(&mut state)
    }

    pub(crate) fn fail_create(&self, errno: i32) {
        self.with(|s| s.faults.create = Some(errno));
    }

    pub(crate) fn fail_open(&self, errno: i32) {
        self.with(|s| s.faults.open = Some(errno));
    }

    pub(crate) fn fail_set_value(&self, errno: i32) {
        self.with(|s| s.faults.set_value = Some(errno));
    }

    pub(crate) fn fail_set_mode(&self, errno: i32) {
        self.with(|s| s.faults.set_mode = Some(errno));
    }

    pub(crate) fn fail_remove(&self, errno: i32) {
        self.with(|s| s.faults.remove = Some(errno));
    }

    pub(crate) fn clear_faults(&self) {
        self.with(|s| s.faults = Faults::default());
    }

    /// Widens every initializing semaphore once `n` pauses have happened.
    pub(crate) fn ready_after_pauses(&self, n: usize) {
        self.with(|s| s.ready_after_pauses = Some(n));
    }

    /// Creates a ready semaphore for `key` once `n` pauses have happened.
    pub(crate) fn appear_after_pauses(&self, n: usize, key: libc::key_t) {
        self.with(|s| s.appear_after_pauses = Some((n, key)));
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub(crate) fn open_count(&self) -> usize {
        self.with(|s| s.calls.iter().filter(|c| **c == Call::Open).count())
    }

    pub(crate) fn pauses(&self) -> Vec<Duration> {
        self.with(|s| s.pauses.clone())
    }

    pub(crate) fn mode_at_set_value(&self) -> Option<u32> {
        self.with(|s| s.mode_at_set_value)
    }

    pub(crate) fn mode_of(&self, key: libc::key_t) -> Option<u32> {
        self.with(|s| s.sems.get(&key).map(|entry| entry.mode))
    }

    pub(crate) fn exists(&self, key: libc::key_t) -> bool {
        self.with(|s| s.sems.contains_key(&key))
    }
}

impl IpcBackend for FakeIpc {
    fn create_exclusive(&self, key: libc::key_t, mode: u32) -> io::Result<SemaphoreHandle> {
        self.with(|s| {
            s.calls.push(Call::CreateExclusive);
            fault(s.faults.create)?;
            if s.sems.contains_key(&key) {
                return Err(os_error(libc::EEXIST));
            }
            s.next_id += 1;
            let id = s.next_id;
            s.sems.insert(key, Entry { id, mode, value: 0 });
            Ok(SemaphoreHandle::from_raw(id))
        })
    }

    fn open(&self, key: libc::key_t, mode: u32) -> io::Result<SemaphoreHandle> {
        self.with(|s| {
            s.calls.push(Call::Open);
            fault(s.faults.open)?;
            let entry = s.sems.get(&key).ok_or_else(|| os_error(libc::ENOENT))?;
            let wants_read = mode & 0o444 != 0;
            if wants_read && entry.mode & 0o400 == 0 {
                return Err(os_error(libc::EACCES));
            }
            Ok(SemaphoreHandle::from_raw(entry.id))
        })
    }

    fn set_value(&self, handle: SemaphoreHandle, value: i32) -> io::Result<()> {
        self.with(|s| {
            s.calls.push(Call::SetValue);
            fault(s.faults.set_value)?;
            let entry = s.by_id(handle)?;
            let mode = entry.mode;
            entry.value = value;
            s.mode_at_set_value = Some(mode);
            Ok(())
        })
    }

    fn value(&self, handle: SemaphoreHandle) -> io::Result<i32> {
        self.with(|s| {
            s.calls.push(Call::Value);
            Ok(s.by_id(handle)?.value)
        })
    }

    fn set_owner_and_mode(
        &self,
        handle: SemaphoreHandle,
        _owner: Owner,
        mode: u32,
    ) -> io::Result<()> {
        self.with(|s| {
            s.calls.push(Call::SetOwnerAndMode);
            fault(s.faults.set_mode)?;
            s.by_id(handle)?.mode = mode;
            Ok(())
        })
    }

    fn mode(&self, handle: SemaphoreHandle) -> io::Result<u32> {
        self.with(|s| {
            s.calls.push(Call::Mode);
            Ok(s.by_id(handle)?.mode)
        })
    }

    fn adjust(&self, handle: SemaphoreHandle, delta: i16, _nowait: bool) -> io::Result<()> {
        self.with(|s| {
            s.calls.push(Call::Adjust);
            let entry = s.by_id(handle)?;
            let next = entry.value + i32::from(delta);
            if (delta == 0 && entry.value != 0) || next < 0 {
                return Err(os_error(libc::EAGAIN));
            }
            if next > SEMVMX {
                return Err(os_error(libc::ERANGE));
            }
            entry.value = next;
            Ok(())
        })
    }

    fn remove(&self, handle: SemaphoreHandle) -> io::Result<()> {
        self.with(|s| {
            s.calls.push(Call::Remove);
            fault(s.faults.remove)?;
            let key = s
                .sems
                .iter()
                .find(|(_, entry)| entry.id == handle.as_raw())
                .map(|(key, _)| *key)
                .ok_or_else(|| os_error(libc::EINVAL))?;
            s.sems.remove(&key);
            Ok(())
        })
    }

    fn pause(&self, interval: Duration) {
        self.with(|s| {
            s.pauses.push(interval);
            let paused = s.pauses.len();
            if s.ready_after_pauses == Some(paused) {
                for entry in s.sems.values_mut() {
                    entry.mode = MODE_READY;
                }
            }
            if let Some((n, key)) = s.appear_after_pauses {
                if n == paused {
                    s.next_id += 1;
                    let id = s.next_id;
                    s.sems.insert(
                        key,
                        Entry {
                            id,
                            mode: MODE_READY,
                            value: 0,
                        },
                    );
                }
            }
        });
    }
}
