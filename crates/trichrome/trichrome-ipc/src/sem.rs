//! Named POSIX semaphores.
//!
//! `nix` does not wrap the `sem_open` family, so this module goes through
//! `libc` directly and exposes owning handle types: the creator unlinks the
//! name on drop, openers only close their handle.
//!
//! Blocking waits are tri-state: `Acquired`, `Interrupted` (EINTR, the
//! caller re-checks shutdown and decides whether to retry) or a hard error.

use std::ffi::CString;
use std::io;

use crate::names::IpcNames;

/// Result of one blocking wait attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The semaphore was decremented.
    Acquired,
    /// The wait was interrupted by a signal before acquiring. The caller
    /// must re-check for a pending shutdown before retrying.
    Interrupted,
}

pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: CString,
    owner: bool,
}

// A sem_t handle may be used from any thread; all operations on it are
// thread-safe at the OS level.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Creates a new named semaphore with the given initial value.
    /// Fails if the name already exists.
    pub fn create(name: &str, initial: u32) -> io::Result<Self> {
        let c_name = to_c_name(name)?;
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::mode_t,
                initial as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            sem,
            name: c_name,
            owner: true,
        })
    }

    /// Opens an existing named semaphore.
    pub fn open(name: &str) -> io::Result<Self> {
        let c_name = to_c_name(name)?;
        let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            sem,
            name: c_name,
            owner: false,
        })
    }

    /// One blocking decrement attempt.
    pub fn wait(&self) -> io::Result<WaitOutcome> {
        if unsafe { libc::sem_wait(self.sem) } == 0 {
            return Ok(WaitOutcome::Acquired);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            Ok(WaitOutcome::Interrupted)
        } else {
            Err(err)
        }
    }

    /// Increments the semaphore, waking one blocked waiter if any.
    pub fn post(&self) -> io::Result<()> {
        if unsafe { libc::sem_post(self.sem) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Acquires the semaphore as a lock, retrying interruptions, and returns
    /// a guard that posts on drop. Used where the caller must complete its
    /// critical section regardless of pending signals (the section is short
    /// and never blocks).
    pub fn lock(&self) -> io::Result<MutexGuard<'_>> {
        loop {
            match self.wait()? {
                WaitOutcome::Acquired => return Ok(MutexGuard { sem: self }),
                WaitOutcome::Interrupted => continue,
            }
        }
    }

    /// Wraps an already-acquired semaphore in a releasing guard.
    pub(crate) fn guard(&self) -> MutexGuard<'_> {
        MutexGuard { sem: self }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
            if self.owner {
                libc::sem_unlink(self.name.as_ptr());
            }
        }
    }
}

/// Releases the mutex semaphore when dropped, so the lock cannot leak on
/// any exit path (early return, `?`, panic unwind).
pub struct MutexGuard<'a> {
    sem: &'a NamedSemaphore,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        // A failed post here would mean the semaphore handle itself is
        // broken; nothing useful can be done from a destructor.
        let _ = self.sem.post();
    }
}

/// The three semaphores governing ring access: `free` counts writable
/// slots, `used` counts readable slots, `mutex` serializes all position and
/// slot mutation.
pub struct SemaphoreTriple {
    pub free: NamedSemaphore,
    pub used: NamedSemaphore,
    pub mutex: NamedSemaphore,
}

impl SemaphoreTriple {
    /// Supervisor side: creates all three with initial values
    /// `capacity`/`0`/`1`.
    pub fn create(names: &IpcNames, capacity: u32) -> io::Result<Self> {
        Ok(Self {
            free: NamedSemaphore::create(&names.sem_free(), capacity)?,
            used: NamedSemaphore::create(&names.sem_used(), 0)?,
            mutex: NamedSemaphore::create(&names.sem_mutex(), 1)?,
        })
    }

    /// Generator side: opens the existing triple.
    pub fn open(names: &IpcNames) -> io::Result<Self> {
        Ok(Self {
            free: NamedSemaphore::open(&names.sem_free())?,
            used: NamedSemaphore::open(&names.sem_used())?,
            mutex: NamedSemaphore::open(&names.sem_mutex())?,
        })
    }
}

fn to_c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "semaphore name contains a NUL byte",
        )
    })
}
