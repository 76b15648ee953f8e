//! Scoped SIGINT/SIGTERM handling.
//!
//! A signal handler can only touch async-signal-safe state, so the handler
//! sets a flag that the session polls while it waits for the backend. The
//! flag and the installed marker are reset whenever a guard is installed or
//! dropped, so nothing carries over from one session to the next.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, SessionError};

static INSTALLED: AtomicBool = AtomicBool::new(false);
static PENDING: AtomicBool = AtomicBool::new(false);

/// Owns the process interrupt handlers for as long as it lives.
///
/// Dropping the guard restores whatever handlers were installed before.
pub struct InterruptGuard {
    #[cfg(unix)]
    previous: Vec<(libc::c_int, libc::sigaction)>,
}

impl InterruptGuard {
    /// Install the handlers. Fails if another guard is alive.
    pub fn install() -> Result<Self> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(SessionError::InterruptHandlerBusy);
        }
        PENDING.store(false, Ordering::SeqCst);
        Self::install_handlers().inspect_err(|_| INSTALLED.store(false, Ordering::SeqCst))
    }

    #[cfg(unix)]
    fn install_handlers() -> Result<Self> {
        let mut previous = Vec::new();
        for signum in [libc::SIGINT, libc::SIGTERM] {
            match unix::install(signum) {
                Ok(action) => previous.push((signum, action)),
                Err(e) => {
                    unix::restore(&previous);
                    return Err(e.into());
                }
            }
        }
        Ok(Self { previous })
    }

    #[cfg(not(unix))]
    fn install_handlers() -> Result<Self> {
        Ok(Self {})
    }

    /// Returns `true` once per received signal batch.
    pub fn take_pending(&self) -> bool {
        PENDING.swap(false, Ordering::SeqCst)
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        unix::restore(&self.previous);
        PENDING.store(false, Ordering::SeqCst);
        INSTALLED.store(false, Ordering::SeqCst);
    }
}

impl fmt::Debug for InterruptGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptGuard").finish_non_exhaustive()
    }
}

#[cfg(unix)]
mod unix {
    use std::io;
    use std::sync::atomic::Ordering;

    use super::PENDING;

    extern "C" fn on_signal(_signum: libc::c_int) {
        PENDING.store(true, Ordering::SeqCst);
    }

    pub(super) fn install(signum: libc::c_int) -> io::Result<libc::sigaction> {
        // SAFETY: `sigaction` is plain C data and all-zero is a valid value.
        let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
        action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        // SAFETY: as above.
        let mut previous: libc::sigaction = unsafe { std::mem::zeroed() };

        // SAFETY: `sa_mask` points into `action`, which outlives the call.
        unsafe { libc::sigemptyset(&mut action.sa_mask) };
        // SAFETY: `on_signal` only stores to an atomic, which is
        // async-signal-safe. Both pointers are valid for the call.
        if unsafe { libc::sigaction(signum, &action, &mut previous) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(previous)
    }

    pub(super) fn restore(previous: &[(libc::c_int, libc::sigaction)]) {
        for (signum, action) in previous {
            // SAFETY: `action` was filled in by a successful `sigaction`.
            unsafe { libc::sigaction(*signum, action, std::ptr::null_mut()) };
        }
    }
}
