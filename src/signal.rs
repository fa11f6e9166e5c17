//! SIGINT/SIGTERM handling.
//!
//! The first signal is only recorded; the server loop notices it between
//! requests and drains. A second signal while the first is still pending
//! exits the process immediately with `128 + signo`.

use std::sync::atomic::{AtomicI32, Ordering};

static RECEIVED: AtomicI32 = AtomicI32::new(0);

/// The first termination signal received, if any.
pub fn received() -> Option<i32> {
    match RECEIVED.load(Ordering::SeqCst) {
        0 => None,
        signo => Some(signo),
    }
}

#[cfg(unix)]
extern "C" fn on_signal(signo: libc::c_int) {
    if RECEIVED
        .compare_exchange(0, signo, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        // only async-signal-safe calls from here
        unsafe { libc::_exit(128 + signo) }
    }
}

/// Installs the handlers. Safe to call more than once.
#[cfg(unix)]
pub fn install() {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
}

#[cfg(not(unix))]
pub fn install() {}
