//! Graceful stop support via a process-wide atomic flag.
//!
//! Workers poll the flag between work units; the in-flight unit is
//! always finished (output written, checkpoint recorded) before exit.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global stop flag, set by the SIGTERM/SIGINT handler.
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

pub fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}

/// Request a graceful stop (signal handlers, tests).
pub fn request_shutdown() {
    shutdown_flag().store(true, Ordering::Relaxed);
}

/// Clear the stop flag. The flag is process-global, so tests that set
/// it must clear it again.
pub fn clear_shutdown() {
    shutdown_flag().store(false, Ordering::Relaxed);
}
