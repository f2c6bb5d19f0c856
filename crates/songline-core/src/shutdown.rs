//! Cooperative cancellation via a process-wide atomic flag.
//!
//! Phase loops check the flag between items, never mid-item, so every item
//! finished before the signal keeps its ledger entry.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Process-wide shutdown flag, set by the SIGTERM/SIGINT handler
pub fn shutdown_flag() -> &'static AtomicBool {
    &SHUTDOWN
}

pub fn is_shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
