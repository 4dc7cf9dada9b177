//! Single-flight guard shared by scheduled and manual runs of a job.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether a run of a job is in flight.
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    /// Claim the guard, returning `None` while another run holds it.
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                running: Arc::clone(&self.running),
            })
    }

    /// Whether a run currently holds the guard.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Proof of an in-flight run; releases the guard on drop.
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
