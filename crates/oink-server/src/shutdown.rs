//! Cross-thread stop request for a blocking readiness loop.
//!
//! Setting the flag alone is not enough: a loop parked in `poll` with no
//! timeout would never see it. [`ShutdownToken::cancel`] sets the flag and
//! then fires the loop's waker.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mio::Waker;
use tracing::debug;

/// Shared stop flag bound to one poll instance's waker.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownToken {
    /// Creates a token that wakes `waker` when cancelled.
    pub fn new(waker: Waker) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            waker: Arc::new(waker),
        }
    }

    /// Requests shutdown and wakes the loop. Idempotent.
    pub fn cancel(&self) -> io::Result<()> {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("shutdown requested");
        }
        self.waker.wake()
    }

    /// Whether shutdown was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
