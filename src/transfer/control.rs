//! Cooperative pause/stop flags shared by every loop of one transfer job

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{TransferError, TransferResult};

/// Poll interval while a transfer is paused
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Flags {
    paused: AtomicBool,
    stopped: AtomicBool,
}

/// Pause/resume/stop handle for one job.
///
/// Clones share the same flags. Pipelines call [`checkpoint`](Self::checkpoint)
/// at every block boundary; in-flight requests are never aborted.
#[derive(Debug, Clone, Default)]
pub struct TransferController {
    flags: Arc<Flags>,
}

impl TransferController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        if !self.is_stopped() {
            self.flags.paused.store(true, Ordering::SeqCst);
        }
    }

    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::SeqCst);
    }

    /// Request a stop. Clears pause so a paused loop wakes up and exits.
    pub fn stop(&self) {
        self.flags.stopped.store(true, Ordering::SeqCst);
        self.flags.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.flags.stopped.load(Ordering::SeqCst)
    }

    /// Fail with `Stopped` when a stop was requested; wait while paused.
    pub async fn checkpoint(&self) -> TransferResult<()> {
        loop {
            if self.is_stopped() {
                return Err(TransferError::Stopped);
            }
            if !self.is_paused() {
                return Ok(());
            }
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
        }
    }
}
