//! Progress ticks, job events and percent math

use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Which loop produced an item-level tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Hash,
    Upload,
    Download,
}

/// Item-level progress emitted by the pipelines after every block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemProgress {
    pub phase: Phase,
    pub processed: u64,
    /// 0 when unknown (download without a declared length)
    pub total: u64,
}

/// Item-level progress listener handed to the pipelines
pub type ProgressFn = Arc<dyn Fn(ItemProgress) + Send + Sync>;

/// Listener that drops every tick
pub fn no_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// Final state of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Stopped,
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::Stopped => write!(f, "stopped"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// Event delivered to the front end over the job channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    Progress {
        percent: u32,
        message: String,
    },
    Finished {
        action: String,
        status: JobStatus,
        message: String,
    },
}

/// Sends `(percent, message)` ticks of one job to its front end.
///
/// The reported percent never goes backwards within a job, even when a retry
/// restarts an item from its beginning.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<TransferEvent>>,
    last_percent: Arc<AtomicU32>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransferEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
                last_percent: Arc::new(AtomicU32::new(0)),
            },
            receiver,
        )
    }

    /// Reporter without a listener
    pub fn silent() -> Self {
        Self {
            sender: None,
            last_percent: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn report(&self, percent: u32, message: impl Into<String>) {
        let percent = percent.min(100);
        let shown = self
            .last_percent
            .fetch_max(percent, Ordering::SeqCst)
            .max(percent);
        self.send(TransferEvent::Progress {
            percent: shown,
            message: message.into(),
        });
    }

    pub fn last_percent(&self) -> u32 {
        self.last_percent.load(Ordering::SeqCst)
    }

    pub(crate) fn send(&self, event: TransferEvent) {
        if let Some(sender) = &self.sender {
            // Receiver dropped means nobody is watching; the job keeps going.
            let _ = sender.send(event);
        }
    }
}

/// Integer percent of `done / total`; a zero total counts as complete.
pub fn percent_of(done: u64, total: u64) -> u32 {
    if total == 0 {
        return 100;
    }
    let percent = (u128::from(done) * 100) / u128::from(total);
    percent.min(100) as u32
}

/// Human-readable size with a 1024 base
pub fn format_bytes(num_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = num_bytes as f64;
    let mut unit_idx = 0;
    while value >= 1024.0 && unit_idx < UNITS.len() - 1 {
        value /= 1024.0;
        unit_idx += 1;
    }
    if unit_idx == 0 {
        format!("{} {}", num_bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit_idx])
    }
}
