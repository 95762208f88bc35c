//! Background job runner with a single process-wide active slot

use log::{error, info, warn};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::control::TransferController;
use super::progress::{JobStatus, ProgressReporter, TransferEvent};
use crate::error::{TransferError, TransferResult};
use crate::history::{self, HistoryEntry, HistoryStore};

struct ActiveJob {
    id: u64,
    action: String,
    controller: TransferController,
}

// Global slot for the one running transfer job
lazy_static::lazy_static! {
    static ref ACTIVE_JOB: Mutex<Option<ActiveJob>> = Mutex::new(None);
}

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Handed to the job body
#[derive(Clone)]
pub struct JobContext {
    pub controller: TransferController,
    pub reporter: ProgressReporter,
}

/// What a successful job reports to history
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobOutcome {
    pub details: String,
    pub bytes: u64,
}

impl JobOutcome {
    pub fn new(details: impl Into<String>, bytes: u64) -> Self {
        Self {
            details: details.into(),
            bytes,
        }
    }

    pub fn files(count: usize, bytes: u64) -> Self {
        Self::new(format!("{} files", count), bytes)
    }
}

pub struct JobHandle {
    pub controller: TransferController,
    /// Progress ticks, then one `Finished`; closes when the job is done
    pub events: mpsc::UnboundedReceiver<TransferEvent>,
    pub join: JoinHandle<TransferResult<JobOutcome>>,
}

impl JobHandle {
    /// Wait for the job, dropping any events not yet read
    pub async fn wait(self) -> TransferResult<JobOutcome> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(TransferError::Io(std::io::Error::other(e))),
        }
    }
}

/// Releases the slot when the job ends, however it ends
struct SlotGuard {
    id: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slot = ACTIVE_JOB.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().map(|job| job.id) == Some(self.id) {
            *slot = None;
        }
    }
}

fn claim_slot(action: &str) -> TransferResult<(SlotGuard, TransferController)> {
    let mut slot = ACTIVE_JOB.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(job) = slot.as_ref() {
        warn!("job_rejected: action={} active={}", action, job.action);
        return Err(TransferError::JobActive);
    }
    let id = NEXT_JOB_ID.fetch_add(1, Ordering::SeqCst);
    let controller = TransferController::new();
    *slot = Some(ActiveJob {
        id,
        action: action.to_string(),
        controller: controller.clone(),
    });
    Ok((SlotGuard { id }, controller))
}

/// Run `job` on the runtime's worker pool as the active transfer.
///
/// Fails with `JobActive` when another job holds the slot. Every finished job
/// appends one history entry (success, stopped or error) and sends a
/// `Finished` event after the slot is released.
pub fn spawn_job<F, Fut>(
    action: &str,
    history: Option<Arc<dyn HistoryStore>>,
    job: F,
) -> TransferResult<JobHandle>
where
    F: FnOnce(JobContext) -> Fut,
    Fut: Future<Output = TransferResult<JobOutcome>> + Send + 'static,
{
    let (guard, controller) = claim_slot(action)?;
    let (reporter, events) = ProgressReporter::channel();
    let action = action.to_string();
    info!("job_start: action={} id={}", action, guard.id);

    let body = job(JobContext {
        controller: controller.clone(),
        reporter: reporter.clone(),
    });

    let join = tokio::spawn(async move {
        let result = body.await;
        drop(guard);

        let (status, message, entry) = match &result {
            Ok(outcome) => {
                info!(
                    "job_done: action={} details={} bytes={}",
                    action, outcome.details, outcome.bytes
                );
                (
                    JobStatus::Success,
                    outcome.details.clone(),
                    HistoryEntry::now(&action, &JobStatus::Success, &outcome.details, outcome.bytes),
                )
            }
            Err(err) if err.is_stopped() => {
                info!("job_stopped: action={}", action);
                (
                    JobStatus::Stopped,
                    err.to_string(),
                    HistoryEntry::now(&action, &JobStatus::Stopped, err.to_string(), 0),
                )
            }
            Err(err) => {
                error!("job_failed: action={} error={}", action, err);
                (
                    JobStatus::Error,
                    err.to_string(),
                    HistoryEntry::now(&action, &JobStatus::Error, err.to_string(), 0),
                )
            }
        };

        if let Some(store) = history {
            history::record(store, entry).await;
        }

        reporter.send(TransferEvent::Finished {
            action,
            status,
            message,
        });
        result
    });

    Ok(JobHandle {
        controller,
        events,
        join,
    })
}

fn with_active<R>(f: impl FnOnce(&ActiveJob) -> R) -> Option<R> {
    let slot = ACTIVE_JOB.lock().unwrap_or_else(|e| e.into_inner());
    slot.as_ref().map(f)
}

/// Pause the running job. Returns false when no job is running.
pub fn pause_active_transfer() -> bool {
    with_active(|job| job.controller.pause()).is_some()
}

pub fn resume_active_transfer() -> bool {
    with_active(|job| job.controller.resume()).is_some()
}

pub fn stop_active_transfer() -> bool {
    with_active(|job| job.controller.stop()).is_some()
}

/// Action name of the running job
pub fn active_job() -> Option<String> {
    with_active(|job| job.action.clone())
}
