//! Transfer module - moving bytes between local disk and the bucket
//!
//! This module is organized into submodules:
//! - `control`: Pause/stop flags polled at block boundaries
//! - `progress`: Item ticks, job events, percent math
//! - `checksum`: Streaming SHA-1 pass
//! - `upload` / `download`: Single-item pipelines
//! - `retry`: Bounded per-item retry
//! - `batch`: Sequential batches with global byte progress
//! - `queue`: Pending upload queue
//! - `worker`: Background job runner and the active-job slot

mod batch;
mod checksum;
mod control;
mod download;
mod progress;
mod queue;
mod retry;
mod upload;
mod worker;

pub use batch::{
    download_batch, local_path_for, upload_batch, BatchContext, BatchSummary, DownloadItem,
    TransferJob, UploadItem, UploadKind,
};
pub use checksum::{sha1_hex, ChecksumReader, HASH_BLOCK_SIZE};
pub use control::{TransferController, PAUSE_POLL_INTERVAL};
pub use download::{DownloadPipeline, DOWNLOAD_BLOCK_SIZE};
pub use progress::{
    format_bytes, no_progress, percent_of, ItemProgress, JobStatus, Phase, ProgressFn,
    ProgressReporter, TransferEvent,
};
pub use queue::UploadQueue;
pub use retry::RetryPolicy;
pub use upload::UploadPipeline;
pub use worker::{
    active_job, pause_active_transfer, resume_active_transfer, spawn_job, stop_active_transfer,
    JobContext, JobHandle, JobOutcome,
};
