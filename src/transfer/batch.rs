//! Sequential batch runner: one item at a time, global byte progress, per-item retry

use log::info;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::control::TransferController;
use super::download::DownloadPipeline;
use super::progress::{format_bytes, percent_of, ItemProgress, Phase, ProgressFn, ProgressReporter};
use super::retry::RetryPolicy;
use super::upload::UploadPipeline;
use crate::b2::B2Client;
use crate::error::{TransferError, TransferResult};

/// Byte counters of one running batch.
///
/// `bytes_completed` only grows and never passes `total_bytes`.
#[derive(Debug)]
pub struct TransferJob {
    total_bytes: u64,
    bytes_completed: AtomicU64,
}

impl TransferJob {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            bytes_completed: AtomicU64::new(0),
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn bytes_completed(&self) -> u64 {
        self.bytes_completed.load(Ordering::SeqCst)
    }

    /// Add a finished item's bytes; returns the new counter
    pub fn advance(&self, bytes: u64) -> u64 {
        let total = self.total_bytes;
        let previous = self
            .bytes_completed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |done| {
                Some(done.saturating_add(bytes).min(total))
            })
            .unwrap_or_else(|done| done);
        previous.saturating_add(bytes).min(total)
    }

    /// Final "done" tick
    pub fn finish(&self) {
        self.bytes_completed.store(self.total_bytes, Ordering::SeqCst);
    }

    pub fn percent(&self) -> u32 {
        percent_of(self.bytes_completed(), self.total_bytes)
    }

    /// Global percent with `in_flight` bytes of the current item added
    pub fn percent_with(&self, in_flight: u64) -> u32 {
        percent_of(
            self.bytes_completed().saturating_add(in_flight),
            self.total_bytes,
        )
    }

    pub fn left_with(&self, in_flight: u64) -> u64 {
        self.total_bytes
            .saturating_sub(self.bytes_completed().saturating_add(in_flight))
    }
}

/// One local file headed for the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    pub local_path: PathBuf,
    /// Key relative to the destination prefix, `/`-separated
    pub target: String,
    pub size: u64,
}

impl UploadItem {
    pub fn destination_key(&self, prefix: &str) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            self.target.clone()
        } else {
            format!("{}/{}", prefix, self.target)
        }
    }

    fn label(&self) -> String {
        self.local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.target.clone())
    }
}

/// One remote object headed for local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub key: String,
    pub local_path: PathBuf,
    /// Size from the listing, used for the batch total
    pub expected_size: u64,
}

impl DownloadItem {
    /// Place `relative` (a `/`-separated key suffix) under `root`
    pub fn under_root(
        root: &Path,
        key: impl Into<String>,
        relative: &str,
        expected_size: u64,
    ) -> TransferResult<Self> {
        Ok(Self {
            key: key.into(),
            local_path: local_path_for(root, relative)?,
            expected_size,
        })
    }

    fn label(&self) -> &str {
        self.key.rsplit('/').find(|s| !s.is_empty()).unwrap_or(&self.key)
    }
}

/// Join a `/`-separated relative key onto a local root, refusing to escape it
pub fn local_path_for(root: &Path, relative: &str) -> TransferResult<PathBuf> {
    let mut path = root.to_path_buf();
    let mut pushed = false;
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => {
                path.push(part);
                pushed = true;
            }
            (Some(Component::CurDir), None) => {}
            _ => {
                return Err(TransferError::validation(format!(
                    "Refusing to write outside the destination: {}",
                    relative
                )))
            }
        }
    }
    if !pushed {
        return Err(TransferError::validation(format!(
            "Key has no file name: {}",
            relative
        )));
    }
    Ok(path)
}

/// Wording of an upload batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Upload,
    Sync,
}

impl UploadKind {
    fn verb(self) -> &'static str {
        match self {
            UploadKind::Upload => "Uploading",
            UploadKind::Sync => "Syncing",
        }
    }
}

/// Everything a batch needs besides its items
pub struct BatchContext<'a> {
    pub client: &'a B2Client,
    pub controller: &'a TransferController,
    pub reporter: &'a ProgressReporter,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub files: usize,
    pub bytes: u64,
}

/// Upload `items` in order. A failed item aborts the rest of the batch.
pub async fn upload_batch(
    ctx: &BatchContext<'_>,
    bucket_id: &str,
    prefix: &str,
    items: &[UploadItem],
    kind: UploadKind,
) -> TransferResult<BatchSummary> {
    let total_files = items.len();
    let job = Arc::new(TransferJob::new(items.iter().map(|i| i.size).sum()));
    let pipeline = UploadPipeline::new(ctx.client, ctx.controller);
    let pipeline = &pipeline;
    info!(
        "upload_batch_start: files={} bytes={} prefix={:?}",
        total_files,
        job.total_bytes(),
        prefix
    );

    for (index, item) in items.iter().enumerate() {
        let position = index + 1;
        ctx.controller.checkpoint().await?;

        let key = item.destination_key(prefix);
        let label = item.label();
        ctx.reporter.report(
            job.percent(),
            format!(
                "[{}/{}] Preparing {} | {} / {} uploaded, left {}",
                position,
                total_files,
                label,
                format_bytes(job.bytes_completed()),
                format_bytes(job.total_bytes()),
                format_bytes(job.left_with(0))
            ),
        );

        let progress: ProgressFn = {
            let job = job.clone();
            let reporter = ctx.reporter.clone();
            let label = label.clone();
            Arc::new(move |tick: ItemProgress| match tick.phase {
                Phase::Hash => reporter.report(
                    job.percent(),
                    format!(
                        "[{}/{}] Calculating checksum for {}...",
                        position, total_files, label
                    ),
                ),
                _ => {
                    let current = job.bytes_completed().saturating_add(tick.processed);
                    reporter.report(
                        job.percent_with(tick.processed),
                        format!(
                            "[{}/{}] {} {} | {} / {} uploaded, left {}",
                            position,
                            total_files,
                            kind.verb(),
                            label,
                            format_bytes(current.min(job.total_bytes())),
                            format_bytes(job.total_bytes()),
                            format_bytes(job.left_with(tick.processed))
                        ),
                    )
                }
            })
        };
        let progress = &progress;
        let local_path = item.local_path.as_path();
        let key_ref = key.as_str();

        ctx.retry
            .run(
                ctx.controller,
                |attempt, max_attempts, _| {
                    ctx.reporter.report(
                        job.percent(),
                        format!(
                            "[{}/{}] Retry {}/{} for {}...",
                            position,
                            total_files,
                            attempt,
                            max_attempts.saturating_sub(1),
                            label
                        ),
                    )
                },
                move |_| pipeline.upload_file(bucket_id, local_path, key_ref, progress),
            )
            .await?;

        let done = job.advance(item.size);
        info!(
            "upload_item_done: [{}/{}] key={} batch_bytes={}/{}",
            position,
            total_files,
            key,
            done,
            job.total_bytes()
        );
    }

    job.finish();
    let total = format_bytes(job.total_bytes());
    let message = match kind {
        UploadKind::Upload => format!("Upload completed | {} / {} uploaded, left 0 B", total, total),
        UploadKind::Sync => format!("Sync completed: {} file(s)", total_files),
    };
    ctx.reporter.report(100, message);

    Ok(BatchSummary {
        files: total_files,
        bytes: job.bytes_completed(),
    })
}

/// Download `items` in order. Progress advances by the size written to disk.
pub async fn download_batch(
    ctx: &BatchContext<'_>,
    bucket_name: &str,
    items: &[DownloadItem],
) -> TransferResult<BatchSummary> {
    let total_files = items.len();
    let job = Arc::new(TransferJob::new(
        items.iter().map(|i| i.expected_size).sum(),
    ));
    let pipeline = DownloadPipeline::new(ctx.client, ctx.controller);
    let pipeline = &pipeline;
    let mut written_total: u64 = 0;
    info!(
        "download_batch_start: files={} expected_bytes={}",
        total_files,
        job.total_bytes()
    );

    for (index, item) in items.iter().enumerate() {
        let position = index + 1;
        ctx.controller.checkpoint().await?;

        let label = item.label().to_string();
        ctx.reporter.report(
            job.percent(),
            format!("[{}/{}] Downloading {}...", position, total_files, label),
        );

        let progress: ProgressFn = {
            let job = job.clone();
            let reporter = ctx.reporter.clone();
            Arc::new(move |tick: ItemProgress| {
                let current = job.bytes_completed().saturating_add(tick.processed);
                reporter.report(
                    job.percent_with(tick.processed),
                    format!(
                        "[{}/{}] {} / {} downloaded, left {}",
                        position,
                        total_files,
                        format_bytes(current.min(job.total_bytes())),
                        format_bytes(job.total_bytes()),
                        format_bytes(job.left_with(tick.processed))
                    ),
                )
            })
        };
        let progress = &progress;
        let key = item.key.as_str();
        let local_path = item.local_path.as_path();

        let written = ctx
            .retry
            .run(
                ctx.controller,
                |attempt, max_attempts, _| {
                    ctx.reporter.report(
                        job.percent(),
                        format!(
                            "[{}/{}] Retry {}/{} for {}...",
                            position,
                            total_files,
                            attempt,
                            max_attempts.saturating_sub(1),
                            label
                        ),
                    )
                },
                move |_| pipeline.download_file(bucket_name, key, local_path, progress),
            )
            .await?;

        let on_disk = tokio::fs::metadata(&item.local_path)
            .await
            .map(|meta| meta.len())
            .unwrap_or(written);
        written_total = written_total.saturating_add(on_disk);
        let done = job.advance(on_disk);
        info!(
            "download_item_done: [{}/{}] key={} bytes={} batch_bytes={}/{}",
            position,
            total_files,
            item.key,
            on_disk,
            done,
            job.total_bytes()
        );
    }

    job.finish();
    ctx.reporter.report(100, "Download completed");

    Ok(BatchSummary {
        files: total_files,
        bytes: written_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_counter_clamps_to_total() {
        let job = TransferJob::new(100);
        assert_eq!(job.advance(60), 60);
        assert_eq!(job.advance(60), 100);
        assert_eq!(job.bytes_completed(), 100);
        assert_eq!(job.percent(), 100);
    }

    #[test]
    fn zero_total_job_is_complete() {
        let job = TransferJob::new(0);
        assert_eq!(job.percent(), 100);
        assert_eq!(job.percent_with(10), 100);
        job.finish();
        assert_eq!(job.bytes_completed(), 0);
    }

    #[test]
    fn percent_includes_in_flight_bytes() {
        let job = TransferJob::new(200);
        job.advance(50);
        assert_eq!(job.percent_with(50), 50);
        assert_eq!(job.left_with(50), 100);
    }

    #[test]
    fn destination_key_joins_trimmed_prefix() {
        let item = UploadItem {
            local_path: PathBuf::from("/tmp/a.txt"),
            target: "docs/a.txt".into(),
            size: 1,
        };
        assert_eq!(item.destination_key(""), "docs/a.txt");
        assert_eq!(item.destination_key("/backup/"), "backup/docs/a.txt");
    }

    #[test]
    fn local_path_stays_under_root() {
        let root = Path::new("/data/out");
        assert_eq!(
            local_path_for(root, "a/b/c.txt").unwrap(),
            PathBuf::from("/data/out/a/b/c.txt")
        );
        assert_eq!(
            local_path_for(root, "./x//y.bin").unwrap(),
            PathBuf::from("/data/out/x/y.bin")
        );
        assert!(local_path_for(root, "../etc/passwd").is_err());
        assert!(local_path_for(root, "a/../../b").is_err());
        assert!(local_path_for(root, "/").is_err());
    }
}
