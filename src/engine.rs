//! Front-end facing operations: one call per user action

use log::info;
use std::path::Path;
use std::sync::Arc;

use crate::b2::{B2Client, RemoteEntry, Session};
use crate::config::{validate_ttl, TransferConfig};
use crate::error::{TransferError, TransferResult};
use crate::history::{self, HistoryEntry, HistoryStore};
use crate::sync::{listing_prefix, run_sync, SyncOutcome};
use crate::transfer::{
    download_batch, upload_batch, BatchContext, BatchSummary, DownloadItem, JobContext,
    JobStatus, RetryPolicy, UploadItem, UploadKind,
};
use crate::tree::Listing;

pub struct TransferEngine {
    client: B2Client,
    config: TransferConfig,
    history: Option<Arc<dyn HistoryStore>>,
}

impl TransferEngine {
    pub fn new(config: TransferConfig) -> TransferResult<Self> {
        let client = B2Client::new(config.auth_url.as_deref())?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: TransferConfig, client: B2Client) -> Self {
        Self {
            client,
            config,
            history: None,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn client(&self) -> &B2Client {
        &self.client
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn history(&self) -> Option<Arc<dyn HistoryStore>> {
        self.history.clone()
    }

    /// Authorize, reusing the cached session when it is still valid
    pub async fn authorize(&self) -> TransferResult<Session> {
        self.client.ensure_authorized(&self.config.credentials).await
    }

    fn batch_context<'a>(&'a self, job: &'a JobContext) -> BatchContext<'a> {
        BatchContext {
            client: &self.client,
            controller: &job.controller,
            reporter: &job.reporter,
            retry: RetryPolicy::from(&self.config.retry),
        }
    }

    /// Full listing under `prefix` (the configured prefix when `None`)
    pub async fn fetch_listing(
        &self,
        prefix: Option<&str>,
        progress_callback: Option<Box<dyn Fn(usize) + Send + Sync>>,
    ) -> TransferResult<Listing> {
        let bucket_id = self.config.require_bucket_id()?;
        self.authorize().await?;
        let prefix = prefix.unwrap_or(&self.config.prefix).trim_matches('/');
        let entries = self
            .client
            .list_all_files(bucket_id, &listing_prefix(prefix), progress_callback)
            .await?;
        info!("listing_fetched: prefix={:?} entries={}", prefix, entries.len());
        Ok(Listing::new(prefix, entries))
    }

    /// Upload queued items under the configured prefix
    pub async fn upload(
        &self,
        job: &JobContext,
        items: &[UploadItem],
    ) -> TransferResult<BatchSummary> {
        let bucket_id = self.config.require_bucket_id()?;
        if items.is_empty() {
            return Err(TransferError::validation("Select one or more files first."));
        }
        self.authorize().await?;
        upload_batch(
            &self.batch_context(job),
            bucket_id,
            &self.config.prefix,
            items,
            UploadKind::Upload,
        )
        .await
    }

    pub async fn download(
        &self,
        job: &JobContext,
        items: &[DownloadItem],
    ) -> TransferResult<BatchSummary> {
        let bucket_name = self.config.require_bucket_name()?;
        if items.is_empty() {
            return Err(TransferError::validation(
                "Select one or more files in the bucket first.",
            ));
        }
        self.authorize().await?;
        download_batch(&self.batch_context(job), bucket_name, items).await
    }

    /// Download listed objects, each to `<destination>/<full key>`
    pub async fn download_entries(
        &self,
        job: &JobContext,
        entries: &[RemoteEntry],
        destination: &Path,
    ) -> TransferResult<BatchSummary> {
        let items = entries
            .iter()
            .filter(|entry| !entry.key.ends_with('/'))
            .map(|entry| DownloadItem::under_root(destination, &entry.key, &entry.key, entry.size))
            .collect::<TransferResult<Vec<_>>>()?;
        self.download(job, &items).await
    }

    /// Download every object below `prefix`, keeping key paths under `destination`
    pub async fn download_prefix(
        &self,
        job: &JobContext,
        prefix: &str,
        destination: &Path,
    ) -> TransferResult<BatchSummary> {
        self.config.require_bucket_name()?;
        let prefix = prefix.trim().trim_matches('/');
        if prefix.is_empty() {
            return Err(TransferError::validation(
                "Set a folder prefix to download (e.g. media/2026/).",
            ));
        }

        job.reporter.report(0, "Loading folder file list...");
        let listing = self.fetch_listing(Some(prefix), None).await?;
        let entries: Vec<RemoteEntry> = listing
            .entries
            .into_iter()
            .filter(|entry| !entry.key.is_empty() && !entry.key.ends_with('/'))
            .collect();
        if entries.is_empty() {
            return Err(TransferError::validation(format!(
                "No files found for prefix: {}",
                prefix
            )));
        }

        job.reporter.report(
            0,
            format!("Found {} file(s). Starting download...", entries.len()),
        );
        self.download_entries(job, &entries, destination).await
    }

    /// Upload the files of `local_root` that are missing or resized under the configured prefix
    pub async fn sync(&self, job: &JobContext, local_root: &Path) -> TransferResult<SyncOutcome> {
        let bucket_id = self.config.require_bucket_id()?;
        self.authorize().await?;
        run_sync(
            &self.batch_context(job),
            bucket_id,
            &self.config.prefix,
            local_root,
        )
        .await
    }

    /// Direct URL for a public bucket
    pub async fn public_link(&self, key: &str) -> TransferResult<String> {
        let bucket_name = self.config.require_bucket_name()?;
        self.authorize().await?;
        let url = self.client.make_direct_url(bucket_name, key, None)?;
        self.record("share-public", key).await;
        Ok(url)
    }

    /// Time-limited URL for a private bucket; `ttl` defaults to the configured one
    pub async fn private_link(&self, key: &str, ttl: Option<i64>) -> TransferResult<String> {
        let bucket_id = self.config.require_bucket_id()?;
        let bucket_name = self.config.require_bucket_name()?;
        let ttl = match ttl {
            Some(seconds) => validate_ttl(seconds)?,
            None => self.config.private_ttl,
        };
        self.authorize().await?;
        let url = self
            .client
            .private_link(bucket_id, bucket_name, key, ttl)
            .await?;
        self.record("share-private", key).await;
        Ok(url)
    }

    async fn record(&self, action: &str, details: &str) {
        if let Some(history) = &self.history {
            let entry = HistoryEntry::now(action, &JobStatus::Success, details, 0);
            history::record(history.clone(), entry).await;
        }
    }
}
