//! Single-file upload: hash pass, fresh upload target, streamed body

use bytes::Bytes;
use futures_util::StreamExt;
use log::{debug, info};
use reqwest::Body;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::checksum::{ChecksumReader, HASH_BLOCK_SIZE};
use super::control::TransferController;
use super::progress::{ItemProgress, Phase, ProgressFn};
use crate::b2::{B2Client, UploadedFile};
use crate::error::{TransferError, TransferResult};

/// Uploads one local file to one key.
pub struct UploadPipeline<'a> {
    client: &'a B2Client,
    controller: &'a TransferController,
    checksum: ChecksumReader,
    block_size: usize,
}

impl<'a> UploadPipeline<'a> {
    pub fn new(client: &'a B2Client, controller: &'a TransferController) -> Self {
        Self {
            client,
            controller,
            checksum: ChecksumReader::default(),
            block_size: HASH_BLOCK_SIZE,
        }
    }

    /// Use `block_size` for both the hash pass and the body stream
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self.checksum = ChecksumReader::new(self.block_size);
        self
    }

    pub async fn upload_file(
        &self,
        bucket_id: &str,
        local_path: &Path,
        key: &str,
        progress: &ProgressFn,
    ) -> TransferResult<UploadedFile> {
        // Fail before touching the disk when there is no session
        self.client.session()?;

        let total = tokio::fs::metadata(local_path).await?.len();
        info!(
            "upload_start: key={} path={} size={}",
            key,
            local_path.display(),
            total
        );

        let sha1 = self
            .checksum
            .digest_file(local_path, total, self.controller, progress)
            .await?;

        let target = self.client.get_upload_url(bucket_id).await?;
        self.controller.checkpoint().await?;

        let file = File::open(local_path).await?;
        let sent = Arc::new(AtomicU64::new(0));
        let stopped_mid_stream = Arc::new(AtomicBool::new(false));

        let stream = {
            let sent = sent.clone();
            let stopped_mid_stream = stopped_mid_stream.clone();
            let controller = self.controller.clone();
            let progress = progress.clone();
            ReaderStream::with_capacity(file, self.block_size).then(move |chunk_result| {
                let sent = sent.clone();
                let stopped_mid_stream = stopped_mid_stream.clone();
                let controller = controller.clone();
                let progress = progress.clone();
                async move {
                    if controller.checkpoint().await.is_err() {
                        stopped_mid_stream.store(true, Ordering::SeqCst);
                        return Err(io::Error::new(io::ErrorKind::Interrupted, "stopped"));
                    }
                    let chunk = chunk_result?;
                    let processed =
                        sent.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
                    progress(ItemProgress {
                        phase: Phase::Upload,
                        processed,
                        total,
                    });
                    Ok::<Bytes, io::Error>(chunk)
                }
            })
        };

        let result = self
            .client
            .send_upload(&target, key, &sha1, total, Body::wrap_stream(stream))
            .await;

        let uploaded = match result {
            Ok(uploaded) => uploaded,
            Err(err) => {
                if stopped_mid_stream.load(Ordering::SeqCst) || self.controller.is_stopped() {
                    debug!("upload_stopped: key={} sent={}", key, sent.load(Ordering::SeqCst));
                    return Err(TransferError::Stopped);
                }
                return Err(err);
            }
        };

        progress(ItemProgress {
            phase: Phase::Upload,
            processed: total,
            total,
        });
        info!(
            "upload_done: key={} file_id={} bytes={}",
            key, uploaded.file_id, total
        );
        Ok(uploaded)
    }
}
