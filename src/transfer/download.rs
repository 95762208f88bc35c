//! Single-object download streamed to a local file

use futures_util::StreamExt;
use log::{debug, info};
use reqwest::header::AUTHORIZATION;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::control::TransferController;
use super::progress::{ItemProgress, Phase, ProgressFn};
use crate::b2::B2Client;
use crate::error::{read_failure, TransferError, TransferResult};

/// Write block size for downloads (256 KiB)
pub const DOWNLOAD_BLOCK_SIZE: usize = 256 * 1024;

/// Streams one remote object to one local path.
pub struct DownloadPipeline<'a> {
    client: &'a B2Client,
    controller: &'a TransferController,
    block_size: usize,
}

impl<'a> DownloadPipeline<'a> {
    pub fn new(client: &'a B2Client, controller: &'a TransferController) -> Self {
        Self {
            client,
            controller,
            block_size: DOWNLOAD_BLOCK_SIZE,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Download `key` into `destination`, returning the bytes written.
    ///
    /// A stopped download removes its partial file.
    pub async fn download_file(
        &self,
        bucket_name: &str,
        key: &str,
        destination: &Path,
        progress: &ProgressFn,
    ) -> TransferResult<u64> {
        let session = self.client.session()?;
        let url = self.client.make_direct_url(bucket_name, key, None)?;
        self.controller.checkpoint().await?;

        info!("download_start: key={} dest={}", key, destination.display());
        let response = self
            .client
            .http()
            .get(&url)
            .header(AUTHORIZATION, &session.auth_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, message) = read_failure(response).await;
            return Err(TransferError::Download { status, message });
        }

        // 0 means the length is unknown
        let total = response.content_length().unwrap_or(0);

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(destination).await?;

        match self
            .stream_body(response, &mut file, total, progress)
            .await
        {
            Ok(written) => {
                info!("download_done: key={} bytes={}", key, written);
                Ok(written)
            }
            Err(err) => {
                drop(file);
                if err.is_stopped() {
                    debug!("download_stopped: key={} removing partial file", key);
                    let _ = tokio::fs::remove_file(destination).await;
                }
                Err(err)
            }
        }
    }

    async fn stream_body(
        &self,
        response: reqwest::Response,
        file: &mut File,
        total: u64,
        progress: &ProgressFn,
    ) -> TransferResult<u64> {
        let mut stream = response.bytes_stream();
        let mut write_buffer: Vec<u8> = Vec::with_capacity(self.block_size);
        let mut written: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            self.controller.checkpoint().await?;
            let chunk = chunk_result?;
            write_buffer.extend_from_slice(&chunk);

            while write_buffer.len() >= self.block_size {
                let block: Vec<u8> = write_buffer.drain(..self.block_size).collect();
                file.write_all(&block).await?;
                written += block.len() as u64;
                progress(ItemProgress {
                    phase: Phase::Download,
                    processed: written,
                    total,
                });
                self.controller.checkpoint().await?;
            }
        }

        if !write_buffer.is_empty() {
            file.write_all(&write_buffer).await?;
            written += write_buffer.len() as u64;
            progress(ItemProgress {
                phase: Phase::Download,
                processed: written,
                total,
            });
        }
        file.flush().await?;
        Ok(written)
    }
}
