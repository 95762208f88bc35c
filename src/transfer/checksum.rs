//! Streaming SHA-1 over a local file with progress and cancellation

use log::debug;
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::control::TransferController;
use super::progress::{ItemProgress, Phase, ProgressFn};
use crate::error::TransferResult;

/// Hash-phase block size (1 MiB)
pub const HASH_BLOCK_SIZE: usize = 1024 * 1024;

/// Reads a file once, front to back, producing its SHA-1 digest.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumReader {
    block_size: usize,
}

impl Default for ChecksumReader {
    fn default() -> Self {
        Self::new(HASH_BLOCK_SIZE)
    }
}

impl ChecksumReader {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    /// Hex SHA-1 of the file. Ticks `(hash, processed, total)` after every
    /// block and once more at `processed == total`.
    pub async fn digest_file(
        &self,
        path: &Path,
        total: u64,
        controller: &TransferController,
        progress: &ProgressFn,
    ) -> TransferResult<String> {
        let mut file = File::open(path).await?;
        let mut hasher = Sha1::new();
        let mut buffer = vec![0u8; self.block_size];
        let mut processed: u64 = 0;

        loop {
            controller.checkpoint().await?;
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            processed += read as u64;
            progress(ItemProgress {
                phase: Phase::Hash,
                processed,
                total,
            });
        }

        progress(ItemProgress {
            phase: Phase::Hash,
            processed: total,
            total,
        });

        let digest = hex::encode(hasher.finalize());
        debug!(
            "hash_done: path={} bytes={} sha1={}",
            path.display(),
            processed,
            digest
        );
        Ok(digest)
    }
}

/// Hex SHA-1 of an in-memory buffer
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}
