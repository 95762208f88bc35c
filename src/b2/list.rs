//! B2 list operations

use log::debug;

use super::session::B2Client;
use super::types::{ListFileNamesRequest, ListFileNamesResponse, ListPage, RemoteEntry};
use crate::error::TransferResult;

/// Page size for `b2_list_file_names`
pub const DEFAULT_MAX_FILE_COUNT: u32 = 1000;

impl B2Client {
    /// List one page of file names in a bucket
    pub async fn list_file_names(
        &self,
        bucket_id: &str,
        prefix: Option<&str>,
        max_count: u32,
        start_key: Option<&str>,
    ) -> TransferResult<ListPage> {
        let request = ListFileNamesRequest {
            bucket_id,
            max_file_count: max_count,
            prefix: prefix.filter(|p| !p.is_empty()),
            start_file_name: start_key.filter(|k| !k.is_empty()),
        };

        let response: ListFileNamesResponse =
            self.post_api("b2_list_file_names", &request).await?;

        Ok(ListPage {
            entries: response.files.into_iter().map(RemoteEntry::from).collect(),
            next_key: response.next_file_name.filter(|k| !k.is_empty()),
        })
    }

    /// List every object under a prefix, following `nextFileName` until exhausted
    pub async fn list_all_files(
        &self,
        bucket_id: &str,
        prefix: &str,
        progress_callback: Option<Box<dyn Fn(usize) + Send + Sync>>,
    ) -> TransferResult<Vec<RemoteEntry>> {
        let mut all_entries: Vec<RemoteEntry> = Vec::new();
        let mut start_key: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            let page = self
                .list_file_names(
                    bucket_id,
                    Some(prefix),
                    DEFAULT_MAX_FILE_COUNT,
                    start_key.as_deref(),
                )
                .await?;
            page_count += 1;

            all_entries.extend(page.entries);
            if let Some(ref cb) = progress_callback {
                cb(all_entries.len());
            }

            match page.next_key {
                Some(next) => start_key = Some(next),
                None => break,
            }
        }

        debug!(
            "list_all_done: bucket={} prefix={:?} pages={} entries={}",
            bucket_id,
            prefix,
            page_count,
            all_entries.len()
        );
        Ok(all_entries)
    }
}
