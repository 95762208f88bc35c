//! One-way folder sync: upload local files that are missing or differ in size remotely

use log::info;
use std::collections::HashMap;
use std::path::Path;

use crate::b2::RemoteEntry;
use crate::error::TransferResult;
use crate::local::{scan_local_tree, LocalFile};
use crate::transfer::{
    upload_batch, BatchContext, BatchSummary, UploadItem, UploadKind,
};

/// Remote key (relative to the sync prefix) to size
pub type RemoteIndex = HashMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to upload; no transfer was started
    UpToDate,
    Synced(BatchSummary),
}

/// Listing prefix for a sync rooted at `prefix`
pub fn listing_prefix(prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix)
    }
}

/// Index remote entries by key relative to `prefix`
pub fn remote_index(entries: &[RemoteEntry], prefix: &str) -> RemoteIndex {
    let strip = listing_prefix(prefix);
    entries
        .iter()
        .filter(|entry| !entry.key.is_empty() && !entry.key.ends_with('/'))
        .map(|entry| {
            let relative = entry.key.strip_prefix(&strip).unwrap_or(&entry.key);
            (relative.to_string(), entry.size)
        })
        .collect()
}

/// Files to upload: absent remotely, or present with a different size.
///
/// Equal-size files are treated as unchanged even if their content differs.
pub fn diff(local: &[LocalFile], remote: &RemoteIndex) -> Vec<UploadItem> {
    local
        .iter()
        .filter(|file| remote.get(&file.relative_path) != Some(&file.size))
        .map(|file| UploadItem {
            local_path: file.path.clone(),
            target: file.relative_path.clone(),
            size: file.size,
        })
        .collect()
}

/// Walk `local_root` and diff it against the remote listing
pub async fn plan_sync(
    local_root: &Path,
    remote_entries: &[RemoteEntry],
    prefix: &str,
) -> TransferResult<Vec<UploadItem>> {
    let index = remote_index(remote_entries, prefix);
    let local = scan_local_tree(local_root).await?;
    let selected = diff(&local, &index);
    info!(
        "sync_plan: root={} local_files={} remote_files={} selected={}",
        local_root.display(),
        local.len(),
        index.len(),
        selected.len()
    );
    Ok(selected)
}

/// List the remote prefix, diff, and upload the selection through the batch runner
pub async fn run_sync(
    ctx: &BatchContext<'_>,
    bucket_id: &str,
    prefix: &str,
    local_root: &Path,
) -> TransferResult<SyncOutcome> {
    ctx.reporter.report(0, "Sync: loading remote index...");
    let remote = ctx
        .client
        .list_all_files(bucket_id, &listing_prefix(prefix), None)
        .await?;
    let selected = plan_sync(local_root, &remote, prefix).await?;

    if selected.is_empty() {
        ctx.reporter.report(100, "Sync: everything is up to date.");
        return Ok(SyncOutcome::UpToDate);
    }

    let summary = upload_batch(ctx, bucket_id, prefix, &selected, UploadKind::Sync).await?;
    Ok(SyncOutcome::Synced(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn local(relative: &str, size: u64) -> LocalFile {
        LocalFile {
            path: PathBuf::from("/root").join(relative),
            relative_path: relative.to_string(),
            size,
        }
    }

    #[test]
    fn index_strips_prefix_and_skips_folder_markers() {
        let entries = vec![
            RemoteEntry::new("backup/a.txt", 3, 0),
            RemoteEntry::new("backup/sub/", 0, 0),
            RemoteEntry::new("backup/sub/b.txt", 5, 0),
        ];
        let index = remote_index(&entries, "/backup/");
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("a.txt"), Some(&3));
        assert_eq!(index.get("sub/b.txt"), Some(&5));
    }

    #[test]
    fn diff_selects_missing_and_resized_only() {
        let mut remote = RemoteIndex::new();
        remote.insert("same.txt".into(), 10);
        remote.insert("grown.txt".into(), 10);

        let files = vec![local("same.txt", 10), local("grown.txt", 11), local("new/x.bin", 0)];
        let targets: Vec<String> = diff(&files, &remote).into_iter().map(|i| i.target).collect();
        assert_eq!(targets, vec!["grown.txt", "new/x.bin"]);
    }

    #[test]
    fn diff_is_idempotent_after_upload() {
        let files = vec![local("a.txt", 1), local("dir/b.txt", 2)];
        let first = diff(&files, &RemoteIndex::new());
        assert_eq!(first.len(), 2);

        let uploaded: Vec<RemoteEntry> = first
            .iter()
            .map(|item| RemoteEntry::new(item.destination_key("p"), item.size, 0))
            .collect();
        let index = remote_index(&uploaded, "p");
        assert!(diff(&files, &index).is_empty());
    }

    #[test]
    fn listing_prefix_adds_trailing_slash() {
        assert_eq!(listing_prefix(""), "");
        assert_eq!(listing_prefix("/"), "");
        assert_eq!(listing_prefix("a/b/"), "a/b/");
    }

    #[tokio::test]
    async fn plan_walks_the_local_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/r.md"), b"hello").unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"12").unwrap();

        let remote = vec![RemoteEntry::new("keep.txt", 2, 0)];
        let plan = plan_sync(dir.path(), &remote, "").await.unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].target, "docs/r.md");
        assert_eq!(plan[0].size, 5);
    }
}
