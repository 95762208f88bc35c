//! Pending upload queue, de-duplicated by local path

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::batch::UploadItem;
use crate::error::{TransferError, TransferResult};
use crate::local::scan_local_tree;

#[derive(Debug, Clone, Default)]
pub struct UploadQueue {
    items: Vec<UploadItem>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue single files under their own file name. Returns how many were new.
    pub async fn add_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> TransferResult<usize> {
        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let metadata = tokio::fs::metadata(path).await?;
            if !metadata.is_file() {
                return Err(TransferError::validation(format!(
                    "Not a file: {}",
                    path.display()
                )));
            }
            let target = file_name_of(path)?;
            items.push(UploadItem {
                local_path: path.to_path_buf(),
                target,
                size: metadata.len(),
            });
        }
        Ok(self.merge(items))
    }

    /// Queue every file under `folder` as `<folder name>/<relative path>`
    pub async fn add_folder(&mut self, folder: &Path) -> TransferResult<usize> {
        let base_name = file_name_of(folder)?;
        let mut items: Vec<UploadItem> = scan_local_tree(folder)
            .await?
            .into_iter()
            .map(|file| UploadItem {
                local_path: file.path,
                target: format!("{}/{}", base_name, file.relative_path),
                size: file.size,
            })
            .collect();

        if items.is_empty() {
            return Err(TransferError::validation("Selected folder has no files."));
        }
        items.sort_by(|a, b| a.target.cmp(&b.target));
        Ok(self.merge(items))
    }

    fn merge(&mut self, items: Vec<UploadItem>) -> usize {
        let mut existing: HashSet<PathBuf> =
            self.items.iter().map(|i| i.local_path.clone()).collect();
        let before = self.items.len();
        for item in items {
            if existing.insert(item.local_path.clone()) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }

    /// Remove the rows at `indices`; out-of-range indices are ignored
    pub fn remove(&mut self, indices: &[usize]) {
        let mut rows: Vec<usize> = indices.to_vec();
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();
        for row in rows {
            if row < self.items.len() {
                self.items.remove(row);
            }
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|i| i.size).sum()
    }
}

fn file_name_of(path: &Path) -> TransferResult<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| TransferError::validation(format!("No file name in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn re_adding_a_path_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"aaa").unwrap();
        std::fs::write(&b, b"bb").unwrap();

        let mut queue = UploadQueue::new();
        assert_eq!(queue.add_files(&[&a, &b]).await.unwrap(), 2);
        assert_eq!(queue.add_files(&[&a]).await.unwrap(), 0);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.total_bytes(), 5);
        assert_eq!(queue.items()[0].target, "a.txt");
    }

    #[tokio::test]
    async fn folder_targets_carry_the_folder_name() {
        let dir = tempfile::tempdir().unwrap();
        let photos = dir.path().join("photos");
        std::fs::create_dir_all(photos.join("2024")).unwrap();
        std::fs::write(photos.join("z.jpg"), b"z").unwrap();
        std::fs::write(photos.join("2024/a.jpg"), b"aa").unwrap();

        let mut queue = UploadQueue::new();
        assert_eq!(queue.add_folder(&photos).await.unwrap(), 2);
        let targets: Vec<&str> = queue.items().iter().map(|i| i.target.as_str()).collect();
        assert_eq!(targets, vec!["photos/2024/a.jpg", "photos/z.jpg"]);

        // A file already queued through the folder is not added twice
        assert_eq!(queue.add_files(&[photos.join("z.jpg")]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_folder_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = UploadQueue::new();
        let err = queue.add_folder(dir.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "Selected folder has no files.");
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..4).map(|i| dir.path().join(format!("{}.txt", i))).collect();
        for path in &paths {
            std::fs::write(path, b"x").unwrap();
        }

        let mut queue = UploadQueue::new();
        queue.add_files(&paths).await.unwrap();
        queue.remove(&[3, 1, 1, 9]);
        let targets: Vec<&str> = queue.items().iter().map(|i| i.target.as_str()).collect();
        assert_eq!(targets, vec!["0.txt", "2.txt"]);

        queue.clear();
        assert!(queue.is_empty());
    }
}
