//! Local directory walking

use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::error::{TransferError, TransferResult};

/// A regular file found under a scanned root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    /// Path relative to the scanned root, always `/`-separated
    pub relative_path: String,
    pub size: u64,
}

/// Every regular file under `root`, sorted by relative path
pub async fn scan_local_tree(root: &Path) -> TransferResult<Vec<LocalFile>> {
    let metadata = match tokio::fs::metadata(root).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TransferError::validation(format!(
                "Folder not found: {}",
                root.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_dir() {
        return Err(TransferError::validation(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(current) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }

            // Symlinked files are read through; symlinked directories are not entered
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) if file_type.is_symlink() => {
                    warn!("scan_skip_link: path={} error={}", path.display(), e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if metadata.is_file() {
                let relative_path = relative_slash_path(root, &path)?;
                files.push(LocalFile {
                    path,
                    relative_path,
                    size: metadata.len(),
                });
            } else if metadata.is_dir() {
                debug!("scan_skip_dir_link: path={}", path.display());
            }
        }
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

fn relative_slash_path(root: &Path, path: &Path) -> TransferResult<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        TransferError::validation(format!("{} is not under {}", path.display(), root.display()))
    })?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_finds_nested_and_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("top.txt"), b"12345").unwrap();
        std::fs::write(dir.path().join("a/b/deep.bin"), b"xy").unwrap();
        std::fs::write(dir.path().join(".env"), b"k=v").unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        let files = scan_local_tree(dir.path()).await.unwrap();
        let listed: Vec<(&str, u64)> = files
            .iter()
            .map(|f| (f.relative_path.as_str(), f.size))
            .collect();
        assert_eq!(listed, vec![(".env", 3), ("a/b/deep.bin", 2), ("top.txt", 5)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scan_reads_file_links_but_not_directory_links() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::write(root.join("a/f.txt"), b"abc").unwrap();
        std::os::unix::fs::symlink(&root, root.join("a/loop")).unwrap();
        std::os::unix::fs::symlink(root.join("a/f.txt"), root.join("alias.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("missing"), root.join("dangling")).unwrap();

        let files = scan_local_tree(&root).await.unwrap();
        let listed: Vec<(&str, u64)> = files
            .iter()
            .map(|f| (f.relative_path.as_str(), f.size))
            .collect();
        assert_eq!(listed, vec![("a/f.txt", 3), ("alias.txt", 3)]);
    }

    #[tokio::test]
    async fn scan_rejects_a_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"").unwrap();
        assert!(matches!(
            scan_local_tree(&file).await,
            Err(TransferError::Validation(_))
        ));
    }
}
