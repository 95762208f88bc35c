//! Virtual folders over the flat key namespace
//!
//! The bucket only stores keys such as `a/c/d.txt`. A view is derived on
//! every navigation from the full listing and the current folder; nothing
//! here is cached between calls.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::b2::RemoteEntry;

/// One row of a folder view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FolderNode {
    Folder {
        /// Full key prefix without trailing slash
        path: String,
        name: String,
        /// Files anywhere below this folder
        file_count: u64,
        total_size: u64,
    },
    File {
        name: String,
        entry: RemoteEntry,
    },
}

impl FolderNode {
    pub fn name(&self) -> &str {
        match self {
            FolderNode::Folder { name, .. } | FolderNode::File { name, .. } => name,
        }
    }

    /// Folder prefix or object key
    pub fn path(&self) -> &str {
        match self {
            FolderNode::Folder { path, .. } => path,
            FolderNode::File { entry, .. } => &entry.key,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, FolderNode::Folder { .. })
    }
}

#[derive(Default)]
struct FolderAggregate {
    name: String,
    file_count: u64,
    total_size: u64,
}

/// Folders (deduplicated, with descendant totals) then files directly in
/// `current`, each group sorted case-insensitively by name.
pub fn build_folder_view(entries: &[RemoteEntry], current: &str) -> Vec<FolderNode> {
    let current = current.trim_matches('/');
    let scope = if current.is_empty() {
        String::new()
    } else {
        format!("{}/", current)
    };

    let mut folders: HashMap<String, FolderAggregate> = HashMap::new();
    let mut files: Vec<FolderNode> = Vec::new();

    for entry in entries {
        let Some(remainder) = entry.key.strip_prefix(scope.as_str()) else {
            continue;
        };
        if remainder.is_empty() {
            continue;
        }

        match remainder.split_once('/') {
            Some((folder_name, rest)) => {
                // `a//b.txt` has no nameable folder below `a`; reachable via `Listing::under`
                if folder_name.is_empty() {
                    continue;
                }
                let path = format!("{}{}", scope, folder_name);
                let aggregate = folders.entry(path).or_insert_with(|| FolderAggregate {
                    name: folder_name.to_string(),
                    ..Default::default()
                });
                // Folder markers (`x/`) create the folder but are not files
                if !rest.is_empty() && !rest.ends_with('/') {
                    aggregate.file_count += 1;
                    aggregate.total_size += entry.size;
                }
            }
            None => files.push(FolderNode::File {
                name: remainder.to_string(),
                entry: entry.clone(),
            }),
        }
    }

    let mut folder_nodes: Vec<FolderNode> = folders
        .into_iter()
        .map(|(path, aggregate)| FolderNode::Folder {
            path,
            name: aggregate.name,
            file_count: aggregate.file_count,
            total_size: aggregate.total_size,
        })
        .collect();

    folder_nodes.sort_by_cached_key(|node| (node.name().to_lowercase(), node.path().to_string()));
    files.sort_by_cached_key(|node| (node.name().to_lowercase(), node.path().to_string()));
    folder_nodes.extend(files);
    folder_nodes
}

/// A full listing plus the time it was fetched
#[derive(Debug, Clone)]
pub struct Listing {
    pub prefix: String,
    pub entries: Vec<RemoteEntry>,
    pub fetched_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(prefix: impl Into<String>, entries: Vec<RemoteEntry>) -> Self {
        Self {
            prefix: prefix.into(),
            entries,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        Utc::now() - self.fetched_at > max_age
    }

    /// Entries at or below `folder`
    pub fn under<'a>(&'a self, folder: &'a str) -> impl Iterator<Item = &'a RemoteEntry> + 'a {
        let folder = folder.trim_matches('/');
        self.entries
            .iter()
            .filter(move |entry| folder.is_empty() || is_within(folder, &entry.key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub path: String,
    /// The crumb for the folder being shown; not clickable
    pub is_current: bool,
}

/// `path` equals `base` or lies below it
fn is_within(base: &str, path: &str) -> bool {
    base.is_empty()
        || path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Navigation state: a base prefix the user cannot leave and the folder shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderBrowser {
    base: String,
    current: String,
}

impl FolderBrowser {
    pub fn new(base: &str) -> Self {
        let base = base.trim_matches('/').to_string();
        Self {
            current: base.clone(),
            base,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Show `folder`; a folder outside the base falls back to the base
    pub fn open(&mut self, folder: &str) {
        let folder = folder.trim_matches('/');
        self.current = if is_within(&self.base, folder) {
            folder.to_string()
        } else {
            self.base.clone()
        };
    }

    /// Go up one level; returns false when already at the base
    pub fn parent(&mut self) -> bool {
        if !self.can_go_up() {
            return false;
        }
        let parent = self
            .current
            .rsplit_once('/')
            .map(|(parent, _)| parent.to_string())
            .unwrap_or_default();
        self.open(&parent);
        true
    }

    pub fn can_go_up(&self) -> bool {
        !self.current.is_empty() && self.current != self.base
    }

    /// Root crumb (`/`, the base) followed by one crumb per level below it
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let mut crumbs = vec![Breadcrumb {
            name: "/".to_string(),
            path: self.base.clone(),
            is_current: self.current == self.base,
        }];

        let relative = self
            .current
            .strip_prefix(self.base.as_str())
            .unwrap_or(&self.current);
        let mut path = self.base.clone();
        for part in relative.split('/').filter(|p| !p.is_empty()) {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(part);
            crumbs.push(Breadcrumb {
                name: part.to_string(),
                path: path.clone(),
                is_current: path == self.current,
            });
        }
        crumbs
    }

    /// Reset to the base when the shown folder vanished from a fresh listing
    pub fn reconcile(&mut self, listing: &Listing) {
        if self.current == self.base {
            return;
        }
        if listing.under(&self.current).next().is_none() {
            self.current = self.base.clone();
        }
    }

    pub fn view(&self, listing: &Listing) -> Vec<FolderNode> {
        build_folder_view(&listing.entries, &self.current)
    }
}

/// File-type groups offered by the browser's type filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Images,
    Video,
    Audio,
    Documents,
    Archives,
}

impl TypeFilter {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            TypeFilter::All => &[],
            TypeFilter::Images => &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"],
            TypeFilter::Video => &["mp4", "mov", "avi", "mkv", "webm", "m4v"],
            TypeFilter::Audio => &["mp3", "wav", "flac", "aac", "ogg", "m4a"],
            TypeFilter::Documents => &[
                "pdf", "doc", "docx", "txt", "rtf", "xls", "xlsx", "ppt", "pptx",
            ],
            TypeFilter::Archives => &["zip", "rar", "7z", "tar", "gz", "bz2"],
        }
    }

    pub fn matches(self, key: &str) -> bool {
        if self == TypeFilter::All {
            return true;
        }
        let extension = Path::new(key)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.extensions().contains(&extension.as_str())
    }
}

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeFilter {
    #[default]
    Any,
    Under10Mb,
    From10To100Mb,
    From100MbTo1Gb,
    Over1Gb,
}

impl SizeFilter {
    pub fn matches(self, size: u64) -> bool {
        match self {
            SizeFilter::Any => true,
            SizeFilter::Under10Mb => size < 10 * MB,
            SizeFilter::From10To100Mb => (10 * MB..=100 * MB).contains(&size),
            SizeFilter::From100MbTo1Gb => size > 100 * MB && size <= GB,
            SizeFilter::Over1Gb => size > GB,
        }
    }
}

/// Search and filters applied on top of a folder view.
///
/// Folders only face the text query; type and size apply to files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    pub query: String,
    pub file_type: TypeFilter,
    pub size: SizeFilter,
}

impl ViewFilter {
    pub fn matches(&self, node: &FolderNode) -> bool {
        let query = self.query.trim().to_lowercase();
        if !query.is_empty()
            && !node.name().to_lowercase().contains(&query)
            && !node.path().to_lowercase().contains(&query)
        {
            return false;
        }
        match node {
            FolderNode::Folder { .. } => true,
            FolderNode::File { entry, .. } => {
                self.file_type.matches(&entry.key) && self.size.matches(entry.size)
            }
        }
    }

    pub fn apply(&self, nodes: Vec<FolderNode>) -> Vec<FolderNode> {
        nodes.into_iter().filter(|node| self.matches(node)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(keys: &[(&str, u64)]) -> Vec<RemoteEntry> {
        keys.iter()
            .map(|(key, size)| RemoteEntry::new(*key, *size, 0))
            .collect()
    }

    fn names(nodes: &[FolderNode]) -> Vec<(&str, bool)> {
        nodes.iter().map(|n| (n.name(), n.is_folder())).collect()
    }

    #[test]
    fn root_and_nested_views() {
        let listing = entries(&[("a/b.txt", 1), ("a/c/d.txt", 2), ("e.txt", 3)]);

        let root = build_folder_view(&listing, "");
        assert_eq!(names(&root), vec![("a", true), ("e.txt", false)]);
        match &root[0] {
            FolderNode::Folder {
                path,
                file_count,
                total_size,
                ..
            } => {
                assert_eq!(path, "a");
                assert_eq!(*file_count, 2);
                assert_eq!(*total_size, 3);
            }
            other => panic!("expected folder, got {:?}", other),
        }

        let inside = build_folder_view(&listing, "a");
        assert_eq!(names(&inside), vec![("c", true), ("b.txt", false)]);
        assert_eq!(inside[0].path(), "a/c");
        assert_eq!(inside[1].path(), "a/b.txt");
    }

    #[test]
    fn sorting_is_case_insensitive_with_folders_first() {
        let listing = entries(&[
            ("Zeta.txt", 1),
            ("alpha.txt", 1),
            ("beta/x", 1),
            ("Alpha/y", 1),
        ]);
        let view = build_folder_view(&listing, "/");
        assert_eq!(
            names(&view),
            vec![
                ("Alpha", true),
                ("beta", true),
                ("alpha.txt", false),
                ("Zeta.txt", false)
            ]
        );
    }

    #[test]
    fn folder_markers_make_empty_folders_not_files() {
        let listing = entries(&[("docs/", 0), ("docs/old/", 0)]);
        let root = build_folder_view(&listing, "");
        assert_eq!(names(&root), vec![("docs", true)]);
        let docs = build_folder_view(&listing, "docs");
        assert_eq!(names(&docs), vec![("old", true)]);
        assert!(matches!(docs[0], FolderNode::Folder { file_count: 0, .. }));
    }

    #[test]
    fn similar_prefixes_do_not_leak() {
        let listing = entries(&[("ab/x.txt", 1), ("a/y.txt", 1)]);
        assert_eq!(names(&build_folder_view(&listing, "a")), vec![("y.txt", false)]);
    }

    #[test]
    fn empty_segments_stay_out_of_views_but_not_listings() {
        let listing = Listing::new("", entries(&[("a//b.txt", 4), ("a/c.txt", 1), ("/x.txt", 2)]));

        assert_eq!(names(&build_folder_view(&listing.entries, "")), vec![("a", true)]);
        assert_eq!(names(&build_folder_view(&listing.entries, "a")), vec![("c.txt", false)]);
        let under_a: Vec<&str> = listing.under("a").map(|e| e.key.as_str()).collect();
        assert_eq!(under_a, vec!["a//b.txt", "a/c.txt"]);
    }

    #[test]
    fn parent_walks_up_to_an_empty_base() {
        let mut browser = FolderBrowser::new("");
        browser.open("a/b");
        assert!(browser.parent());
        assert_eq!(browser.current(), "a");
        assert!(browser.parent());
        assert_eq!(browser.current(), "");
        assert!(!browser.parent());
    }

    #[test]
    fn parent_never_leaves_the_base() {
        let mut browser = FolderBrowser::new("/photos/");
        assert!(!browser.parent());

        browser.open("photos/2024/june");
        assert_eq!(browser.current(), "photos/2024/june");
        assert!(browser.parent());
        assert_eq!(browser.current(), "photos/2024");
        assert!(browser.parent());
        assert_eq!(browser.current(), "photos");
        assert!(!browser.parent());

        browser.open("other");
        assert_eq!(browser.current(), "photos");
        browser.open("photosx");
        assert_eq!(browser.current(), "photos");
    }

    #[test]
    fn breadcrumbs_start_at_the_base() {
        let mut browser = FolderBrowser::new("photos");
        browser.open("photos/2024/june");
        let crumbs = browser.breadcrumbs();
        let paths: Vec<&str> = crumbs.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["photos", "photos/2024", "photos/2024/june"]);
        assert_eq!(crumbs[0].name, "/");
        assert!(crumbs[2].is_current);
        assert!(!crumbs[0].is_current);

        let root = FolderBrowser::new("");
        assert_eq!(root.breadcrumbs().len(), 1);
        assert!(root.breadcrumbs()[0].is_current);
    }

    #[test]
    fn reconcile_resets_a_vanished_folder() {
        let mut browser = FolderBrowser::new("");
        browser.open("gone");
        browser.reconcile(&Listing::new("", entries(&[("kept/a.txt", 1)])));
        assert_eq!(browser.current(), "");

        browser.open("kept");
        browser.reconcile(&Listing::new("", entries(&[("kept/a.txt", 1)])));
        assert_eq!(browser.current(), "kept");
    }

    #[test]
    fn listing_staleness() {
        let mut listing = Listing::new("", Vec::new());
        assert!(!listing.is_stale(Duration::minutes(5)));
        listing.fetched_at = Utc::now() - Duration::minutes(10);
        assert!(listing.is_stale(Duration::minutes(5)));
    }

    #[test]
    fn filters_apply_to_files_only() {
        let listing = entries(&[
            ("pics/", 0),
            ("photo.JPG", 20 * MB),
            ("notes.txt", 1),
            ("movie.mkv", 2 * GB),
        ]);
        let view = build_folder_view(&listing, "");

        let images = ViewFilter {
            file_type: TypeFilter::Images,
            ..Default::default()
        };
        assert_eq!(
            names(&images.apply(view.clone())),
            vec![("pics", true), ("photo.JPG", false)]
        );

        let huge = ViewFilter {
            size: SizeFilter::Over1Gb,
            ..Default::default()
        };
        assert_eq!(
            names(&huge.apply(view.clone())),
            vec![("pics", true), ("movie.mkv", false)]
        );

        let search = ViewFilter {
            query: "NOTE".into(),
            ..Default::default()
        };
        assert_eq!(names(&search.apply(view)), vec![("notes.txt", false)]);
    }
}
