//! Finding media files by their declared title.
//!
//! Exports scatter media across album and year folders and do not preserve the
//! casing of the title recorded in the sidecar, so lookups compare leaf
//! filenames case-insensitively over the whole tree.
//!
//! Walks visit directory entries sorted by file name, which makes "first match"
//! well defined: when several files share a name (ignoring case), the one reached
//! first in a depth-first, name-ordered walk wins. [`find_media`] and
//! [`MediaIndex`] apply the same rule.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Filename → path index over a source tree, built in a single walk.
#[derive(Debug, Default)]
pub struct MediaIndex {
    by_name: HashMap<String, PathBuf>,
    duplicates: usize,
}

impl MediaIndex {
    /// Index every file under `root`, skipping any subtree listed in `exclude`.
    pub fn build(root: &Path, exclude: &[PathBuf]) -> Self {
        let mut index = Self::default();

        for entry in walk_files(root, exclude) {
            let key = name_key(entry.file_name());
            if let Some(first) = index.by_name.get(&key) {
                log::debug!(
                    "Duplicate filename {} (keeping {})",
                    entry.path().display(),
                    first.display()
                );
                index.duplicates += 1;
            } else {
                index.by_name.insert(key, entry.into_path());
            }
        }

        log::debug!(
            "Indexed {} file name(s) under {} ({} duplicate(s) shadowed)",
            index.by_name.len(),
            root.display(),
            index.duplicates
        );
        index
    }

    /// Look up a title (a bare filename, extension included).
    pub fn lookup(&self, title: &str) -> Option<&Path> {
        self.by_name.get(&title.to_lowercase()).map(PathBuf::as_path)
    }

    /// Number of distinct file names indexed.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Files that were shadowed by an earlier file of the same name.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Every indexed path.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.by_name.values().map(PathBuf::as_path)
    }
}

/// Search `root` for a file named `title`, ignoring case.
///
/// Walks the tree on every call; use [`MediaIndex`] for repeated lookups.
pub fn find_media(root: &Path, title: &str) -> Option<PathBuf> {
    let wanted = title.to_lowercase();
    walk_files(root, &[])
        .find(|entry| name_key(entry.file_name()) == wanted)
        .map(DirEntry::into_path)
}

/// Files under `root` in sorted depth-first order, unreadable entries skipped.
pub(crate) fn walk_files<'a>(
    root: &Path,
    exclude: &'a [PathBuf],
) -> impl Iterator<Item = DirEntry> + 'a {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| !exclude.iter().any(|x| e.path() == x.as_path()))
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
}

fn name_key(name: &std::ffi::OsStr) -> String {
    name.to_string_lossy().to_lowercase()
}
