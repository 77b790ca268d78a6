//! Scanner module - walks the content directories

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, FilterEntry, WalkDir};

use crate::error::CatalogError;

type Walker = FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>;

/// A filesystem entry found below a content directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// Full path to the entry
    pub path: PathBuf,
    /// File name without path
    pub name: OsString,
    /// Depth below the content directory, children of the root are at 1
    pub depth: usize,
    /// Whether the entry is a directory
    pub is_container: bool,
    /// File size in bytes, 0 for directories
    pub size: u64,
}

/// Lazy depth-first walk over a list of content directories.
///
/// Children of a directory come in ascending byte order of their names.
/// Hidden entries are skipped with their whole subtree. Directory symlinks
/// are never followed, so symlink loops cannot trap the walk.
pub struct DirectoryScanner {
    roots: std::vec::IntoIter<PathBuf>,
    max_depth: usize,
    current: Option<Walker>,
    errors: Vec<CatalogError>,
}

impl DirectoryScanner {
    /// Create a scanner over the given roots, visited in order
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots: roots.into_iter(),
            max_depth: usize::MAX,
            current: None,
            errors: Vec::new(),
        }
    }

    /// Limit how deep below each root the walk goes
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Do not descend into the directory yielded last
    pub fn skip_current_dir(&mut self) {
        if let Some(walker) = self.current.as_mut() {
            walker.skip_current_dir();
        }
    }

    /// Errors met so far; none of them stopped the walk
    pub fn errors(&self) -> &[CatalogError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<CatalogError> {
        std::mem::take(&mut self.errors)
    }

    fn walk(root: &Path, max_depth: usize) -> Walker {
        WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(is_visible as fn(&DirEntry) -> bool)
    }

    fn skip(&mut self, err: CatalogError) {
        log::warn!("Skipping {:?}: {}", err.path, err.message);
        self.errors.push(err);
    }

    /// Turn a walkdir entry into a scan entry, `None` if it must be skipped
    fn inspect(&mut self, entry: DirEntry) -> Option<ScanEntry> {
        let path = entry.path().to_path_buf();

        let (is_container, size) = if entry.path_is_symlink() {
            // stat through the link, but never walk into a linked directory
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    log::debug!("Not following directory symlink {:?}", path);
                    return None;
                }
                Ok(meta) => (false, meta.len()),
                Err(e) => {
                    self.skip(CatalogError::from(e).with_path(path));
                    return None;
                }
            }
        } else if entry.file_type().is_dir() {
            (true, 0)
        } else {
            match entry.metadata() {
                Ok(meta) => (false, meta.len()),
                Err(e) => {
                    self.skip(CatalogError::from(e).with_path(path));
                    return None;
                }
            }
        };

        Some(ScanEntry {
            name: entry.file_name().to_os_string(),
            depth: entry.depth(),
            path,
            is_container,
            size,
        })
    }
}

impl Iterator for DirectoryScanner {
    type Item = ScanEntry;

    fn next(&mut self) -> Option<ScanEntry> {
        loop {
            let next = match self.current.as_mut() {
                Some(walker) => walker.next(),
                None => {
                    let root = self.roots.next()?;
                    if !root.is_dir() {
                        self.skip(CatalogError::not_found(root));
                        continue;
                    }
                    log::info!("Looking for files in content directory: {:?}", root);
                    self.current = Some(Self::walk(&root, self.max_depth));
                    continue;
                }
            };

            match next {
                Some(Ok(entry)) => {
                    if let Some(scanned) = self.inspect(entry) {
                        return Some(scanned);
                    }
                }
                Some(Err(e)) => self.skip(CatalogError::from(e)),
                None => self.current = None,
            }
        }
    }
}

/// Hidden entries start with a dot
pub fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.as_encoded_bytes().first() == Some(&b'.')
}

fn is_visible(entry: &DirEntry) -> bool {
    entry.depth() == 0 || !is_hidden(entry.file_name())
}
